//! Error taxonomy at each external boundary (spec §7).
//!
//! Internal loops (state machine, grab loop, event processor) never
//! propagate these out of their run loop; failures there become explicit
//! status values. These types exist at the boundary where the pipeline
//! talks to the camera, DIO, inference black-box, and the database.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera retrieve timed out")]
    Timeout,
    #[error("incomplete frame (network congestion)")]
    IncompleteFrame,
    #[error("fatal camera error: {0}")]
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum DioError {
    #[error("DIO read error on bit {bit}: {message}")]
    ReadError { bit: u8, message: String },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference adapter failed: {0}")]
    AdapterFailed(String),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("borrow timed out after {0:?}")]
    BorrowTimeout(std::time::Duration),
    #[error("transient database error: {0}")]
    Transient(String),
    #[error("non-transient database error: {0}")]
    NonTransient(String),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("extractor found an empty buffer")]
    EmptyBuffer,
    #[error("I/O error writing inspection output: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encode error: {0}")]
    Encode(String),
}
