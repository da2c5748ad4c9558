//! Inference client: wraps the black-box defect detector.

pub mod client;

pub use client::{Detection, InferenceAdapter, filter_by_threshold};
