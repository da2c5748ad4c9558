//! Frame: a single captured image plus its monotonic capture timestamp.
//!
//! Immutable after capture (spec §3). `captured_at` is measured against a
//! single process-wide monotonic clock (an `Instant`), never wall-clock,
//! so that window math (§4.5) and cadence math (§4.4) are unaffected by
//! clock adjustments.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Frame {
    pub image_bytes: std::sync::Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image_bytes: Vec<u8>, width: u32, height: u32, captured_at: Instant) -> Self {
        Self {
            image_bytes: std::sync::Arc::from(image_bytes),
            width,
            height,
            captured_at,
        }
    }
}
