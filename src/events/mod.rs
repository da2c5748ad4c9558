//! Queued hand-off from the sensor boundary to disk I/O and analysis.

pub mod processor;
pub mod queue;

pub use processor::{EventProcessor, ProcessedSave};
pub use queue::{EventQueue, SaveEvent};
