//! Parallel analysis engine: per-image analysis, group workers, round-robin
//! scheduling, and verdict aggregation.

pub mod aggregator;
pub mod analyzer;
pub mod group;
pub mod scheduler;

pub use group::{GroupReport, GroupState};
pub use scheduler::{analyze_batch, AnalysisOutcome};
