//! Live status snapshot, published for polling and SSE-style subscription.

pub mod broker;

pub use broker::{CaptureStatus, CaptureStatusView, GroupProgress, InspectionStatusView, SensorStatusView, StatusBroker, StatusSnapshot};
