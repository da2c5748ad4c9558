//! Real-time inspection pipeline core for a wood-surface defect inspection
//! system (see `SPEC_FULL.md` for the full component design).
//!
//! The HTTP/SSE surface, the defect-detection model, the DIO driver, and
//! configuration loading are external collaborators; this crate exposes
//! the pipeline's callable API (`Pipeline::start/stop`, `toggle_sensor_*`,
//! `set_ai_threshold`) and a `StatusBroker` snapshot/subscription for
//! whatever thin layer binds those concerns.

pub mod capture;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod inference;
pub mod labels;
pub mod pipeline;
pub mod presentation;
pub mod resource_optimizer;
pub mod ring_buffer;
pub mod sensor;
pub mod status;

pub use config::Config;
pub use pipeline::Pipeline;
