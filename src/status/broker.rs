//! Single-writer, many-reader live status snapshot (spec §4.12).
//!
//! One owner publishes by whole-value replacement through
//! `tokio::sync::watch`, so SSE-style subscribers get the same snapshot
//! without polling a mutex.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::db::models::{Group, Verdict};
use crate::engine::group::GroupState;
use crate::sensor::state_machine::SensorState;

/// Whether the sensor/capture side is driven by real hardware, stands in
/// with simulated adapters, or fell back to simulation after a fatal
/// hardware failure at startup or during a run (spec §7 "Fatal startup").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    Live,
    Simulated,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Waiting,
    Recording,
    Processing,
}

impl CaptureStatus {
    pub fn label_ja(&self) -> &'static str {
        match self {
            CaptureStatus::Waiting => "待機中",
            CaptureStatus::Recording => "録画中",
            CaptureStatus::Processing => "処理中",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SensorStatusView {
    pub state: SensorState,
    pub sensor_a: bool,
    pub sensor_b: bool,
    pub last_decision: Option<&'static str>,
    pub last_update_monotonic_secs: f64,
}

#[derive(Debug, Clone)]
pub struct GroupProgress {
    pub total: usize,
    pub processed: usize,
    pub state: GroupState,
}

#[derive(Debug, Clone)]
pub struct InspectionStatusView {
    pub id: i64,
    pub verdict: Verdict,
    pub any_defect: bool,
    pub ai_threshold: u8,
    pub presentation_ready: bool,
    pub groups: HashMap<Group, GroupProgress>,
    pub overall_progress: f32,
}

#[derive(Debug, Clone)]
pub struct CaptureStatusView {
    pub status: CaptureStatus,
    pub buffer_frames: usize,
    pub buffer_capacity: usize,
    pub last_save_message: Option<String>,
    pub last_save_path: Option<String>,
    pub total_saves: u64,
    pub total_discards: u64,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub active: bool,
    pub hardware_mode: HardwareMode,
    pub sensor_state: SensorStatusView,
    pub inspection: Option<InspectionStatusView>,
    pub capture: CaptureStatusView,
}

impl StatusSnapshot {
    pub fn idle(buffer_capacity: usize) -> Self {
        Self {
            active: false,
            hardware_mode: HardwareMode::Simulated,
            sensor_state: SensorStatusView {
                state: SensorState::Idle,
                sensor_a: false,
                sensor_b: false,
                last_decision: None,
                last_update_monotonic_secs: 0.0,
            },
            inspection: None,
            capture: CaptureStatusView {
                status: CaptureStatus::Waiting,
                buffer_frames: 0,
                buffer_capacity,
                last_save_message: None,
                last_save_path: None,
                total_saves: 0,
                total_discards: 0,
            },
        }
    }
}

/// Owns the current snapshot and publishes new ones by whole-value
/// replacement. Cloning the `StatusBroker` shares the same channel, same
/// as `watch::Sender`/`watch::Receiver` pairs are meant to be used.
pub struct StatusBroker {
    sender: watch::Sender<Arc<StatusSnapshot>>,
}

impl StatusBroker {
    pub fn new(initial: StatusSnapshot) -> Self {
        let (sender, _receiver) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.sender.borrow().clone()
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        let _ = self.sender.send(Arc::new(snapshot));
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.sender.subscribe()
    }
}
