//! Top-level orchestration: wires sensor, capture, event, and analysis
//! actors together and owns the start/stop lifecycle (spec §5).

use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::camera::CameraAdapter;
use crate::capture::grab_loop::{GrabLoop, GrabLoopConfig};
use crate::config::Config;
use crate::db::models::{Group, Verdict};
use crate::db::ConnectionPool;
use crate::engine::group::GroupState;
use crate::engine::scheduler::analyze_batch;
use crate::events::processor::EventProcessor;
use crate::events::queue::{EventQueue, SaveEvent};
use crate::inference::InferenceAdapter;
use crate::presentation::pick_presentation;
use crate::ring_buffer::RingBuffer;
use crate::sensor::dio::SimulatedDio;
use crate::sensor::poller::SensorPoller;
use crate::sensor::state_machine::{Decision, DiscardKind, SensorState, SensorStateMachine};
use crate::status::broker::{
    CaptureStatus, GroupProgress, HardwareMode, InspectionStatusView, SensorStatusView,
    StatusBroker, StatusSnapshot,
};

pub struct Pipeline {
    config: Config,
    ring_buffer: Arc<RingBuffer>,
    event_queue: Arc<EventQueue>,
    status_broker: Arc<StatusBroker>,
    db_pool: Arc<ConnectionPool>,
    simulated_dio: Arc<SimulatedDio>,
    running: Arc<AtomicBool>,
    ai_threshold_percent: Arc<AtomicU8>,
    total_saves: Arc<std::sync::atomic::AtomicU64>,
    total_discards: Arc<std::sync::atomic::AtomicU64>,
    started_at: Instant,

    sensor_a: Arc<AtomicBool>,
    sensor_b: Arc<AtomicBool>,
    sensor_state: Arc<Mutex<SensorState>>,
    last_decision: Arc<Mutex<Option<&'static str>>>,
    last_sensor_update_secs: Arc<Mutex<f64>>,

    hardware_fatal: Arc<AtomicBool>,
    requested_hardware_mode: Arc<Mutex<HardwareMode>>,

    group_progress: Arc<DashMap<Group, GroupProgress>>,
    inspection_id: Arc<AtomicI64>,
    inspection_active: Arc<AtomicBool>,
    inspection_verdict: Arc<Mutex<Verdict>>,
    inspection_any_defect: Arc<AtomicBool>,
    inspection_presentation_ready: Arc<AtomicBool>,

    handles: Vec<std::thread::JoinHandle<()>>,
}

impl Pipeline {
    pub fn new(config: Config, db_pool: Arc<ConnectionPool>) -> Self {
        let buffer_capacity = (config.buffer.max_seconds * config.camera.target_fps) as usize;
        Self {
            ring_buffer: Arc::new(RingBuffer::new(buffer_capacity)),
            event_queue: Arc::new(EventQueue::new(crate::config::EVENT_QUEUE_MIN_CAPACITY)),
            status_broker: Arc::new(StatusBroker::new(StatusSnapshot::idle(buffer_capacity))),
            simulated_dio: Arc::new(SimulatedDio::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            ai_threshold_percent: Arc::new(AtomicU8::new(config.ai_threshold_percent)),
            total_saves: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            total_discards: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            started_at: Instant::now(),
            sensor_a: Arc::new(AtomicBool::new(false)),
            sensor_b: Arc::new(AtomicBool::new(false)),
            sensor_state: Arc::new(Mutex::new(SensorState::Idle)),
            last_decision: Arc::new(Mutex::new(None)),
            last_sensor_update_secs: Arc::new(Mutex::new(0.0)),
            hardware_fatal: Arc::new(AtomicBool::new(false)),
            requested_hardware_mode: Arc::new(Mutex::new(HardwareMode::Simulated)),
            group_progress: Arc::new(DashMap::new()),
            inspection_id: Arc::new(AtomicI64::new(-1)),
            inspection_active: Arc::new(AtomicBool::new(false)),
            inspection_verdict: Arc::new(Mutex::new(Verdict::NoDefect)),
            inspection_any_defect: Arc::new(AtomicBool::new(false)),
            inspection_presentation_ready: Arc::new(AtomicBool::new(false)),
            config,
            db_pool,
            handles: Vec::new(),
        }
    }

    pub fn status_broker(&self) -> Arc<StatusBroker> {
        self.status_broker.clone()
    }

    pub fn toggle_sensor_a(&self, value: bool) {
        self.simulated_dio.set_bit_a(value);
    }

    pub fn toggle_sensor_b(&self, value: bool) {
        self.simulated_dio.set_bit_b(value);
    }

    /// Updates the live threshold; affects only subsequent inspections
    /// (spec §6, `set-ai-threshold`).
    pub fn set_ai_threshold(&self, percent: u8) {
        self.ai_threshold_percent.store(percent.clamp(10, 100), Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the poller, grab loop, event processor, and status publisher
    /// on dedicated threads. `camera` and `inference` are injected so
    /// callers can swap real hardware in for the simulated defaults.
    /// `hardware_mode` records whether `camera` and the DIO side are real
    /// or simulated; if the grab loop later exhausts recovery (spec §7
    /// "Fatal startup"), the published snapshot reports `Degraded`
    /// regardless of what was requested here.
    pub fn start(
        &mut self,
        camera: Box<dyn CameraAdapter>,
        inference: Arc<dyn InferenceAdapter + Send + Sync>,
        hardware_mode: HardwareMode,
    ) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("pipeline starting");
        *self.requested_hardware_mode.lock() = hardware_mode;
        self.hardware_fatal.store(false, Ordering::SeqCst);

        let grab_loop_cfg = GrabLoopConfig {
            target_fps: self.config.camera.target_fps,
            retrieve_timeout: Duration::from_millis(250),
            failure_threshold: crate::config::GRAB_FAILURE_THRESHOLD,
            max_recovery_attempts: crate::config::GRAB_RECOVERY_ATTEMPTS,
        };
        let mut grab_loop = GrabLoop::new(grab_loop_cfg, self.ring_buffer.clone());
        let recording_flag = grab_loop.recording_flag();
        self.hardware_fatal = grab_loop.fatal_flag();
        let running_for_grab = self.running.clone();
        self.handles.push(std::thread::spawn(move || {
            grab_loop.run(camera, || !running_for_grab.load(Ordering::SeqCst));
        }));

        let sim_dio = self.simulated_dio.clone();
        let event_queue = self.event_queue.clone();
        let ring_buffer_for_poller = self.ring_buffer.clone();
        let running_for_poller = self.running.clone();
        let recording_flag_for_poller = recording_flag.clone();
        let total_discards = self.total_discards.clone();
        let save_root = PathBuf::from(&self.config.save.root_dir);
        let sensor_a = self.sensor_a.clone();
        let sensor_b = self.sensor_b.clone();
        let sensor_state = self.sensor_state.clone();
        let last_decision = self.last_decision.clone();
        let last_sensor_update_secs = self.last_sensor_update_secs.clone();
        let started_at = self.started_at;
        self.handles.push(std::thread::spawn(move || {
            let mut poller = SensorPoller::new(crate::sensor::poller::MIN_POLL_HZ);
            let sm = SensorStateMachine::new(Duration::from_secs(crate::config::T_MAX_SECS));
            poller.run(
                Box::new(SimulatedDioHandle(sim_dio)),
                sm,
                || !running_for_poller.load(Ordering::SeqCst),
                move |decision, a, b, state, now| {
                    sensor_a.store(a, Ordering::SeqCst);
                    sensor_b.store(b, Ordering::SeqCst);
                    *sensor_state.lock() = state;
                    *last_sensor_update_secs.lock() =
                        now.saturating_duration_since(started_at).as_secs_f64();
                    if let Some(label) = decision_label(decision) {
                        *last_decision.lock() = Some(label);
                    }
                    if decision != Decision::None {
                        handle_decision(
                            decision,
                            now,
                            &recording_flag_for_poller,
                            &ring_buffer_for_poller,
                            &event_queue,
                            &save_root,
                            &total_discards,
                        );
                    }
                },
            );
        }));

        let processor = EventProcessor::new(&self.config.save.root_dir, self.config.camera.target_fps);
        let event_queue = self.event_queue.clone();
        let running_for_processor = self.running.clone();
        let db_pool = self.db_pool.clone();
        let ai_threshold = self.ai_threshold_percent.clone();
        let total_saves = self.total_saves.clone();
        let group_progress = self.group_progress.clone();
        let inspection_id_cell = self.inspection_id.clone();
        let inspection_active = self.inspection_active.clone();
        let inspection_verdict = self.inspection_verdict.clone();
        let inspection_any_defect = self.inspection_any_defect.clone();
        let inspection_presentation_ready = self.inspection_presentation_ready.clone();
        self.handles.push(std::thread::spawn(move || {
            processor.run(
                &event_queue,
                || !running_for_processor.load(Ordering::SeqCst),
                move |processed| {
                    total_saves.fetch_add(1, Ordering::SeqCst);
                    let directory = processed.directory.to_string_lossy().to_string();
                    let threshold = ai_threshold.load(Ordering::SeqCst);

                    inspection_active.store(true, Ordering::SeqCst);
                    inspection_presentation_ready.store(false, Ordering::SeqCst);
                    group_progress.clear();
                    let group_progress_for_cb = group_progress.clone();

                    match analyze_batch(
                        &processed.paths,
                        &directory,
                        inference.as_ref(),
                        &db_pool,
                        threshold,
                        move |group, done, total| {
                            let state = if done >= total {
                                GroupState::Completed
                            } else {
                                GroupState::Processing
                            };
                            group_progress_for_cb.insert(
                                group,
                                GroupProgress { total, processed: done, state },
                            );
                        },
                    ) {
                        Ok(outcome) => {
                            inspection_id_cell.store(outcome.inspection_id, Ordering::SeqCst);
                            // The final report carries the authoritative per-group
                            // state (e.g. Error on a total wipeout), overriding the
                            // optimistic Processing/Completed guess made above.
                            for report in &outcome.group_reports {
                                group_progress.insert(
                                    report.group,
                                    GroupProgress {
                                        total: report.total,
                                        processed: report.processed,
                                        state: report.state,
                                    },
                                );
                            }

                            let paths: Vec<String> = processed
                                .paths
                                .iter()
                                .map(|p| p.to_string_lossy().to_string())
                                .collect();
                            if let Ok(details) =
                                crate::db::repository::load_details(&db_pool, outcome.inspection_id)
                            {
                                let rows = pick_presentation(outcome.inspection_id, &paths, &details);
                                match crate::db::repository::replace_presentations(
                                    &db_pool,
                                    outcome.inspection_id,
                                    &rows,
                                ) {
                                    Ok(()) => inspection_presentation_ready.store(true, Ordering::SeqCst),
                                    Err(e) => log::error!("presentation replace failed: {e}"),
                                }
                            }
                            if let Ok(inspection) =
                                crate::db::repository::load_inspection(&db_pool, outcome.inspection_id)
                            {
                                *inspection_verdict.lock() = inspection.verdict;
                                inspection_any_defect
                                    .store(inspection.any_defect_above_threshold, Ordering::SeqCst);
                            }
                        }
                        Err(e) => log::error!("analysis batch failed: {e}"),
                    }
                    inspection_active.store(false, Ordering::SeqCst);
                },
            );
        }));

        let status_broker = self.status_broker.clone();
        let ring_buffer = self.ring_buffer.clone();
        let recording_flag_for_status = recording_flag;
        let running_for_status = self.running.clone();
        let total_saves = self.total_saves.clone();
        let total_discards = self.total_discards.clone();
        let update_interval = Duration::from_millis(self.config.sse.update_interval_ms);
        let sensor_a = self.sensor_a.clone();
        let sensor_b = self.sensor_b.clone();
        let sensor_state = self.sensor_state.clone();
        let last_decision = self.last_decision.clone();
        let last_sensor_update_secs = self.last_sensor_update_secs.clone();
        let hardware_fatal = self.hardware_fatal.clone();
        let requested_hardware_mode = self.requested_hardware_mode.clone();
        let ai_threshold_for_status = self.ai_threshold_percent.clone();
        let group_progress = self.group_progress.clone();
        let inspection_id_cell = self.inspection_id.clone();
        let inspection_active = self.inspection_active.clone();
        let inspection_verdict = self.inspection_verdict.clone();
        let inspection_any_defect = self.inspection_any_defect.clone();
        let inspection_presentation_ready = self.inspection_presentation_ready.clone();
        self.handles.push(std::thread::spawn(move || {
            while running_for_status.load(Ordering::SeqCst) {
                let recording = recording_flag_for_status.load(Ordering::SeqCst);
                let analyzing = inspection_active.load(Ordering::SeqCst);

                let mut snapshot = StatusSnapshot::idle(ring_buffer.capacity());
                snapshot.active = true;
                snapshot.hardware_mode = if hardware_fatal.load(Ordering::SeqCst) {
                    HardwareMode::Degraded
                } else {
                    *requested_hardware_mode.lock()
                };
                snapshot.sensor_state = SensorStatusView {
                    state: *sensor_state.lock(),
                    sensor_a: sensor_a.load(Ordering::SeqCst),
                    sensor_b: sensor_b.load(Ordering::SeqCst),
                    last_decision: *last_decision.lock(),
                    last_update_monotonic_secs: *last_sensor_update_secs.lock(),
                };
                snapshot.capture.status = CaptureStatus::from_flags(recording, analyzing);
                snapshot.capture.buffer_frames = ring_buffer.len();
                snapshot.capture.total_saves = total_saves.load(Ordering::SeqCst);
                snapshot.capture.total_discards = total_discards.load(Ordering::SeqCst);

                let inspection_id = inspection_id_cell.load(Ordering::SeqCst);
                if inspection_id >= 0 {
                    let groups: HashMap<Group, GroupProgress> = group_progress
                        .iter()
                        .map(|entry| (*entry.key(), entry.value().clone()))
                        .collect();
                    let (done, total) = groups.values().fold((0usize, 0usize), |(d, t), g| {
                        (d + g.processed, t + g.total)
                    });
                    snapshot.inspection = Some(InspectionStatusView {
                        id: inspection_id,
                        verdict: *inspection_verdict.lock(),
                        any_defect: inspection_any_defect.load(Ordering::SeqCst),
                        ai_threshold: ai_threshold_for_status.load(Ordering::SeqCst),
                        presentation_ready: inspection_presentation_ready.load(Ordering::SeqCst),
                        groups,
                        overall_progress: if total == 0 { 0.0 } else { done as f32 / total as f32 },
                    });
                }

                status_broker.publish(snapshot);
                std::thread::sleep(update_interval);
            }
        }));
    }

    /// Shutdown sequence (spec §5): stop poller -> stop state machine ->
    /// drain event queue -> stop grab loop -> release camera -> close DB
    /// pool. Here that ordering is approximated by a single running flag
    /// (each actor polls it every tick) plus a join barrier, since the
    /// threads do not share a deeper internal state to stop piecewise.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("pipeline stopping");
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

struct SimulatedDioHandle(Arc<SimulatedDio>);

impl Clone for SimulatedDioHandle {
    fn clone(&self) -> Self {
        SimulatedDioHandle(self.0.clone())
    }
}

impl crate::sensor::dio::DioAdapter for SimulatedDioHandle {
    fn read_bit_a(&mut self) -> Result<bool, crate::error::DioError> {
        self.0.read_bit_a_shared()
    }
    fn read_bit_b(&mut self) -> Result<bool, crate::error::DioError> {
        self.0.read_bit_b_shared()
    }
}

fn decision_label(decision: Decision) -> Option<&'static str> {
    match decision {
        Decision::RecordStart => Some("record_start"),
        Decision::Save => Some("save"),
        Decision::Discard(DiscardKind::Timeout) => Some("discard_timeout"),
        Decision::Discard(DiscardKind::ReturnFromL) => Some("discard_return_from_l"),
        Decision::Discard(DiscardKind::UnexpectedEntry) => Some("discard_unexpected_entry"),
        Decision::None => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_decision(
    decision: Decision,
    now: Instant,
    recording_flag: &Arc<AtomicBool>,
    ring_buffer: &Arc<RingBuffer>,
    event_queue: &Arc<EventQueue>,
    save_root: &std::path::Path,
    total_discards: &Arc<std::sync::atomic::AtomicU64>,
) {
    match decision {
        Decision::RecordStart => {
            ring_buffer.clear();
            recording_flag.store(true, Ordering::SeqCst);
        }
        Decision::Save => {
            recording_flag.store(false, Ordering::SeqCst);
            let frames = ring_buffer.snapshot();
            if let (Some(first), Some(last)) = (frames.first(), frames.last()) {
                let event = SaveEvent {
                    output_dir: save_root.to_path_buf(),
                    window_start: first.captured_at,
                    window_end: last.captured_at,
                    frames,
                    enqueued_at: now,
                };
                event_queue.push(event);
            }
        }
        Decision::Discard(_) => {
            recording_flag.store(false, Ordering::SeqCst);
            ring_buffer.clear();
            total_discards.fetch_add(1, Ordering::SeqCst);
        }
        Decision::None => {}
    }
}

impl CaptureStatus {
    fn from_flags(recording: bool, processing: bool) -> Self {
        if processing {
            CaptureStatus::Processing
        } else if recording {
            CaptureStatus::Recording
        } else {
            CaptureStatus::Waiting
        }
    }
}
