//! Configuration shape recognized by the core (spec §6).
//!
//! Loading (file discovery, env overlay) is an external collaborator
//! (spec §1); this module only defines the keys and their defaults.
//! Components take already-resolved parameters (`Config` fields passed
//! into constructors) rather than reading configuration themselves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub exposure_us: u32,
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            exposure_us: 5_000,
            target_fps: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub max_seconds: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { max_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub simulation_mode: bool,
    pub bit_a: u8,
    pub bit_b: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            simulation_mode: true,
            bit_a: 0,
            bit_b: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_threads: usize,
    pub max_threads: usize,
    pub thread_adjustment_step: usize,
    pub cpu_high_pct: f32,
    pub memory_high_pct: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_threads: 5,
            max_threads: 15,
            thread_adjustment_step: 2,
            cpu_high_pct: 85.0,
            memory_high_pct: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub root_dir: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            root_dir: "data/images".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    pub update_interval_ms: u64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 500, // 2 Hz, per spec §4.12
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub buffer: BufferConfig,
    pub sensor: SensorConfig,
    pub analysis: AnalysisConfig,
    pub save: SaveConfig,
    pub sse: SseConfig,
    /// AI confidence threshold percentage, 10..100 (spec §4.7).
    pub ai_threshold_percent: u8,
}

impl Config {
    pub fn new() -> Self {
        Self {
            ai_threshold_percent: 50,
            ..Default::default()
        }
    }
}

/// Maximum recording duration before a DISCARD(timeout) (spec §4.3 default 20s).
pub const T_MAX_SECS: u64 = 20;
/// Default consecutive grab-error count that triggers recovery (spec §4.4).
pub const GRAB_FAILURE_THRESHOLD: u32 = 5;
/// Default max recovery attempts per incident (spec §4.4).
pub const GRAB_RECOVERY_ATTEMPTS: u32 = 3;
/// Event queue capacity floor (spec §4.6).
pub const EVENT_QUEUE_MIN_CAPACITY: usize = 8;
/// DB pool borrow timeout (spec §4.10).
pub const DB_BORROW_TIMEOUT_MS: u64 = 5_000;
