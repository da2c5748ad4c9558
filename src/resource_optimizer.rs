//! Dynamic worker-count and per-queue throttling from CPU/RAM load
//! (spec §4.11).

use dashmap::DashMap;
use log::{info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::System;

const THROTTLE_SET_PCT: f32 = 80.0;
const THROTTLE_CLEAR_PCT: f32 = 40.0;

pub struct ResourceSample {
    pub cpu_pct: f32,
    pub memory_pct: f32,
    pub load_average_one: f64,
}

pub struct ResourceOptimizer {
    system: System,
    min_threads: usize,
    max_threads: usize,
    step: usize,
    cpu_high_pct: f32,
    memory_high_pct: f32,
    target_worker_count: AtomicUsize,
    critical: std::sync::atomic::AtomicBool,
    /// Queue name -> (size, cap) most recently reported.
    queue_throttled: DashMap<String, bool>,
}

impl ResourceOptimizer {
    pub fn new(
        default_workers: usize,
        min_threads: usize,
        max_threads: usize,
        step: usize,
        cpu_high_pct: f32,
        memory_high_pct: f32,
    ) -> Self {
        Self {
            system: System::new(),
            min_threads,
            max_threads,
            step,
            cpu_high_pct,
            memory_high_pct,
            target_worker_count: AtomicUsize::new(default_worker_count(default_workers, min_threads, max_threads)),
            critical: std::sync::atomic::AtomicBool::new(false),
            queue_throttled: DashMap::new(),
        }
    }

    /// Samples CPU%, memory%, and one-minute load average (spec §4.11,
    /// every 5s in the full loop; the cadence itself lives in the caller).
    pub fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        let cpu_pct = self.system.global_cpu_usage();
        let memory_pct = if self.system.total_memory() > 0 {
            self.system.used_memory() as f32 / self.system.total_memory() as f32 * 100.0
        } else {
            0.0
        };
        let load_average_one = System::load_average().one;
        ResourceSample {
            cpu_pct,
            memory_pct,
            load_average_one,
        }
    }

    /// Applies the every-30s worker-count adjustment rule (spec §4.11).
    pub fn adjust_worker_count(&self, sample: &ResourceSample) -> usize {
        let current = self.target_worker_count.load(Ordering::SeqCst);
        let mut next = current;

        if sample.cpu_pct > self.cpu_high_pct {
            next = current.saturating_sub(self.step).max(self.min_threads);
        } else if sample.cpu_pct < 50.0 && sample.memory_pct < self.memory_high_pct {
            next = (current + self.step).min(self.max_threads);
        }
        if sample.memory_pct > self.memory_high_pct {
            next = next.saturating_sub(self.step).max(self.min_threads);
        }

        self.critical.store(sample.memory_pct > 90.0, Ordering::SeqCst);
        if self.critical.load(Ordering::SeqCst) {
            warn!("resource optimizer: memory critical at {:.1}%", sample.memory_pct);
        }

        if next != current {
            info!("worker count adjusted {current} -> {next} (cpu={:.1}%, mem={:.1}%)", sample.cpu_pct, sample.memory_pct);
        }
        self.target_worker_count.store(next, Ordering::SeqCst);
        next
    }

    pub fn target_worker_count(&self) -> usize {
        self.target_worker_count.load(Ordering::SeqCst)
    }

    pub fn is_memory_critical(&self) -> bool {
        self.critical.load(Ordering::SeqCst)
    }

    /// Updates a named queue's throttle flag with hysteresis: set above
    /// 80% of capacity, clear below 40% (spec §4.11). Values between the
    /// two bands leave the flag unchanged.
    pub fn report_queue_size(&self, queue_name: &str, size: usize, capacity: usize) -> bool {
        if capacity == 0 {
            return false;
        }
        let pct = size as f32 / capacity as f32 * 100.0;
        let mut entry = self.queue_throttled.entry(queue_name.to_string()).or_insert(false);
        if pct > THROTTLE_SET_PCT {
            *entry = true;
        } else if pct < THROTTLE_CLEAR_PCT {
            *entry = false;
        }
        *entry
    }

    pub fn is_queue_throttled(&self, queue_name: &str) -> bool {
        self.queue_throttled.get(queue_name).map(|v| *v).unwrap_or(false)
    }
}

fn default_worker_count(default_workers: usize, min: usize, max: usize) -> usize {
    default_workers.clamp(min, max)
}
