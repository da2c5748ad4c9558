//! Bounded single-producer/single-consumer hand-off of save jobs
//! (spec §4.6).
//!
//! A `crossbeam_queue::ArrayQueue` sized at construction, with an explicit
//! drop-oldest policy on overflow rather than blocking the producer, since
//! the producer here is the sensor-decision callback and must never stall.

use crossbeam_queue::ArrayQueue;
use log::warn;
use std::path::PathBuf;
use std::time::Instant;

use crate::frame::Frame;

#[derive(Debug, Clone)]
pub struct SaveEvent {
    pub output_dir: PathBuf,
    pub frames: Vec<Frame>,
    pub window_start: Instant,
    pub window_end: Instant,
    pub enqueued_at: Instant,
}

pub struct EventQueue {
    inner: ArrayQueue<SaveEvent>,
    dropped: std::sync::atomic::AtomicU64,
}

impl EventQueue {
    /// `capacity` is clamped to a floor of 8 (spec §4.6).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity.max(crate::config::EVENT_QUEUE_MIN_CAPACITY)),
            dropped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Never blocks. If full, drops the oldest un-started event and logs.
    pub fn push(&self, event: SaveEvent) {
        if let Err(event) = self.inner.push(event) {
            // queue full: evict the oldest event to make room, then retry
            let _ = self.inner.pop();
            self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            warn!("event queue full, dropped oldest save event");
            let _ = self.inner.push(event);
        }
    }

    pub fn pop(&self) -> Option<SaveEvent> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(t: Instant) -> SaveEvent {
        SaveEvent {
            output_dir: PathBuf::from("/tmp/x"),
            frames: vec![],
            window_start: t,
            window_end: t,
            enqueued_at: t,
        }
    }

    #[test]
    fn capacity_floor_enforced() {
        let q = EventQueue::new(1);
        assert_eq!(q.capacity(), crate::config::EVENT_QUEUE_MIN_CAPACITY);
    }

    #[test]
    fn fifo_order_preserved_under_capacity() {
        let q = EventQueue::new(8);
        let t = Instant::now();
        q.push(event_at(t));
        q.push(event_at(t));
        assert_eq!(q.len(), 2);
        assert!(q.pop().is_some());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn overflow_drops_oldest_and_counts_it() {
        let q = EventQueue::new(8);
        let t = Instant::now();
        for _ in 0..9 {
            q.push(event_at(t));
        }
        assert_eq!(q.len(), 8);
        assert_eq!(q.dropped_count(), 1);
    }
}
