//! Bounded, time-stamped frame store (spec §4.1).
//!
//! One writer (the grab loop), many readers (event processor, status
//! broker). A single mutex around the deque is adequate at buffer depths
//! of a few hundred frames; lock-free structures aren't worth the
//! complexity at this scale.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Instant;

use crate::frame::Frame;

pub struct RingBuffer {
    capacity: usize,
    inner: Mutex<VecDeque<Frame>>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Capacity derived from `max_buffer_seconds * target_fps` (spec §3 default 300).
    pub fn with_seconds_and_fps(max_seconds: u32, target_fps: u32) -> Self {
        Self::new((max_seconds as usize) * (target_fps as usize))
    }

    /// Append; drop the oldest frame if at capacity. Non-blocking.
    pub fn push(&self, frame: Frame) {
        let mut guard = self.inner.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(frame);
    }

    /// Immutable copy of current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Snapshot filtered to `t_lo <= captured_at <= t_hi`.
    pub fn window(&self, t_lo: Instant, t_hi: Instant) -> Vec<Frame> {
        self.inner
            .lock()
            .iter()
            .filter(|f| f.captured_at >= t_lo && f.captured_at <= t_hi)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame_at(t: Instant) -> Frame {
        Frame::new(vec![0u8; 4], 1, 1, t)
    }

    #[test]
    fn drops_oldest_at_capacity() {
        let rb = RingBuffer::new(3);
        let base = Instant::now();
        for i in 0..5u64 {
            rb.push(frame_at(base + Duration::from_millis(i)));
        }
        assert_eq!(rb.len(), 3);
        let snap = rb.snapshot();
        // oldest two (i=0,1) must have been dropped
        assert_eq!(snap.len(), 3);
        assert!(snap[0].captured_at >= base + Duration::from_millis(2));
    }

    #[test]
    fn snapshot_is_non_decreasing() {
        let rb = RingBuffer::new(300);
        let base = Instant::now();
        for i in 0..50u64 {
            rb.push(frame_at(base + Duration::from_millis(i * 10)));
        }
        let snap = rb.snapshot();
        for w in snap.windows(2) {
            assert!(w[0].captured_at <= w[1].captured_at);
        }
    }

    #[test]
    fn window_filters_inclusive_bounds() {
        let rb = RingBuffer::new(300);
        let base = Instant::now();
        for i in 0..20u64 {
            rb.push(frame_at(base + Duration::from_millis(i * 100)));
        }
        let lo = base + Duration::from_millis(300);
        let hi = base + Duration::from_millis(900);
        let win = rb.window(lo, hi);
        assert_eq!(win.len(), 7); // 300,400,...,900 ms inclusive
    }

    #[test]
    fn clear_empties_buffer() {
        let rb = RingBuffer::new(10);
        rb.push(frame_at(Instant::now()));
        rb.clear();
        assert!(rb.is_empty());
    }

    #[test]
    fn capacity_matches_seconds_times_fps() {
        let rb = RingBuffer::with_seconds_and_fps(30, 10);
        assert_eq!(rb.capacity(), 300);
    }
}
