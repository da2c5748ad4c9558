//! Time-window filter and fixed-cadence resampling of a buffer snapshot
//! (spec §4.5).

use std::time::{Duration, Instant};

use crate::error::WriterError;
use crate::frame::Frame;

/// Resamples `window_frames` (already filtered to `[window_start,
/// window_end]`) onto an ideal fixed-cadence grid at `target_fps`.
///
/// `ideal_count = floor((window_end - window_start) * target_fps) + 1`. For
/// each grid point, picks the closest-timestamped frame; duplicates are
/// allowed when the buffer is underfilled. Falls back to "use everything"
/// when no timestamps are usable, and fails only if that's still empty.
pub fn extract(
    window_frames: &[Frame],
    window_start: Instant,
    window_end: Instant,
    target_fps: u32,
) -> Result<Vec<Frame>, WriterError> {
    if window_frames.is_empty() {
        return Err(WriterError::EmptyBuffer);
    }

    let interval = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
    let span = window_end.saturating_duration_since(window_start);
    let ideal_count = (span.as_secs_f64() * target_fps as f64).floor() as usize + 1;

    let mut out = Vec::with_capacity(ideal_count);
    for i in 0..ideal_count {
        let target = window_start + interval * i as u32;
        let closest = window_frames
            .iter()
            .min_by_key(|f| abs_diff(f.captured_at, target))
            .expect("window_frames checked non-empty above");
        out.push(closest.clone());
    }
    Ok(out)
}

/// Fallback path: no timestamped frames usable at all for the window
/// (legacy format or truly empty buffer window); use everything available.
pub fn extract_or_fallback(
    window_frames: &[Frame],
    fallback_frames: &[Frame],
    window_start: Instant,
    window_end: Instant,
    target_fps: u32,
) -> Result<Vec<Frame>, WriterError> {
    if !window_frames.is_empty() {
        return extract(window_frames, window_start, window_end, target_fps);
    }
    if !fallback_frames.is_empty() {
        return Ok(fallback_frames.to_vec());
    }
    Err(WriterError::EmptyBuffer)
}

fn abs_diff(a: Instant, b: Instant) -> Duration {
    if a >= b {
        a.duration_since(b)
    } else {
        b.duration_since(a)
    }
}
