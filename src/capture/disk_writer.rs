//! Batch image write to a timestamped directory (spec §4.5).
//!
//! Uses the `image` crate's BMP encoder rather than hand-rolling the
//! bitmap format; `chrono` supplies the wall-clock directory name, kept
//! separate from the `Instant`-based timing reports.

use chrono::Local;
use image::{ImageBuffer, Rgb};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::WriterError;
use crate::frame::Frame;

#[derive(Debug, Serialize)]
struct TimingReport {
    frame_count: usize,
    window_start_offset_secs: f64,
    window_end_offset_secs: f64,
    per_frame_offsets_secs: Vec<f64>,
}

pub struct WriteOutcome {
    pub directory: PathBuf,
    pub paths: Vec<PathBuf>,
}

/// Creates `{save_root}/YYYYMMDD_HHMMSS/`, writes `No_%04d.bmp` for each
/// frame in order, and best-effort timing reports alongside.
pub fn write_batch(
    save_root: &Path,
    frames: &[Frame],
    reference_instant: Instant,
) -> Result<WriteOutcome, WriterError> {
    if frames.is_empty() {
        return Err(WriterError::EmptyBuffer);
    }

    let dir_name = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let directory = save_root.join(dir_name);
    std::fs::create_dir_all(&directory)?;

    let mut paths = Vec::with_capacity(frames.len());
    let mut offsets = Vec::with_capacity(frames.len());

    for (i, frame) in frames.iter().enumerate() {
        let filename = format!("No_{:04}.bmp", i);
        let path = directory.join(&filename);
        encode_bgr_bmp(frame, &path)?;
        paths.push(path);
        offsets.push(frame.captured_at.saturating_duration_since(reference_instant).as_secs_f64());
    }

    write_timing_reports(&directory, &offsets);

    Ok(WriteOutcome { directory, paths })
}

fn encode_bgr_bmp(frame: &Frame, path: &Path) -> Result<(), WriterError> {
    let mut bgr = frame.image_bytes.to_vec();
    for px in bgr.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    let buffer: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(frame.width, frame.height, bgr)
        .ok_or_else(|| WriterError::Encode("frame byte length mismatch".into()))?;
    buffer
        .save_with_format(path, image::ImageFormat::Bmp)
        .map_err(|e| WriterError::Encode(e.to_string()))?;
    Ok(())
}

/// Best-effort, non-authoritative: failures here are logged, never
/// propagated (spec §4.5).
fn write_timing_reports(directory: &Path, offsets: &[f64]) {
    let report = TimingReport {
        frame_count: offsets.len(),
        window_start_offset_secs: offsets.first().copied().unwrap_or(0.0),
        window_end_offset_secs: offsets.last().copied().unwrap_or(0.0),
        per_frame_offsets_secs: offsets.to_vec(),
    };

    if let Ok(json) = serde_json::to_string_pretty(&report) {
        if let Err(e) = std::fs::write(directory.join("timing_report.json"), json) {
            log::warn!("failed to write timing_report.json: {e}");
        }
    }

    let mut text = format!("frames written: {}\n", report.frame_count);
    for (i, offset) in offsets.iter().enumerate() {
        text.push_str(&format!("No_{:04}.bmp @ {:.3}s\n", i, offset));
    }
    if let Err(e) = std::fs::write(directory.join("timing_report.txt"), text) {
        log::warn!("failed to write timing_report.txt: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn writes_expected_filenames() {
        let tmp = std::env::temp_dir().join(format!("wood-inspect-test-{}", std::process::id()));
        let base = Instant::now();
        let frames = vec![
            Frame::new(vec![10u8; 12], 2, 2, base),
            Frame::new(vec![20u8; 12], 2, 2, base + Duration::from_millis(100)),
        ];
        let outcome = write_batch(&tmp, &frames, base).unwrap();
        assert_eq!(outcome.paths.len(), 2);
        assert!(outcome.paths[0].ends_with("No_0000.bmp"));
        assert!(outcome.paths[1].ends_with("No_0001.bmp"));
        assert!(outcome.directory.join("timing_report.json").exists());
        assert!(outcome.directory.join("timing_report.txt").exists());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_frames_error() {
        let tmp = std::env::temp_dir().join("wood-inspect-test-empty");
        let err = write_batch(&tmp, &[], Instant::now()).unwrap_err();
        assert!(matches!(err, WriterError::EmptyBuffer));
    }
}
