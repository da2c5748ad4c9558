//! Consumer loop: dequeues `SaveEvent`s, resamples, writes to disk, and
//! launches analysis (spec §4.5, §4.6).

use log::{error, info};
use std::path::Path;
use std::time::Instant;

use crate::capture::disk_writer;
use crate::capture::frame_extractor;
use crate::events::queue::{EventQueue, SaveEvent};

/// Result of handling one dequeued save event, reported upward so the
/// caller (pipeline orchestration) can kick off analysis and update status.
pub struct ProcessedSave {
    pub directory: std::path::PathBuf,
    pub paths: Vec<std::path::PathBuf>,
    pub window_start: Instant,
    pub window_end: Instant,
}

pub struct EventProcessor {
    save_root: std::path::PathBuf,
    target_fps: u32,
}

impl EventProcessor {
    pub fn new(save_root: impl AsRef<Path>, target_fps: u32) -> Self {
        Self {
            save_root: save_root.as_ref().to_path_buf(),
            target_fps,
        }
    }

    /// Handles a single event: resample onto the ideal grid, write to disk.
    /// Returns `None` on failure (logged, never propagated out of the loop
    /// per the error-handling propagation policy).
    pub fn handle(&self, event: SaveEvent) -> Option<ProcessedSave> {
        let resampled = match frame_extractor::extract_or_fallback(
            &event.frames,
            &event.frames,
            event.window_start,
            event.window_end,
            self.target_fps,
        ) {
            Ok(frames) => frames,
            Err(e) => {
                error!("frame extraction failed: {e}");
                return None;
            }
        };

        match disk_writer::write_batch(&self.save_root, &resampled, event.window_start) {
            Ok(outcome) => {
                info!(
                    "wrote {} frames to {}",
                    outcome.paths.len(),
                    outcome.directory.display()
                );
                Some(ProcessedSave {
                    directory: outcome.directory,
                    paths: outcome.paths,
                    window_start: event.window_start,
                    window_end: event.window_end,
                })
            }
            Err(e) => {
                error!("disk write failed: {e}");
                None
            }
        }
    }

    /// Drains the queue until `should_stop` returns true, invoking
    /// `on_processed` for every successfully written batch.
    pub fn run(
        &self,
        queue: &EventQueue,
        mut should_stop: impl FnMut() -> bool,
        mut on_processed: impl FnMut(ProcessedSave),
    ) {
        while !should_stop() {
            match queue.pop() {
                Some(event) => {
                    if let Some(processed) = self.handle(event) {
                        on_processed(processed);
                    }
                }
                None => std::thread::sleep(std::time::Duration::from_millis(10)),
            }
        }
    }
}
