//! Wraps the black-box defect detector; threshold filtering (spec §4.7).

use crate::error::InferenceError;
use crate::labels::DefectClass;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub class_id: u8,
    pub confidence: f32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Detection {
    pub fn class(&self) -> Option<DefectClass> {
        DefectClass::from_id(self.class_id)
    }

    /// `max(w,h)`, the shared basis for both the detail-row and
    /// result-row length units (spec §9 open question on length scaling).
    pub fn max_dim(&self) -> i32 {
        self.w.max(self.h)
    }
}

/// The detector itself is treated as a black box; this crate only consumes
/// `predict(path) -> {success, detections[], error?}`.
pub trait InferenceAdapter: Send + Sync {
    fn predict(&self, image_path: &Path) -> Result<Vec<Detection>, InferenceError>;
}

/// Filters raw detections to the ones retained under the configured
/// confidence threshold (spec §8, "Threshold filter": no detail row exists
/// with `confidence * 100 < ai_threshold`).
pub fn filter_by_threshold(detections: Vec<Detection>, ai_threshold_percent: u8) -> Vec<Detection> {
    let cutoff = ai_threshold_percent as f32 / 100.0;
    detections
        .into_iter()
        .filter(|d| d.confidence >= cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u8, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            x: 0,
            y: 0,
            w: 10,
            h: 20,
        }
    }

    #[test]
    fn filter_drops_below_cutoff() {
        let dets = vec![det(1, 0.3), det(2, 0.6)];
        let retained = filter_by_threshold(dets, 50);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].class_id, 2);
    }

    #[test]
    fn filter_keeps_exact_boundary() {
        let dets = vec![det(1, 0.5)];
        let retained = filter_by_threshold(dets, 50);
        assert_eq!(retained.len(), 1);
    }

    #[test]
    fn max_dim_picks_larger_of_w_h() {
        let d = det(1, 1.0);
        assert_eq!(d.max_dim(), 20);
    }
}
