//! Per-image analysis step (spec §4.7): inference, threshold filtering,
//! detail-row preparation, and the first-image synchronous bootstrap.

use std::path::Path;
use std::sync::Arc;

use crate::db::models::{InspectionDetail, InspectionResult};
use crate::db::ConnectionPool;
use crate::db::repository;
use crate::error::PoolError;
use crate::inference::{filter_by_threshold, Detection, InferenceAdapter};
use crate::labels::DefectClass;

/// Outcome of analyzing one image, ready for the caller to persist.
pub struct AnalyzedImage {
    pub image_path: String,
    pub image_no: u32,
    pub details: Vec<InspectionDetail>,
    pub result_delta: InspectionResult,
    pub any_defect: bool,
}

/// Runs inference on a single image and reduces it to persistable rows.
/// Never returns an error: an inference failure drops the per-image result
/// but lets the rest of the batch continue (spec §7).
pub fn analyze_image(
    inference: &dyn InferenceAdapter,
    inspection_id: i64,
    image_path: &Path,
    image_no: u32,
    ai_threshold_percent: u8,
) -> Option<AnalyzedImage> {
    let raw = match inference.predict(image_path) {
        Ok(detections) => detections,
        Err(e) => {
            log::warn!("inference failed for {}: {e}", image_path.display());
            return None;
        }
    };

    let retained = filter_by_threshold(raw, ai_threshold_percent);
    let path_str = image_path.to_string_lossy().to_string();

    let mut result = InspectionResult::new(inspection_id);
    let mut details = Vec::with_capacity(retained.len());

    for d in &retained {
        apply_flags(&mut result, d);
        details.push(InspectionDetail {
            inspection_id,
            class_id: d.class_id,
            class_label: DefectClass::from_id(d.class_id)
                .map(|c| c.label_ja().to_string())
                .unwrap_or_default(),
            x: d.x,
            y: d.y,
            w: d.w,
            h: d.h,
            length: d.max_dim() as f64 / 100.0,
            confidence: d.confidence,
            image_path: path_str.clone(),
            image_no,
        });
    }

    // Aggregate length: raw pixel max(w,h) of the largest retained detection
    // (spec §9 open question; matches the original's `int(max(w,h)/100*100)`).
    result.length = retained.iter().map(|d| d.max_dim() as i64).max().unwrap_or(0);

    Some(AnalyzedImage {
        image_path: path_str,
        image_no,
        any_defect: !details.is_empty(),
        details,
        result_delta: result,
    })
}

fn apply_flags(result: &mut InspectionResult, d: &Detection) {
    let Some(class) = d.class() else { return };
    use DefectClass::*;
    match class {
        Discoloration => result.discoloration = true,
        Hole => result.hole = true,
        DeadKnot => {
            result.knot = true;
            result.dead_knot = true;
        }
        FlowKnotDead | FlowKnotLive => {
            result.knot = true;
            result.tight_knot = true;
        }
        LiveKnot => {
            result.knot = true;
            result.live_knot = true;
        }
    }
}

/// First image is analyzed synchronously to create the `Inspection` row
/// before any child rows exist (spec §4.7 "First-image bootstrap").
pub fn bootstrap_inspection(
    pool: &Arc<ConnectionPool>,
    file_directory: &str,
    ai_threshold_percent: u8,
) -> Result<i64, PoolError> {
    repository::create_inspection(pool, chrono::Local::now(), ai_threshold_percent, file_directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;

    struct FixedInference(Vec<Detection>);
    impl InferenceAdapter for FixedInference {
        fn predict(&self, _image_path: &Path) -> Result<Vec<Detection>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingInference;
    impl InferenceAdapter for FailingInference {
        fn predict(&self, _image_path: &Path) -> Result<Vec<Detection>, InferenceError> {
            Err(InferenceError::AdapterFailed("boom".into()))
        }
    }

    #[test]
    fn dead_knot_and_hole_set_expected_flags() {
        let inference = FixedInference(vec![
            Detection { class_id: 1, confidence: 0.9, x: 0, y: 0, w: 10, h: 5 },
            Detection { class_id: 2, confidence: 0.9, x: 0, y: 0, w: 1200, h: 40 },
        ]);
        let analyzed = analyze_image(&inference, 1, Path::new("No_0001.bmp"), 1, 50).unwrap();
        assert!(analyzed.result_delta.hole);
        assert!(analyzed.result_delta.dead_knot);
        assert!(analyzed.result_delta.knot);
        assert!(!analyzed.result_delta.tight_knot);
        assert_eq!(analyzed.result_delta.length, 1_200);
        assert_eq!(analyzed.details.len(), 2);
    }

    #[test]
    fn below_threshold_detections_are_dropped() {
        let inference = FixedInference(vec![Detection {
            class_id: 5,
            confidence: 0.3,
            x: 0,
            y: 0,
            w: 50,
            h: 50,
        }]);
        let analyzed = analyze_image(&inference, 1, Path::new("No_0001.bmp"), 1, 50).unwrap();
        assert!(analyzed.details.is_empty());
        assert!(!analyzed.any_defect);
    }

    #[test]
    fn inference_failure_returns_none() {
        let analyzed = analyze_image(&FailingInference, 1, Path::new("No_0001.bmp"), 1, 50);
        assert!(analyzed.is_none());
    }

    #[test]
    fn flow_knot_variants_set_tight_knot_not_dead_or_live() {
        let inference = FixedInference(vec![Detection {
            class_id: 3,
            confidence: 0.9,
            x: 0,
            y: 0,
            w: 30,
            h: 10,
        }]);
        let analyzed = analyze_image(&inference, 1, Path::new("No_0001.bmp"), 1, 50).unwrap();
        assert!(analyzed.result_delta.tight_knot);
        assert!(!analyzed.result_delta.dead_knot);
        assert!(!analyzed.result_delta.live_knot);
    }
}
