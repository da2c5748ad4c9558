//! One named processing group: a small worker pool over its round-robin
//! share of images (spec §4.7 "Group completion").

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::db::models::Group;
use crate::db::ConnectionPool;
use crate::db::repository;
use crate::engine::analyzer::analyze_image;
use crate::engine::aggregator::candidate_verdict;
use crate::inference::InferenceAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    Processing,
    Completed,
    Error,
}

pub struct GroupReport {
    pub group: Group,
    pub state: GroupState,
    pub total: usize,
    pub processed: usize,
    pub failed_count: usize,
}

/// Number of worker threads per group (spec §4.7, "2-3 threads").
pub const WORKERS_PER_GROUP: usize = 3;

/// Processes one group's share of images against its own small worker
/// pool. A per-image failure is counted, not fatal; the group still
/// reports `Completed` as long as it ran (spec: "group failure does not
/// abort other groups").
pub fn run_group(
    group: Group,
    images: Vec<(PathBuf, u32)>,
    inspection_id: i64,
    inference: &(dyn InferenceAdapter + Sync),
    pool: &Arc<ConnectionPool>,
    ai_threshold_percent: u8,
    on_progress: impl Fn(usize, usize) + Sync,
) -> GroupReport {
    let total = images.len();
    if total == 0 {
        return GroupReport {
            group,
            state: GroupState::Completed,
            total: 0,
            processed: 0,
            failed_count: 0,
        };
    }

    let processed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let next_index = AtomicUsize::new(0);
    let images = &images;

    crossbeam::scope(|scope| {
        for _ in 0..WORKERS_PER_GROUP.min(total) {
            scope.spawn(|_| loop {
                let idx = next_index.fetch_add(1, Ordering::SeqCst);
                if idx >= images.len() {
                    break;
                }
                let (path, image_no) = &images[idx];
                match analyze_image(inference, inspection_id, path, *image_no, ai_threshold_percent) {
                    Some(analyzed) => {
                        if let Err(e) = repository::bulk_insert_details(pool, &analyzed.details) {
                            log::error!("bulk detail insert failed: {e}");
                            failed.fetch_add(1, Ordering::SeqCst);
                        } else if let Err(e) = repository::upsert_result(pool, &analyzed.result_delta) {
                            log::error!("result upsert failed: {e}");
                            failed.fetch_add(1, Ordering::SeqCst);
                        } else {
                            let candidate = candidate_verdict(
                                analyzed.result_delta.knot,
                                analyzed.result_delta.length,
                            );
                            if let Err(e) = repository::update_inspection_verdict(
                                pool,
                                inspection_id,
                                analyzed.any_defect,
                                candidate,
                            ) {
                                log::error!("verdict update failed: {e}");
                            }
                        }
                    }
                    None => {
                        failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(done, total);
            });
        }
    })
    .expect("group worker threads should not panic");

    let failed_count = failed.load(Ordering::SeqCst);
    // A group with at least one successful image still completes with
    // failed_count>0; only a total wipeout reports ERROR (spec §4.7).
    let state = if failed_count == total {
        GroupState::Error
    } else {
        GroupState::Completed
    };

    GroupReport {
        group,
        state,
        total,
        processed: processed.load(Ordering::SeqCst),
        failed_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::inference::Detection;
    use std::path::Path;
    use std::time::Duration;

    struct FailingInference;
    impl InferenceAdapter for FailingInference {
        fn predict(&self, _image_path: &Path) -> Result<Vec<Detection>, InferenceError> {
            Err(InferenceError::AdapterFailed("boom".into()))
        }
    }

    fn fresh_pool() -> Arc<ConnectionPool> {
        let tmp = std::env::temp_dir().join(format!(
            "wood-inspect-group-{}-{}.db",
            std::process::id(),
            rand::random::<u32>()
        ));
        Arc::new(ConnectionPool::new(&tmp, 5, Duration::from_millis(500)).unwrap())
    }

    #[test]
    fn total_wipeout_reports_error_not_completed() {
        let pool = fresh_pool();
        let inspection_id = repository::create_inspection(&pool, chrono::Local::now(), 50, "/tmp/x").unwrap();
        let images = vec![
            (PathBuf::from("No_0002.bmp"), 2),
            (PathBuf::from("No_0007.bmp"), 7),
        ];
        let report = run_group(
            Group::C,
            images,
            inspection_id,
            &FailingInference,
            &pool,
            50,
            |_, _| {},
        );
        assert_eq!(report.state, GroupState::Error);
        assert_eq!(report.failed_count, 2);
    }

    #[test]
    fn empty_group_reports_completed() {
        let pool = fresh_pool();
        let inspection_id = repository::create_inspection(&pool, chrono::Local::now(), 50, "/tmp/x").unwrap();
        let report = run_group(Group::D, vec![], inspection_id, &FailingInference, &pool, 50, |_, _| {});
        assert_eq!(report.state, GroupState::Completed);
        assert_eq!(report.total, 0);
    }
}
