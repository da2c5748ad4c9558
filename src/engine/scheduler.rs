//! Round-robin distribution of saved images across five groups, with the
//! first-image synchronous bootstrap (spec §4.7 "Distribution").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::models::Group;
use crate::db::ConnectionPool;
use crate::db::repository;
use crate::engine::analyzer::analyze_image;
use crate::engine::aggregator::candidate_verdict;
use crate::engine::group::{run_group, GroupReport};
use crate::error::PoolError;
use crate::inference::InferenceAdapter;
use crate::presentation::extract_image_no;

pub struct AnalysisOutcome {
    pub inspection_id: i64,
    pub group_reports: Vec<GroupReport>,
}

/// `image_no` comes from the written filename (`No_(\d+)`, 0-based), not
/// from list position, so it matches the number the presentation picker
/// later extracts from the same path (spec §3, "`image_no` (from filename)").
fn image_no_for(path: &Path) -> u32 {
    extract_image_no(&path.to_string_lossy()).unwrap_or(0)
}

/// Distributes `paths` across groups `A..E` by `index mod 5`, where `index`
/// is each path's position in the full batch (`start_index` offsets that
/// position when `paths` is a suffix, so a synchronously-analyzed first
/// image still counts toward the round-robin); empty groups are skipped by
/// `run_group` returning an immediate `Completed(total=0)`.
fn partition_round_robin(paths: &[PathBuf], start_index: usize) -> [Vec<(PathBuf, u32)>; 5] {
    let mut groups: [Vec<(PathBuf, u32)>; 5] = Default::default();
    for (offset, path) in paths.iter().enumerate() {
        let absolute_index = start_index + offset;
        groups[absolute_index % 5].push((path.clone(), image_no_for(path)));
    }
    groups
}

/// Entry point for the parallel analysis engine (spec §4.7). Analyzes the
/// first image synchronously to create the parent row, then fans the rest
/// across the five groups.
pub fn analyze_batch(
    paths: &[PathBuf],
    file_directory: &str,
    inference: &(dyn InferenceAdapter + Sync),
    pool: &Arc<ConnectionPool>,
    ai_threshold_percent: u8,
    on_progress: impl Fn(Group, usize, usize) + Sync,
) -> Result<AnalysisOutcome, PoolError> {
    let Some((first_path, rest)) = paths.split_first() else {
        return Err(PoolError::NonTransient("no images to analyze".into()));
    };

    let inspection_id =
        repository::create_inspection(pool, chrono::Local::now(), ai_threshold_percent, file_directory)?;

    apply_first_image(first_path, inspection_id, inference, pool, ai_threshold_percent);
    on_progress(Group::A, 1, paths.len());

    let groups = partition_round_robin(rest, 1);

    let mut reports = Vec::with_capacity(5);
    for (idx, group) in Group::ALL.into_iter().enumerate() {
        let report = run_group(
            group,
            groups[idx].clone(),
            inspection_id,
            inference,
            pool,
            ai_threshold_percent,
            |done, total| on_progress(group, done, total),
        );
        reports.push(report);
    }

    Ok(AnalysisOutcome {
        inspection_id,
        group_reports: reports,
    })
}

fn apply_first_image(
    path: &Path,
    inspection_id: i64,
    inference: &(dyn InferenceAdapter + Sync),
    pool: &Arc<ConnectionPool>,
    ai_threshold_percent: u8,
) {
    let image_no = image_no_for(path);
    let Some(analyzed) = analyze_image(inference, inspection_id, path, image_no, ai_threshold_percent)
    else {
        return;
    };
    if let Err(e) = repository::bulk_insert_details(pool, &analyzed.details) {
        log::error!("first-image detail insert failed: {e}");
        return;
    }
    if let Err(e) = repository::upsert_result(pool, &analyzed.result_delta) {
        log::error!("first-image result upsert failed: {e}");
        return;
    }
    let candidate = candidate_verdict(analyzed.result_delta.knot, analyzed.result_delta.length);
    if let Err(e) =
        repository::update_inspection_verdict(pool, inspection_id, analyzed.any_defect, candidate)
    {
        log::error!("first-image verdict update failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_round_robin_assigns_by_index_mod_5() {
        let paths: Vec<PathBuf> = (0..12).map(|i| PathBuf::from(format!("No_{:04}.bmp", i))).collect();
        let groups = partition_round_robin(&paths, 0);
        assert_eq!(groups[0].len(), 3); // indices 0,5,10
        assert_eq!(groups[1].len(), 3); // 1,6,11
        assert_eq!(groups[2].len(), 2); // 2,7
        assert_eq!(groups[3].len(), 2); // 3,8
        assert_eq!(groups[4].len(), 2); // 4,9
    }

    #[test]
    fn image_no_is_parsed_from_filename_not_position() {
        // spec seed scenario 6: with a 1-offset start_index (first image
        // handled synchronously), path "No_0007.bmp" at list position 6
        // lands at absolute index 7 (group C) but keeps image_no=7, the
        // 0-based number in its own filename, not 8.
        let paths = vec![PathBuf::from("/data/images/x/No_0007.bmp")];
        let groups = partition_round_robin(&paths, 1);
        assert_eq!(groups[2], vec![(paths[0].clone(), 7)]);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let paths: Vec<PathBuf> = vec![];
        assert_eq!(partition_round_robin(&paths, 0).iter().map(|g| g.len()).sum::<usize>(), 0);
    }
}
