//! Presentation picker: choose up to five representative images for
//! operator review (spec §4.9).

use regex::Regex;
use std::sync::OnceLock;

use crate::db::models::{Group, InspectionDetail, Presentation};

fn image_no_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"No_(\d+)").expect("static pattern is valid"))
}

/// Extracts the image number from a path by the last `No_(\d+)` match.
pub(crate) fn extract_image_no(path: &str) -> Option<u32> {
    image_no_pattern()
        .captures_iter(path)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `3` for any knot class, `2` for hole, `1` for discoloration, `0` otherwise.
fn class_priority(class_id: u8) -> i32 {
    use crate::labels::DefectClass;
    match DefectClass::from_id(class_id) {
        Some(c) if c.is_knot() => 3,
        Some(DefectClass::Hole) => 2,
        Some(DefectClass::Discoloration) => 1,
        _ => 0,
    }
}

struct Candidate {
    path: String,
    image_no: u32,
    score: i64,
    has_defect: bool,
}

/// `score = priority * 1000 + length`; ties broken by larger length (which
/// the score formula already encodes, since priority dominates length).
fn score_image(details_for_image: &[&InspectionDetail]) -> i64 {
    details_for_image
        .iter()
        .map(|d| class_priority(d.class_id) as i64 * 1000 + d.length.round() as i64)
        .max()
        .unwrap_or(0)
}

/// Balanced partition into at most five contiguous groups: `floor(N/5)`
/// with the first `N mod 5` groups getting one extra (spec §4.9 step 3).
fn balanced_group_sizes(n: usize) -> Vec<usize> {
    if n <= 5 {
        return vec![1; n];
    }
    let base = n / 5;
    let extra = n % 5;
    (0..5).map(|i| base + if i < extra { 1 } else { 0 }).collect()
}

fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    if let Some(idx) = forward.find("/data/images/") {
        forward[idx + "/data/images/".len()..].to_string()
    } else if let Some(idx) = forward.rfind("/inspection/") {
        forward[idx + 1..].to_string()
    } else {
        forward
    }
}

/// Builds the presentation rows for one inspection from its saved paths
/// and persisted detail rows. Does not write to the database; callers
/// persist via `replace_presentations` inside a transaction.
pub fn pick_presentation(
    inspection_id: i64,
    paths: &[String],
    details: &[InspectionDetail],
) -> Vec<Presentation> {
    let mut numbered: Vec<(u32, &str)> = paths
        .iter()
        .filter_map(|p| extract_image_no(p).map(|no| (no, p.as_str())))
        .collect();
    numbered.sort_by_key(|(no, _)| *no);

    if numbered.is_empty() {
        return Vec::new();
    }

    let sizes = balanced_group_sizes(numbered.len());
    let mut rows = Vec::with_capacity(sizes.len());
    let mut offset = 0;

    for (group, size) in Group::ALL.into_iter().zip(sizes) {
        if size == 0 {
            continue;
        }
        let slice = &numbered[offset..offset + size];
        offset += size;

        let candidates: Vec<Candidate> = slice
            .iter()
            .map(|(no, path)| {
                let image_details: Vec<&InspectionDetail> =
                    details.iter().filter(|d| d.image_no == *no).collect();
                Candidate {
                    path: path.to_string(),
                    image_no: *no,
                    score: score_image(&image_details),
                    has_defect: !image_details.is_empty(),
                }
            })
            .collect();

        let chosen = if candidates.iter().any(|c| c.has_defect) {
            candidates
                .iter()
                .max_by_key(|c| (c.score, c.image_no))
                .expect("slice non-empty")
        } else {
            // fallback: middle image of the group (spec §4.9 step 5)
            &candidates[candidates.len() / 2]
        };

        rows.push(Presentation {
            inspection_id,
            group_name: group,
            image_path: normalize_path(&chosen.path),
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(image_no: u32, class_id: u8, length: f64) -> InspectionDetail {
        InspectionDetail {
            inspection_id: 1,
            class_id,
            class_label: String::new(),
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            length,
            confidence: 0.9,
            image_path: format!("No_{:04}.bmp", image_no),
            image_no,
        }
    }

    #[test]
    fn extracts_last_image_no_match() {
        assert_eq!(extract_image_no("/data/images/20260101_No_0007.bmp"), Some(7));
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(extract_image_no("image.bmp"), None);
    }

    #[test]
    fn balanced_sizes_distribute_remainder_to_first_groups() {
        assert_eq!(balanced_group_sizes(12), vec![3, 3, 2, 2, 2]);
        assert_eq!(balanced_group_sizes(3), vec![1, 1, 1]);
    }

    #[test]
    fn normalize_strips_data_images_prefix() {
        assert_eq!(
            normalize_path("/var/save/data/images/20260101_000000/No_0001.bmp"),
            "20260101_000000/No_0001.bmp"
        );
    }

    #[test]
    fn cardinality_is_subset_of_five_groups_no_duplicates() {
        let paths: Vec<String> = (1..=12).map(|i| format!("No_{:04}.bmp", i)).collect();
        let rows = pick_presentation(1, &paths, &[]);
        assert!(rows.len() <= 5);
        let mut seen = std::collections::HashSet::new();
        for r in &rows {
            assert!(seen.insert(r.group_name));
        }
    }

    #[test]
    fn defect_free_group_falls_back_to_middle_image() {
        let paths: Vec<String> = (1..=3).map(|i| format!("No_{:04}.bmp", i)).collect();
        let rows = pick_presentation(1, &paths, &[]);
        // n=3 -> each image its own group, first 3 groups A,B,C get one each
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn highest_severity_image_wins_within_a_group() {
        let paths: Vec<String> = (1..=5).map(|i| format!("No_{:04}.bmp", i)).collect();
        let details = vec![detail(1, 1, 3.0), detail(3, 2, 50.0)];
        let rows = pick_presentation(1, &paths, &details);
        // n=5 -> 5 separate groups, one image each; group C (3rd) should pick No_0003
        let group_c = rows.iter().find(|r| r.group_name == Group::C).unwrap();
        assert!(group_c.image_path.contains("0003"));
    }
}
