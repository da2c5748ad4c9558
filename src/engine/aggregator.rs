//! Fold per-image results into a per-inspection verdict (spec §4.8).
//!
//! The verdict threshold (`> 10`) is defined over the detail-row length
//! unit (`max(w,h)/100`), and `InspectionResult.length` is the raw pixel
//! `max(w,h)` itself (spec §9 open question), so the divided length is
//! recovered as `length / 100` rather than tracking a second running
//! maximum.

use crate::db::models::Verdict;

const VERDICT_LENGTH_THRESHOLD: f64 = 10.0;
const PIXEL_TO_DIVIDED_LENGTH: f64 = 100.0;

/// Computes the verdict a single `InspectionResult` snapshot implies,
/// without consulting history — callers upgrade-only via the DB's own
/// `max` against the previously stored verdict (spec §4.8, §8 "Monotone
/// verdict").
pub fn candidate_verdict(has_knots: bool, length: i64) -> Verdict {
    if !has_knots {
        return Verdict::NoDefect;
    }
    let divided_length = length as f64 / PIXEL_TO_DIVIDED_LENGTH;
    if divided_length > VERDICT_LENGTH_THRESHOLD {
        Verdict::Major
    } else {
        Verdict::Minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_knots_is_no_defect_regardless_of_length() {
        assert_eq!(candidate_verdict(false, 5_000), Verdict::NoDefect);
    }

    #[test]
    fn knots_under_threshold_is_minor() {
        // length=500 -> divided=5.0, below 10
        assert_eq!(candidate_verdict(true, 500), Verdict::Minor);
    }

    #[test]
    fn knots_over_threshold_is_major() {
        // spec seed scenario 4: dead_knot w=1200,h=40 -> length=max(w,h)=1200
        // divided = 1200/100 = 12.0 > 10
        assert_eq!(candidate_verdict(true, 1_200), Verdict::Major);
    }

    #[test]
    fn exact_boundary_is_not_major() {
        // divided length exactly 10 is not "> 10"
        assert_eq!(candidate_verdict(true, 1_000), Verdict::Minor);
    }
}
