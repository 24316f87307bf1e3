//! Fidelity scores (0–3) from a list of verdicts.

use crate::model::{Importance, TestResult};

/// - `0`: no results, or no basic case passes (including "no basic cases");
/// - `1`: some but not all basic cases pass;
/// - `2`: every basic case passes, some edge case fails;
/// - `3`: everything passes.
pub fn calculate_score(results: &[TestResult]) -> u8 {
    if results.is_empty() {
        return 0;
    }

    let (basic, edge): (Vec<&TestResult>, Vec<&TestResult>) = results
        .iter()
        .partition(|result| result.importance == Importance::Basic);

    let basic_passed = basic.iter().filter(|result| result.passed).count();
    if basic_passed == 0 {
        return 0;
    }
    if basic_passed < basic.len() {
        return 1;
    }
    if edge.iter().all(|result| result.passed) {
        3
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JsonMap, OperationType};
    use pretty_assertions::assert_eq;

    fn result(passed: bool, importance: Importance) -> TestResult {
        TestResult {
            test_case_id: "case".to_string(),
            operation: OperationType::Read,
            passed,
            expected: JsonMap::new(),
            actual: JsonMap::new(),
            notes: None,
            importance,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn empty_scores_zero() {
        assert_eq!(calculate_score(&[]), 0);
    }

    #[test]
    fn all_pass_scores_three() {
        let results = [
            result(true, Importance::Basic),
            result(true, Importance::Basic),
            result(true, Importance::Edge),
        ];
        assert_eq!(calculate_score(&results), 3);
    }

    #[test]
    fn failing_edge_case_caps_at_two() {
        let results = [
            result(true, Importance::Basic),
            result(false, Importance::Edge),
            result(true, Importance::Edge),
        ];
        assert_eq!(calculate_score(&results), 2);
    }

    #[test]
    fn partial_basic_pass_scores_one() {
        let results = [
            result(true, Importance::Basic),
            result(false, Importance::Basic),
            result(true, Importance::Edge),
        ];
        assert_eq!(calculate_score(&results), 1);
    }

    #[test]
    fn no_basic_pass_scores_zero() {
        let results = [result(false, Importance::Basic), result(true, Importance::Edge)];
        assert_eq!(calculate_score(&results), 0);
    }

    #[test]
    fn edge_only_results_score_zero() {
        let results = [result(true, Importance::Edge), result(true, Importance::Edge)];
        assert_eq!(calculate_score(&results), 0);
    }

    #[test]
    fn basic_only_results_score_three() {
        assert_eq!(calculate_score(&[result(true, Importance::Basic)]), 3);
    }
}
