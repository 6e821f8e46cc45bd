//! Confusion-matrix metrics over match outcomes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::matching::{MatchOutcome, OutcomeKind};

/// Report key for the cross-category summary row.
pub const OVERALL_KEY: &str = "overall";

/// Confusion counts and derived rates for one category or overall.
///
/// `fp` includes unmatched false positives. Filtered false positives count
/// as true negatives: the classifier pruned a report against a known-safe
/// location, which is the tool behaving correctly after refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMetrics {
    /// True positives
    pub tp: usize,
    /// False positives (including unmatched findings)
    pub fp: usize,
    /// True negatives (including filtered false positives)
    pub tn: usize,
    /// False negatives
    #[serde(rename = "fn")]
    pub fn_count: usize,
    /// tp / (tp + fp), 0 when the denominator is 0
    pub precision: f64,
    /// tp / (tp + fn), 0 when the denominator is 0
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0 when both are 0
    pub f1: f64,
    /// (tp + tn) / total, 0 when the denominator is 0
    pub accuracy: f64,
}

impl ConfusionMetrics {
    /// Build metrics from raw confusion counts.
    pub fn from_counts(tp: usize, fp: usize, tn: usize, fn_count: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_count);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let accuracy = ratio(tp + tn, tp + tn + fp + fn_count);

        Self {
            tp,
            fp,
            tn,
            fn_count,
            precision,
            recall,
            f1,
            accuracy,
        }
    }

    /// Count outcome kinds and derive rates.
    pub fn from_outcomes(outcomes: &[MatchOutcome]) -> Self {
        let mut tp = 0;
        let mut fp = 0;
        let mut tn = 0;
        let mut fn_count = 0;

        for outcome in outcomes {
            match outcome.kind() {
                OutcomeKind::Tp => tp += 1,
                OutcomeKind::Fp | OutcomeKind::FpUnmatched => fp += 1,
                OutcomeKind::Tn | OutcomeKind::FpFiltered => tn += 1,
                OutcomeKind::Fn => fn_count += 1,
            }
        }

        Self::from_counts(tp, fp, tn, fn_count)
    }

    /// Total number of outcomes these metrics were derived from.
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_count
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Compute per-category metrics plus an `overall` row that sums raw counts
/// across categories before deriving rates (rates are never averaged).
pub fn calculate(
    outcomes_by_category: &IndexMap<String, Vec<MatchOutcome>>,
) -> IndexMap<String, ConfusionMetrics> {
    let mut metrics = IndexMap::with_capacity(outcomes_by_category.len() + 1);
    let (mut tp, mut fp, mut tn, mut fn_count) = (0, 0, 0, 0);

    for (category, outcomes) in outcomes_by_category {
        let category_metrics = ConfusionMetrics::from_outcomes(outcomes);
        tp += category_metrics.tp;
        fp += category_metrics.fp;
        tn += category_metrics.tn;
        fn_count += category_metrics.fn_count;
        metrics.insert(category.clone(), category_metrics);
    }

    metrics.insert(
        OVERALL_KEY.to_string(),
        ConfusionMetrics::from_counts(tp, fp, tn, fn_count),
    );
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::findings::{Finding, ProgramPoint};
    use crate::core::truth::TruthItem;
    use approx::assert_relative_eq;

    fn truth(vuln: bool) -> TruthItem {
        TruthItem {
            category: "78".to_string(),
            file_path: "a/B.java".to_string(),
            class_name: "Svc".to_string(),
            method_name: "exec".to_string(),
            start_line: 40,
            end_line: 45,
            is_vulnerability: vuln,
            description: String::new(),
            remediation: String::new(),
        }
    }

    fn finding() -> Finding {
        Finding::new(
            "78",
            "rule",
            vec![
                ProgramPoint::new("a/B.java", "", "<p.Ctrl: void call(int)>", 10),
                ProgramPoint::new("a/B.java", "", "<p.Svc: void exec(int)>", 42),
            ],
            "src",
            "sink",
        )
        .unwrap()
    }

    fn outcome(kind: OutcomeKind) -> MatchOutcome {
        match kind {
            OutcomeKind::Tp => MatchOutcome::TruePositive {
                truth: truth(true),
                finding: finding(),
            },
            OutcomeKind::Fp => MatchOutcome::FalsePositive {
                truth: truth(false),
                finding: finding(),
            },
            OutcomeKind::Fn => MatchOutcome::FalseNegative { truth: truth(true) },
            OutcomeKind::Tn => MatchOutcome::TrueNegative {
                truth: truth(false),
            },
            OutcomeKind::FpUnmatched => MatchOutcome::UnmatchedFalsePositive {
                finding: finding(),
            },
            OutcomeKind::FpFiltered => MatchOutcome::FilteredFalsePositive {
                truth: truth(false),
                finding: finding(),
                filter_score: -0.16,
                filter_threshold: -0.1,
            },
        }
    }

    #[test]
    fn rates_from_mixed_outcomes() {
        // [TP, TP, FP, FN]
        let outcomes = vec![
            outcome(OutcomeKind::Tp),
            outcome(OutcomeKind::Tp),
            outcome(OutcomeKind::Fp),
            outcome(OutcomeKind::Fn),
        ];
        let metrics = ConfusionMetrics::from_outcomes(&outcomes);

        assert_eq!((metrics.tp, metrics.fp, metrics.tn, metrics.fn_count), (2, 1, 0, 1));
        assert_relative_eq!(metrics.precision, 2.0 / 3.0);
        assert_relative_eq!(metrics.recall, 2.0 / 3.0);
        assert_relative_eq!(metrics.f1, 2.0 / 3.0);
        assert_relative_eq!(metrics.accuracy, 0.5);
    }

    #[test]
    fn unmatched_counts_as_fp_and_filtered_as_tn() {
        let outcomes = vec![
            outcome(OutcomeKind::FpUnmatched),
            outcome(OutcomeKind::FpFiltered),
        ];
        let metrics = ConfusionMetrics::from_outcomes(&outcomes);
        assert_eq!(metrics.fp, 1);
        assert_eq!(metrics.tn, 1);
        assert_eq!(metrics.total(), outcomes.len());
    }

    #[test]
    fn zero_denominators_guard_to_zero() {
        let metrics = ConfusionMetrics::from_counts(0, 0, 0, 0);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1, 0.0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn overall_sums_counts_before_rates() {
        let mut by_category = IndexMap::new();
        by_category.insert(
            "22".to_string(),
            vec![outcome(OutcomeKind::Tp), outcome(OutcomeKind::Fp)],
        );
        by_category.insert(
            "78".to_string(),
            vec![outcome(OutcomeKind::Tp), outcome(OutcomeKind::Tp)],
        );

        let metrics = calculate(&by_category);
        let overall = &metrics[OVERALL_KEY];
        assert_eq!(overall.tp, 3);
        assert_eq!(overall.fp, 1);
        // 3/4, not the mean of 1/2 and 1.
        assert_relative_eq!(overall.precision, 0.75);

        // Category order is input order, with overall appended last.
        let keys: Vec<_> = metrics.keys().cloned().collect();
        assert_eq!(keys, vec!["22", "78", OVERALL_KEY]);
    }
}
