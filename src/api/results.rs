//! Evaluation results for public API consumption.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::matching::MatchOutcome;
use crate::core::metrics::{ConfusionMetrics, OVERALL_KEY};
use crate::core::refine::FilterStats;
use crate::io::reports::EvaluationReport;

/// Full result of one evaluation (or refinement) pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResults {
    /// Match outcomes keyed by category, in configured order
    pub outcomes: IndexMap<String, Vec<MatchOutcome>>,
    /// Per-category metrics plus the `overall` row
    pub metrics: IndexMap<String, ConfusionMetrics>,
    /// Filter statistics, present after a classifier pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_stats: Option<FilterStats>,
}

impl EvaluationResults {
    /// Metrics summed across all categories.
    pub fn overall(&self) -> Option<&ConfusionMetrics> {
        self.metrics.get(OVERALL_KEY)
    }

    /// Metrics for one category.
    pub fn category_metrics(&self, category: &str) -> Option<&ConfusionMetrics> {
        self.metrics.get(category)
    }

    /// Total number of outcomes across all categories.
    pub fn total_outcomes(&self) -> usize {
        self.outcomes.values().map(Vec::len).sum()
    }

    /// Build the trimmed, serializable report for downstream consumers.
    pub fn to_report(&self) -> EvaluationReport {
        EvaluationReport::new(&self.outcomes, self.metrics.clone(), self.filter_stats.clone())
    }
}
