//! Report records for downstream consumers.
//!
//! Outcome rows are trimmed to the fields a human report needs
//! (file/class/method/line plus the path signature for traceability), so
//! detailed result dumps stay compact.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::errors::{FlowgradeError, Result};
use crate::core::matching::MatchOutcome;
use crate::core::metrics::ConfusionMetrics;
use crate::core::refine::{FilterStats, OptimizationOutcome};

/// Truth fields carried into a report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimmedTruth {
    /// File the labeled location belongs to
    pub file_path: String,
    /// Class name of the labeled location
    pub class_name: String,
    /// Method name of the labeled location
    pub method_name: String,
    /// First line of the labeled range
    pub start_line: i64,
    /// Last line of the labeled range
    pub end_line: i64,
    /// Whether the location is a real vulnerability
    pub is_vulnerability: bool,
}

/// Finding fields carried into a report row, taken from the sink point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimmedFinding {
    /// File of the sink point
    pub file_path: String,
    /// Class of the sink point
    pub class_name: String,
    /// Method of the sink point
    pub method_name: String,
    /// Line of the sink point
    pub line_number: i64,
    /// Canonical path signature, kept for traceability
    pub path_signature: String,
}

/// One detailed report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Outcome label (TP, FP, FN, TN, FP_UNMATCHED, FP_FILTERED)
    pub result_type: String,
    /// Truth row the outcome resolved from, when matched against one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth_item: Option<TrimmedTruth>,
    /// Finding the outcome resolved from, when one was involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding_item: Option<TrimmedFinding>,
    /// Combined score that pruned the record, for filtered rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_score: Option<f64>,
    /// Threshold in force when the record was pruned, for filtered rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_threshold: Option<f64>,
}

impl OutcomeRecord {
    /// Trim a match outcome down to its report fields.
    pub fn from_outcome(outcome: &MatchOutcome) -> Self {
        let truth_item = outcome.truth().map(|truth| TrimmedTruth {
            file_path: truth.file_path.clone(),
            class_name: truth.class_name.clone(),
            method_name: truth.method_name.clone(),
            start_line: truth.start_line,
            end_line: truth.end_line,
            is_vulnerability: truth.is_vulnerability,
        });

        let finding_item = outcome.finding().map(|finding| {
            let (file_path, class_name, method_name, line_number) = match finding.sink() {
                Some(sink) => (
                    sink.file_path.clone(),
                    sink.class_name.clone(),
                    sink.method_name.clone(),
                    sink.line,
                ),
                None => (String::new(), String::new(), String::new(), 0),
            };
            TrimmedFinding {
                file_path,
                class_name,
                method_name,
                line_number,
                path_signature: finding.path_signature.clone(),
            }
        });

        let (filter_score, filter_threshold) = match outcome {
            MatchOutcome::FilteredFalsePositive {
                filter_score,
                filter_threshold,
                ..
            } => (Some(*filter_score), Some(*filter_threshold)),
            _ => (None, None),
        };

        Self {
            result_type: outcome.kind().as_str().to_string(),
            truth_item,
            finding_item,
            filter_score,
            filter_threshold,
        }
    }
}

/// Full evaluation report: detailed outcome rows plus per-category and
/// overall confusion metrics, JSON-serializable for downstream dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Detailed rows keyed by category, in input order
    pub outcomes: IndexMap<String, Vec<OutcomeRecord>>,
    /// Per-category metrics plus the `overall` row
    pub metrics: IndexMap<String, ConfusionMetrics>,
    /// Filter statistics, present after a classifier pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_stats: Option<FilterStats>,
}

impl EvaluationReport {
    /// Build a report from raw outcomes and computed metrics.
    pub fn new(
        outcomes_by_category: &IndexMap<String, Vec<MatchOutcome>>,
        metrics: IndexMap<String, ConfusionMetrics>,
        filter_stats: Option<FilterStats>,
    ) -> Self {
        let outcomes = outcomes_by_category
            .iter()
            .map(|(category, outcomes)| {
                let records = outcomes.iter().map(OutcomeRecord::from_outcome).collect();
                (category.clone(), records)
            })
            .collect();

        Self {
            outcomes,
            metrics,
            filter_stats,
        }
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Write the report to a JSON file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json_string()?;
        std::fs::write(path, content).map_err(|e| {
            FlowgradeError::io(format!("Failed to write report: {}", path.display()), e)
        })
    }
}

/// Persistable wrapper around an optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Grid-search outcome: winner plus full grid
    pub optimization: OptimizationOutcome,
}

impl OptimizationReport {
    /// Wrap an optimizer outcome for persistence.
    pub fn new(optimization: OptimizationOutcome) -> Self {
        Self { optimization }
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Write the report to a JSON file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json_string()?;
        std::fs::write(path, content).map_err(|e| {
            FlowgradeError::io(
                format!("Failed to write optimization report: {}", path.display()),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::findings::{Finding, ProgramPoint};
    use crate::core::truth::TruthItem;

    fn truth() -> TruthItem {
        TruthItem {
            category: "78".to_string(),
            file_path: "a/B.java".to_string(),
            class_name: "Svc".to_string(),
            method_name: "exec".to_string(),
            start_line: 40,
            end_line: 45,
            is_vulnerability: false,
            description: "desc".to_string(),
            remediation: "fix".to_string(),
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

    #[test]
    fn trims_matched_outcome_to_report_fields() {
        let outcome = MatchOutcome::FalsePositive {
            truth: truth(),
            finding: finding(),
        };
        let record = OutcomeRecord::from_outcome(&outcome);

        assert_eq!(record.result_type, "FP");
        let truth_item = record.truth_item.unwrap();
        assert_eq!(truth_item.class_name, "Svc");
        assert!(!truth_item.is_vulnerability);

        let finding_item = record.finding_item.unwrap();
        assert_eq!(finding_item.class_name, "Svc");
        assert_eq!(finding_item.method_name, "exec");
        assert_eq!(finding_item.line_number, 42);
        assert_eq!(finding_item.path_signature, "Ctrl:call -> Svc:exec");
        assert!(record.filter_score.is_none());
    }

    #[test]
    fn filtered_rows_carry_score_and_threshold() {
        let outcome = MatchOutcome::FilteredFalsePositive {
            truth: truth(),
            finding: finding(),
            filter_score: -0.16,
            filter_threshold: -0.1,
        };
        let record = OutcomeRecord::from_outcome(&outcome);
        assert_eq!(record.result_type, "FP_FILTERED");
        assert_eq!(record.filter_score, Some(-0.16));
        assert_eq!(record.filter_threshold, Some(-0.1));
    }

    #[test]
    fn unmatched_rows_have_no_truth_item() {
        let outcome = MatchOutcome::UnmatchedFalsePositive { finding: finding() };
        let record = OutcomeRecord::from_outcome(&outcome);
        assert_eq!(record.result_type, "FP_UNMATCHED");
        assert!(record.truth_item.is_none());
        assert!(record.finding_item.is_some());
    }

    #[test]
    fn report_serializes_without_empty_optionals() {
        let mut outcomes = IndexMap::new();
        outcomes.insert(
            "78".to_string(),
            vec![MatchOutcome::TrueNegative { truth: truth() }],
        );
        let metrics = crate::core::metrics::calculate(&outcomes);
        let report = EvaluationReport::new(&outcomes, metrics, None);

        let json = report.to_json_string().unwrap();
        assert!(json.contains("\"result_type\": \"TN\""));
        assert!(!json.contains("finding_item"));
        assert!(!json.contains("filter_stats"));

        let parsed: EvaluationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
