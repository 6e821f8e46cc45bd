//! High-level evaluation engine.
//!
//! Wires the pipeline stages together: deduplicate findings per category,
//! match them against the truth table, compute confusion metrics, and
//! optionally refine tool-reported false positives with the similarity
//! classifier or tune the classifier's weights by grid search.

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::api::results::EvaluationResults;
use crate::core::config::FlowgradeConfig;
use crate::core::errors::Result;
use crate::core::findings::dedup_findings;
use crate::core::matching::{match_category, MatchOutcome};
use crate::core::metrics;
use crate::core::refine::{
    classify, grid_search, DistanceQuery, FilterStats, LabeledSample, OptimizationOutcome,
    WeightThresholdConfig,
};
use crate::core::truth::TruthTable;
use crate::io::inputs::FindingsByCategory;

/// Evaluation engine for one configured benchmark run.
#[derive(Debug)]
pub struct EvaluationEngine {
    config: FlowgradeConfig,
}

impl EvaluationEngine {
    /// Build an engine after validating its configuration.
    pub fn new(config: FlowgradeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine configuration.
    pub fn config(&self) -> &FlowgradeConfig {
        &self.config
    }

    /// Run the baseline pipeline: dedup, match, metrics.
    ///
    /// Categories are processed in configured order and independently;
    /// a category missing from either input side degrades to zero items
    /// on that side.
    pub fn evaluate(
        &self,
        findings_by_category: FindingsByCategory,
        truth_table: TruthTable,
    ) -> EvaluationResults {
        let mut findings_by_category = findings_by_category;
        let mut outcomes: IndexMap<String, Vec<MatchOutcome>> = IndexMap::new();

        for category in &self.config.evaluation.categories {
            let findings = findings_by_category.shift_remove(category).unwrap_or_default();
            let truth_items = truth_table.get(category).map(Vec::as_slice).unwrap_or(&[]);

            let deduped = dedup_findings(findings);
            info!(
                category = %category,
                findings = deduped.len(),
                truth_items = truth_items.len(),
                "matching category"
            );

            outcomes.insert(category.clone(), match_category(truth_items, &deduped));
        }

        let metrics = metrics::calculate(&outcomes);
        EvaluationResults {
            outcomes,
            metrics,
            filter_stats: None,
        }
    }

    /// Apply the similarity classifier to the false positives of an earlier
    /// evaluation.
    ///
    /// Queries are positional over the FP-labeled outcomes in category
    /// iteration order; when the queries run out, remaining false positives
    /// keep their label. Metrics are recomputed so pruned rows no longer
    /// count against precision.
    pub fn refine(
        &self,
        results: &EvaluationResults,
        queries: &[DistanceQuery],
        weights: &WeightThresholdConfig,
    ) -> Result<EvaluationResults> {
        weights.validate()?;

        let mut next_query = 0usize;
        let mut outcomes: IndexMap<String, Vec<MatchOutcome>> = IndexMap::new();

        for (category, category_outcomes) in &results.outcomes {
            let refined: Vec<MatchOutcome> = category_outcomes
                .iter()
                .map(|outcome| {
                    if !matches!(outcome, MatchOutcome::FalsePositive { .. }) {
                        return outcome.clone();
                    }
                    match queries.get(next_query) {
                        Some(query) => {
                            next_query += 1;
                            classify(outcome.clone(), query, weights)
                        }
                        None => {
                            warn!(
                                category = %category,
                                "similarity queries exhausted; keeping FP label"
                            );
                            outcome.clone()
                        }
                    }
                })
                .collect();
            outcomes.insert(category.clone(), refined);
        }

        let filter_stats = FilterStats::from_outcomes(&outcomes);
        info!(
            total_fp = filter_stats.total_fp,
            filtered = filter_stats.total_filtered,
            "classifier pass complete"
        );

        let metrics = metrics::calculate(&outcomes);
        Ok(EvaluationResults {
            outcomes,
            metrics,
            filter_stats: Some(filter_stats),
        })
    }

    /// Tune classifier weights and threshold against a labeled TP/FP set.
    pub fn optimize(&self, samples: &[LabeledSample]) -> Result<OptimizationOutcome> {
        grid_search(samples)
    }
}

/// Derive a labeled optimizer training set from evaluated outcomes and
/// their similarity queries.
///
/// TP and FP outcomes are paired positionally with queries, in category
/// iteration order; other outcome kinds contribute nothing. Pairing stops
/// with a warning when the queries run out.
pub fn labeled_samples(
    results: &EvaluationResults,
    queries: &[DistanceQuery],
) -> Vec<LabeledSample> {
    let mut samples = Vec::new();
    let mut next_query = 0usize;

    for outcomes in results.outcomes.values() {
        for outcome in outcomes {
            let is_true_positive = match outcome {
                MatchOutcome::TruePositive { .. } => true,
                MatchOutcome::FalsePositive { .. } => false,
                _ => continue,
            };

            let Some(query) = queries.get(next_query) else {
                warn!("similarity queries exhausted while building labeled samples");
                return samples;
            };
            next_query += 1;

            samples.push(LabeledSample {
                is_true_positive,
                semantic_distance: query.semantic_distance,
                code_distance: query.code_distance,
            });
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::findings::{Finding, ProgramPoint};
    use crate::core::truth::TruthItem;

    fn engine() -> EvaluationEngine {
        EvaluationEngine::new(FlowgradeConfig::default()).unwrap()
    }

    fn truth(category: &str, vuln: bool) -> TruthItem {
        TruthItem {
            category: category.to_string(),
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

    fn finding(category: &str) -> Finding {
        Finding::new(
            category,
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
    fn missing_categories_degrade_to_empty_sides() {
        let engine = engine();

        let mut findings = FindingsByCategory::new();
        findings.insert("78".to_string(), vec![finding("78")]);

        let mut truth_table = TruthTable::new();
        truth_table.insert("22".to_string(), vec![truth("22", true)]);

        let results = engine.evaluate(findings, truth_table);

        // 22 has truth but no findings -> FN; 78 has a finding but no
        // truth -> FP_UNMATCHED; 89 is empty on both sides.
        assert_eq!(results.outcomes["22"].len(), 1);
        assert_eq!(results.outcomes["78"].len(), 1);
        assert!(results.outcomes["89"].is_empty());

        let overall = results.overall().unwrap();
        assert_eq!(overall.fn_count, 1);
        assert_eq!(overall.fp, 1);
        assert_eq!(overall.recall, 0.0);
    }

    #[test]
    fn refine_pairs_queries_with_fp_outcomes_in_order() {
        let engine = engine();

        let mut findings = FindingsByCategory::new();
        findings.insert("78".to_string(), vec![finding("78")]);
        let mut truth_table = TruthTable::new();
        truth_table.insert("78".to_string(), vec![truth("78", false)]);

        let baseline = engine.evaluate(findings, truth_table);
        assert_eq!(baseline.metrics["78"].fp, 1);

        let weights = WeightThresholdConfig {
            semantic_weight: 0.6,
            code_weight: 0.4,
            threshold: -0.1,
        };
        let queries = vec![DistanceQuery {
            semantic_distance: 0.2,
            code_distance: 0.1,
        }];

        let refined = engine.refine(&baseline, &queries, &weights).unwrap();
        let stats = refined.filter_stats.as_ref().unwrap();
        assert_eq!(stats.total_filtered, 1);
        // The pruned row now counts as a true negative.
        assert_eq!(refined.metrics["78"].fp, 0);
        assert_eq!(refined.metrics["78"].tn, 1);
    }

    #[test]
    fn refine_keeps_fp_when_queries_run_out() {
        let engine = engine();

        let mut findings = FindingsByCategory::new();
        findings.insert("78".to_string(), vec![finding("78")]);
        let mut truth_table = TruthTable::new();
        truth_table.insert("78".to_string(), vec![truth("78", false)]);

        let baseline = engine.evaluate(findings, truth_table);
        let weights = WeightThresholdConfig {
            semantic_weight: 0.6,
            code_weight: 0.4,
            threshold: -0.1,
        };

        let refined = engine.refine(&baseline, &[], &weights).unwrap();
        assert_eq!(refined.metrics["78"].fp, 1);
        assert_eq!(refined.filter_stats.as_ref().unwrap().total_filtered, 0);
    }

    #[test]
    fn labeled_samples_follow_outcome_order() {
        let engine = engine();

        let mut findings = FindingsByCategory::new();
        findings.insert("78".to_string(), vec![finding("78")]);
        let mut truth_table = TruthTable::new();
        truth_table.insert(
            "78".to_string(),
            vec![truth("78", true), truth("78", false)],
        );

        let results = engine.evaluate(findings, truth_table);
        let queries = vec![
            DistanceQuery {
                semantic_distance: 0.1,
                code_distance: 0.1,
            },
            DistanceQuery {
                semantic_distance: 5.0,
                code_distance: 5.0,
            },
        ];

        let samples = labeled_samples(&results, &queries);
        assert_eq!(samples.len(), 2);
        assert!(samples[0].is_true_positive);
        assert!(!samples[1].is_true_positive);
        assert_eq!(samples[1].semantic_distance, 5.0);
    }
}
