//! Similarity-based false-positive refinement.
//!
//! A reviewed finding comes with two externally computed distances to the
//! nearest known-safe pattern: a semantic distance and a code distance.
//! The combined score is the negated weighted sum of the two, so that
//! "more similar to a known-safe pattern" ranks higher. False positives
//! whose score falls below a tuned threshold are relabeled as safely
//! prunable; the weight pair and threshold are found by grid search against
//! a labeled TP/FP set.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::errors::{FlowgradeError, Result};
use crate::core::matching::MatchOutcome;

/// Distances from one reviewed finding to its nearest known-safe archetype.
///
/// Smaller means more similar. Produced by an external similarity-query
/// service; this core only consumes the two numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceQuery {
    /// Embedding-space distance of the finding's surrounding semantics
    pub semantic_distance: f64,
    /// Structural distance of the finding's code
    pub code_distance: f64,
}

impl DistanceQuery {
    /// Check that both distances are finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("semantic_distance", self.semantic_distance),
            ("code_distance", self.code_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FlowgradeError::validation_field(
                    format!("distance must be finite and non-negative, got {value}"),
                    name,
                ));
            }
        }
        Ok(())
    }
}

/// Tuned weight pair and score cutoff for the similarity classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightThresholdConfig {
    /// Weight of the semantic distance, in (0, 1)
    pub semantic_weight: f64,
    /// Weight of the code distance, in (0, 1); sums to 1 with the above
    pub code_weight: f64,
    /// Combined-score cutoff: scores below it mark a prunable false positive
    pub threshold: f64,
}

impl WeightThresholdConfig {
    /// Check weight-range, weight-sum, and threshold invariants.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("semantic_weight", self.semantic_weight),
            ("code_weight", self.code_weight),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(FlowgradeError::config_field(
                    format!("weight must lie strictly between 0 and 1, got {value}"),
                    name,
                ));
            }
        }
        if (self.semantic_weight + self.code_weight - 1.0).abs() > 1e-9 {
            return Err(FlowgradeError::config_field(
                format!(
                    "weights must sum to 1.0, got {}",
                    self.semantic_weight + self.code_weight
                ),
                "semantic_weight",
            ));
        }
        if !self.threshold.is_finite() {
            return Err(FlowgradeError::config_field(
                "threshold must be finite",
                "threshold",
            ));
        }
        Ok(())
    }

    /// Combined score for a distance pair: the negated weighted sum, so
    /// smaller distances produce higher scores.
    pub fn combined_score(&self, query: &DistanceQuery) -> f64 {
        -(self.semantic_weight * query.semantic_distance + self.code_weight * query.code_distance)
    }
}

/// Relabel a single false positive when its combined score falls below the
/// threshold.
///
/// Pure function of its inputs: every non-FP outcome passes through
/// unchanged, an FP either keeps its label or becomes a filtered FP
/// carrying the score and threshold that pruned it.
pub fn classify(
    outcome: MatchOutcome,
    query: &DistanceQuery,
    config: &WeightThresholdConfig,
) -> MatchOutcome {
    match outcome {
        MatchOutcome::FalsePositive { truth, finding } => {
            let score = config.combined_score(query);
            if score < config.threshold {
                debug!(
                    signature = %finding.path_signature,
                    score,
                    threshold = config.threshold,
                    "pruning false positive"
                );
                MatchOutcome::FilteredFalsePositive {
                    truth,
                    finding,
                    filter_score: score,
                    filter_threshold: config.threshold,
                }
            } else {
                MatchOutcome::FalsePositive { truth, finding }
            }
        }
        other => other,
    }
}

/// Per-category statistics of a classifier pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFilterStats {
    /// False positives seen (filtered included)
    pub total_fp: usize,
    /// False positives relabeled as prunable
    pub filtered: usize,
    /// filtered / total_fp, 0 when there were no false positives
    pub elimination_rate: f64,
}

/// Aggregated statistics of a classifier pass across categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Per-category breakdown in category input order
    pub per_category: IndexMap<String, CategoryFilterStats>,
    /// False positives seen across all categories
    pub total_fp: usize,
    /// False positives relabeled across all categories
    pub total_filtered: usize,
    /// total_filtered / total_fp, 0 when there were no false positives
    pub elimination_rate: f64,
}

impl FilterStats {
    /// Summarize how many false positives each category's pass eliminated.
    pub fn from_outcomes(outcomes_by_category: &IndexMap<String, Vec<MatchOutcome>>) -> Self {
        let mut per_category = IndexMap::with_capacity(outcomes_by_category.len());
        let mut total_fp = 0;
        let mut total_filtered = 0;

        for (category, outcomes) in outcomes_by_category {
            let mut fp = 0;
            let mut filtered = 0;
            for outcome in outcomes {
                match outcome {
                    MatchOutcome::FalsePositive { .. } => fp += 1,
                    MatchOutcome::FilteredFalsePositive { .. } => {
                        fp += 1;
                        filtered += 1;
                    }
                    _ => {}
                }
            }
            total_fp += fp;
            total_filtered += filtered;
            per_category.insert(
                category.clone(),
                CategoryFilterStats {
                    total_fp: fp,
                    filtered,
                    elimination_rate: rate(filtered, fp),
                },
            );
        }

        Self {
            per_category,
            total_fp,
            total_filtered,
            elimination_rate: rate(total_filtered, total_fp),
        }
    }
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// One labeled training sample for the grid search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// Ground-truth label: true for TP, false for FP
    pub is_true_positive: bool,
    /// Semantic distance to the nearest known-safe archetype
    pub semantic_distance: f64,
    /// Code distance to the nearest known-safe archetype
    pub code_distance: f64,
}

/// Result of evaluating one weight pair over the labeled set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPointResult {
    /// Normalized semantic weight
    pub semantic_weight: f64,
    /// Normalized code weight
    pub code_weight: f64,
    /// Threshold maximizing F1 for this pair
    pub best_threshold: f64,
    /// F1 at the best threshold
    pub best_f1: f64,
    /// Precision at the best threshold
    pub best_precision: f64,
    /// Recall at the best threshold
    pub best_recall: f64,
    /// Area under the precision-recall curve
    pub average_precision: f64,
}

/// Grid-search outcome: the winning configuration plus the full grid for
/// later inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    /// Winning weight pair and threshold
    pub best: GridPointResult,
    /// Every evaluated grid point, in generation order
    pub grid: Vec<GridPointResult>,
}

impl OptimizationOutcome {
    /// Winning configuration in the form the classifier consumes.
    pub fn best_config(&self) -> WeightThresholdConfig {
        WeightThresholdConfig {
            semantic_weight: self.best.semantic_weight,
            code_weight: self.best.code_weight,
            threshold: self.best.best_threshold,
        }
    }
}

/// Fixed-threshold evaluation of one configuration over a labeled set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEvaluation {
    /// Confusion counts and rates at the fixed threshold
    pub metrics: crate::core::metrics::ConfusionMetrics,
    /// Samples the configuration got wrong
    pub misclassified: Vec<MisclassifiedSample>,
}

/// One labeled sample the classifier misjudged at a fixed threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisclassifiedSample {
    /// Position in the labeled input
    pub index: usize,
    /// Ground-truth label
    pub true_label: String,
    /// Predicted label
    pub predicted: String,
    /// Combined score at the evaluated weights
    pub score: f64,
    /// Semantic distance of the sample
    pub semantic_distance: f64,
    /// Code distance of the sample
    pub code_distance: f64,
}

/// Grid search over weight pairs and thresholds, maximizing F1 on a labeled
/// TP/FP set.
///
/// The raw grid is 9x9 over both weight axes (step 0.1), each pair
/// re-normalized to sum to 1; duplicate normalized ratios are evaluated
/// repeatedly, which is wasted but harmless work kept for parity with the
/// observable reference output. Pairs whose labeled set lacks positives or
/// negatives score F1 = 0 and simply lose the search.
pub fn grid_search(samples: &[LabeledSample]) -> Result<OptimizationOutcome> {
    if samples.is_empty() {
        return Err(FlowgradeError::validation(
            "grid search needs at least one labeled sample",
        ));
    }

    let raw_weights: Vec<f64> = (1..=9).map(|step| step as f64 / 10.0).collect();
    let mut pairs = Vec::with_capacity(raw_weights.len() * raw_weights.len());
    for &sw in &raw_weights {
        for &cw in &raw_weights {
            let total = sw + cw;
            pairs.push((sw / total, cw / total));
        }
    }

    let grid: Vec<GridPointResult> = pairs
        .par_iter()
        .map(|&(semantic_weight, code_weight)| {
            evaluate_pair(samples, semantic_weight, code_weight)
        })
        .collect();

    // Deterministic selection regardless of evaluation order: highest F1,
    // ties broken by lower semantic weight, then lower threshold.
    let best = grid
        .iter()
        .cloned()
        .reduce(|best, candidate| if beats(&candidate, &best) { candidate } else { best })
        .ok_or_else(|| FlowgradeError::internal("empty weight grid"))?;

    info!(
        semantic_weight = best.semantic_weight,
        code_weight = best.code_weight,
        threshold = best.best_threshold,
        f1 = best.best_f1,
        "grid search complete"
    );

    Ok(OptimizationOutcome { best, grid })
}

fn beats(candidate: &GridPointResult, best: &GridPointResult) -> bool {
    if candidate.best_f1 != best.best_f1 {
        return candidate.best_f1 > best.best_f1;
    }
    if candidate.semantic_weight != best.semantic_weight {
        return candidate.semantic_weight < best.semantic_weight;
    }
    candidate.best_threshold < best.best_threshold
}

/// Evaluate one normalized weight pair: sweep every distinct combined score
/// as a candidate threshold and keep the F1-maximizing one.
fn evaluate_pair(samples: &[LabeledSample], semantic_weight: f64, code_weight: f64) -> GridPointResult {
    let scores: Vec<f64> = samples
        .iter()
        .map(|sample| {
            -(semantic_weight * sample.semantic_distance + code_weight * sample.code_distance)
        })
        .collect();
    let labels: Vec<bool> = samples.iter().map(|sample| sample.is_true_positive).collect();

    let positives = labels.iter().filter(|&&label| label).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        debug!(
            semantic_weight,
            code_weight, "degenerate labeled set for weight pair"
        );
        return GridPointResult {
            semantic_weight,
            code_weight,
            best_threshold: 0.0,
            best_f1: 0.0,
            best_precision: 0.0,
            best_recall: 0.0,
            average_precision: 0.0,
        };
    }

    let mut thresholds = scores.clone();
    thresholds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    thresholds.dedup();

    let mut best_threshold = thresholds[0];
    let mut best = (0.0_f64, 0.0_f64, 0.0_f64); // (f1, precision, recall)

    for &threshold in &thresholds {
        let (precision, recall, f1) = confusion_at(&labels, &scores, threshold);
        // First occurrence wins ties on the ascending scan.
        if f1 > best.0 {
            best = (f1, precision, recall);
            best_threshold = threshold;
        }
    }

    GridPointResult {
        semantic_weight,
        code_weight,
        best_threshold,
        best_f1: best.0,
        best_precision: best.1,
        best_recall: best.2,
        average_precision: average_precision(&labels, &scores),
    }
}

fn confusion_at(labels: &[bool], scores: &[f64], threshold: f64) -> (f64, f64, f64) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_count = 0usize;

    for (&label, &score) in labels.iter().zip(scores) {
        let predicted_positive = score >= threshold;
        match (label, predicted_positive) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_count += 1,
            (false, false) => {}
        }
    }

    let precision = rate(tp, tp + fp);
    let recall = rate(tp, tp + fn_count);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Step-wise area under the precision-recall curve, walking samples by
/// descending score.
fn average_precision(labels: &[bool], scores: &[f64]) -> f64 {
    let total_positives = labels.iter().filter(|&&label| label).count();
    if total_positives == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut area = 0.0;
    let mut previous_recall = 0.0;

    for index in order {
        seen += 1;
        if labels[index] {
            tp += 1;
            let precision = tp as f64 / seen as f64;
            let recall = tp as f64 / total_positives as f64;
            area += (recall - previous_recall) * precision;
            previous_recall = recall;
        }
    }

    area
}

/// Evaluate a fixed configuration against a labeled set, reporting the
/// confusion counts and every misclassified sample.
pub fn evaluate_at(
    samples: &[LabeledSample],
    config: &WeightThresholdConfig,
) -> Result<ThresholdEvaluation> {
    config.validate()?;

    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_count = 0;
    let mut misclassified = Vec::new();

    for (index, sample) in samples.iter().enumerate() {
        let score = config.combined_score(&DistanceQuery {
            semantic_distance: sample.semantic_distance,
            code_distance: sample.code_distance,
        });
        let predicted_positive = score >= config.threshold;

        match (sample.is_true_positive, predicted_positive) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (true, false) => {
                fn_count += 1;
                misclassified.push(MisclassifiedSample {
                    index,
                    true_label: "TP".to_string(),
                    predicted: "FP".to_string(),
                    score,
                    semantic_distance: sample.semantic_distance,
                    code_distance: sample.code_distance,
                });
            }
            (false, true) => {
                fp += 1;
                misclassified.push(MisclassifiedSample {
                    index,
                    true_label: "FP".to_string(),
                    predicted: "TP".to_string(),
                    score,
                    semantic_distance: sample.semantic_distance,
                    code_distance: sample.code_distance,
                });
            }
        }
    }

    Ok(ThresholdEvaluation {
        metrics: crate::core::metrics::ConfusionMetrics::from_counts(tp, fp, tn, fn_count),
        misclassified,
    })
}
