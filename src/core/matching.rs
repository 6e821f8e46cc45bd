//! Ground-truth matching of deduplicated findings.
//!
//! Matching is deliberately greedy and order-dependent: for each truth item
//! (in input order) the first finding whose call chain contains a matching
//! point wins, the sink point tested before the rest of the path. A finding
//! may satisfy multiple truth items; its index is recorded only so that
//! findings never matched by any truth item can be emitted as unmatched
//! false positives afterward.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::findings::Finding;
use crate::core::findings::ProgramPoint;
use crate::core::truth::TruthItem;

/// Kind tag for a match outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Truth item is a vulnerability and a finding matched it
    Tp,
    /// Truth item is safe but a finding matched it
    Fp,
    /// Truth item is a vulnerability and no finding matched it
    Fn,
    /// Truth item is safe and no finding matched it
    Tn,
    /// Finding with no corresponding truth item at all
    FpUnmatched,
    /// False positive additionally flagged as safely prunable
    FpFiltered,
}

impl OutcomeKind {
    /// Report label for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Tp => "TP",
            OutcomeKind::Fp => "FP",
            OutcomeKind::Fn => "FN",
            OutcomeKind::Tn => "TN",
            OutcomeKind::FpUnmatched => "FP_UNMATCHED",
            OutcomeKind::FpFiltered => "FP_FILTERED",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of matching one truth item (or one leftover finding) for a
/// category.
///
/// Every outcome references exactly one truth item, except `FpUnmatched`
/// which references exactly one finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Real vulnerability correctly reported
    TruePositive {
        /// The matched truth row
        truth: TruthItem,
        /// The finding that matched it
        finding: Finding,
    },
    /// Safe location incorrectly reported
    FalsePositive {
        /// The matched truth row
        truth: TruthItem,
        /// The finding that matched it
        finding: Finding,
    },
    /// Real vulnerability the tool missed
    FalseNegative {
        /// The unmatched truth row
        truth: TruthItem,
    },
    /// Safe location correctly not reported
    TrueNegative {
        /// The unmatched truth row
        truth: TruthItem,
    },
    /// Finding absent from the truth table; counted as a false positive
    UnmatchedFalsePositive {
        /// The leftover finding
        finding: Finding,
    },
    /// False positive pruned by the similarity classifier
    FilteredFalsePositive {
        /// The matched truth row
        truth: TruthItem,
        /// The finding that matched it
        finding: Finding,
        /// Combined similarity score that triggered the relabeling
        filter_score: f64,
        /// Threshold in force when the record was relabeled
        filter_threshold: f64,
    },
}

impl MatchOutcome {
    /// Kind tag of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            MatchOutcome::TruePositive { .. } => OutcomeKind::Tp,
            MatchOutcome::FalsePositive { .. } => OutcomeKind::Fp,
            MatchOutcome::FalseNegative { .. } => OutcomeKind::Fn,
            MatchOutcome::TrueNegative { .. } => OutcomeKind::Tn,
            MatchOutcome::UnmatchedFalsePositive { .. } => OutcomeKind::FpUnmatched,
            MatchOutcome::FilteredFalsePositive { .. } => OutcomeKind::FpFiltered,
        }
    }

    /// Truth row this outcome resolved from, if any.
    pub fn truth(&self) -> Option<&TruthItem> {
        match self {
            MatchOutcome::TruePositive { truth, .. }
            | MatchOutcome::FalsePositive { truth, .. }
            | MatchOutcome::FalseNegative { truth }
            | MatchOutcome::TrueNegative { truth }
            | MatchOutcome::FilteredFalsePositive { truth, .. } => Some(truth),
            MatchOutcome::UnmatchedFalsePositive { .. } => None,
        }
    }

    /// Finding this outcome resolved from, if any.
    pub fn finding(&self) -> Option<&Finding> {
        match self {
            MatchOutcome::TruePositive { finding, .. }
            | MatchOutcome::FalsePositive { finding, .. }
            | MatchOutcome::UnmatchedFalsePositive { finding }
            | MatchOutcome::FilteredFalsePositive { finding, .. } => Some(finding),
            MatchOutcome::FalseNegative { .. } | MatchOutcome::TrueNegative { .. } => None,
        }
    }
}

/// Normalize a file path for comparison: unify separators, trim, and coerce
/// to a leading-slash absolute form. Empty input stays empty.
pub fn normalize_path(path: &str) -> String {
    let normalized = path.replace('\\', "/").trim().to_string();
    if normalized.is_empty() {
        return normalized;
    }
    if normalized.starts_with('/') {
        normalized
    } else {
        format!("/{normalized}")
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether two file paths refer to the same file: equal after normalization,
/// equal base filenames, or one a suffix of the other.
pub fn paths_match(left: &str, right: &str) -> bool {
    let left = normalize_path(left);
    let right = normalize_path(right);

    if left == right {
        return true;
    }
    if basename(&left) == basename(&right) {
        return true;
    }
    left.ends_with(&right) || right.ends_with(&left)
}

/// Whether a single program point is the location a truth item describes.
///
/// Four checks are AND-ed; an empty field on either side skips its check,
/// an explicit mismatch rejects the point.
pub fn point_matches(point: &ProgramPoint, truth: &TruthItem) -> bool {
    if !paths_match(&point.file_path, &truth.file_path) {
        return false;
    }

    // Suffix matching covers simple-name vs. qualified-name mismatches.
    if !point.class_name.is_empty()
        && !truth.class_name.is_empty()
        && !point.class_name.ends_with(&truth.class_name)
        && !truth.class_name.ends_with(&point.class_name)
    {
        return false;
    }

    if !point.method_name.is_empty()
        && !truth.method_name.is_empty()
        && point.method_name != truth.method_name
    {
        return false;
    }

    if point.line > 0 && (point.line < truth.start_line || point.line > truth.end_line) {
        return false;
    }

    true
}

/// Whether a truth item matches anywhere along a finding's call chain.
///
/// The sink point is tested first; only when it fails is every point of the
/// path tested in order.
pub fn finding_matches(finding: &Finding, truth: &TruthItem) -> bool {
    if let Some(sink) = finding.sink() {
        if point_matches(sink, truth) {
            return true;
        }
    }

    finding.path.iter().any(|point| point_matches(point, truth))
}

/// Match every truth item of one category against its deduplicated findings.
///
/// Findings with an empty propagation path are warned about once and take
/// no part in matching. Findings never selected as a match for any truth
/// item are appended as `UnmatchedFalsePositive` outcomes. The
/// matched-index accumulator is local to the call; repeated invocations
/// share no state.
pub fn match_category(truth_items: &[TruthItem], findings: &[Finding]) -> Vec<MatchOutcome> {
    let mut outcomes = Vec::with_capacity(truth_items.len());
    let mut matched = vec![false; findings.len()];
    let mut usable = vec![true; findings.len()];

    for (index, finding) in findings.iter().enumerate() {
        if finding.path.is_empty() {
            warn!(
                category = %finding.category,
                rule = %finding.rule_id,
                "skipping finding with empty propagation path"
            );
            usable[index] = false;
        }
    }

    for truth in truth_items {
        let mut matching_finding = None;

        for (index, finding) in findings.iter().enumerate() {
            if !usable[index] {
                continue;
            }

            if finding_matches(finding, truth) {
                matched[index] = true;
                matching_finding = Some(finding.clone());
                break;
            }
        }

        let outcome = match (matching_finding, truth.is_vulnerability) {
            (Some(finding), true) => MatchOutcome::TruePositive {
                truth: truth.clone(),
                finding,
            },
            (Some(finding), false) => MatchOutcome::FalsePositive {
                truth: truth.clone(),
                finding,
            },
            (None, true) => MatchOutcome::FalseNegative {
                truth: truth.clone(),
            },
            (None, false) => MatchOutcome::TrueNegative {
                truth: truth.clone(),
            },
        };
        outcomes.push(outcome);
    }

    for (index, finding) in findings.iter().enumerate() {
        if usable[index] && !matched[index] {
            outcomes.push(MatchOutcome::UnmatchedFalsePositive {
                finding: finding.clone(),
            });
        }
    }

    outcomes
}
