//! # Flowgrade: Taint-Analysis Finding Triage
//!
//! Post-processing for static taint-analysis output run against a benchmark
//! of labeled Java methods. The library decides which reported findings are
//! true vulnerabilities and which are false positives, scored against a
//! hand-labeled ground truth:
//!
//! - **Deduplication**: repeated findings sharing a source/sink path
//!   signature collapse to their first occurrence
//! - **Ground-truth matching**: greedy, order-stable matching of truth
//!   items against each finding's full call chain
//! - **Confusion metrics**: per-category and overall precision, recall,
//!   F1, and accuracy
//! - **Similarity refinement**: false positives reclassified by a weighted
//!   combination of externally supplied semantic and code distances
//! - **Weight tuning**: grid search over weight pairs and thresholds,
//!   maximizing F1 on a labeled set
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgrade::{EvaluationEngine, FlowgradeConfig};
//! use flowgrade::io::inputs;
//!
//! fn main() -> flowgrade::Result<()> {
//!     let config = FlowgradeConfig::default();
//!     let categories = config.evaluation.categories.clone();
//!     let engine = EvaluationEngine::new(config)?;
//!
//!     let findings = inputs::findings_from_file("test_result.json", &categories)?;
//!     let truth = inputs::truth_from_file("truth_tables.json")?;
//!
//!     let results = engine.evaluate(findings, truth);
//!     results.to_report().write_json("evaluation_report.json")?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

// Core triage algorithms and data structures
pub mod core {
    //! Core triage algorithms and data structures.

    pub mod config;
    pub mod errors;
    pub mod findings;
    pub mod matching;
    pub mod metrics;
    pub mod refine;
    pub mod truth;
}

// I/O boundary and reporting
pub mod io {
    //! Typed input boundary and report serialization.

    pub mod inputs;
    pub mod reports;
}

// Public API and engine interface
pub mod api {
    //! High-level API and engine interface.

    pub mod engine;
    pub mod results;
}

// Re-export primary types for convenience
pub use crate::api::engine::{labeled_samples, EvaluationEngine};
pub use crate::api::results::EvaluationResults;
pub use crate::core::config::FlowgradeConfig;
pub use crate::core::errors::{FlowgradeError, Result};
pub use crate::core::matching::{MatchOutcome, OutcomeKind};
pub use crate::core::metrics::ConfusionMetrics;
pub use crate::core::refine::{
    DistanceQuery, LabeledSample, OptimizationOutcome, WeightThresholdConfig,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
