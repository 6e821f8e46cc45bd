//! Ground-truth records for the labeled benchmark.
//!
//! Each truth item describes one file/class/method/line-range in the
//! benchmark and whether that location is a real vulnerability. Truth tables
//! are loaded once per run and read-only afterward.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::errors::{FlowgradeError, Result};

/// Truth items grouped by vulnerability category, preserving input order.
pub type TruthTable = IndexMap<String, Vec<TruthItem>>;

/// One hand-labeled ground-truth row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthItem {
    /// Vulnerability category identifier
    pub category: String,
    /// File the location belongs to
    pub file_path: String,
    /// Class name (simple or qualified)
    pub class_name: String,
    /// Method name; empty means any method in range
    pub method_name: String,
    /// First line of the labeled range (inclusive)
    pub start_line: i64,
    /// Last line of the labeled range (inclusive)
    pub end_line: i64,
    /// Whether this location is a real vulnerability
    pub is_vulnerability: bool,
    /// Human-written description, carried through unchanged
    #[serde(default)]
    pub description: String,
    /// Human-written remediation advice, carried through unchanged
    #[serde(default)]
    pub remediation: String,
}

impl TruthItem {
    /// Check the row's line-range invariant.
    pub fn validate(&self) -> Result<()> {
        if self.start_line > self.end_line {
            return Err(FlowgradeError::validation_field(
                format!(
                    "start_line {} exceeds end_line {} for {}.{}",
                    self.start_line, self.end_line, self.class_name, self.method_name
                ),
                "start_line",
            ));
        }
        Ok(())
    }
}
