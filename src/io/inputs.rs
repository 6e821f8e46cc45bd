//! Typed input boundary for external collaborator data.
//!
//! Three sources feed the pipeline: the taint tool's rule-result dump, the
//! hand-labeled truth table, and the similarity-query distances. Each is
//! validated once here so the core operates on typed, invariant-checked
//! records. Malformed individual entries are skipped with a warning; only a
//! structurally unreadable source is a hard error.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::errors::{FlowgradeError, Result};
use crate::core::findings::{Finding, ProgramPoint};
use crate::core::refine::DistanceQuery;
use crate::core::truth::{TruthItem, TruthTable};

/// Findings grouped by vulnerability category, preserving input order.
pub type FindingsByCategory = IndexMap<String, Vec<Finding>>;

#[derive(Debug, Deserialize)]
struct RawRuleRecord {
    #[serde(default, rename = "ruleId")]
    rule_id: String,
    #[serde(default, rename = "ruleCwe")]
    rule_cwe: String,
    #[serde(default)]
    result: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    path: Vec<RawPoint>,
    #[serde(default, rename = "sourceSig")]
    source_sig: String,
    #[serde(default, rename = "sinkSig")]
    sink_sig: String,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    #[serde(default)]
    function: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: i64,
    #[serde(default, rename = "javaClass")]
    java_class: String,
}

/// Parse a taint-tool result dump, keeping only the configured categories.
///
/// The dump is an array of rule records, each carrying a CWE id and a list
/// of results with source-to-sink paths. Results with too-short paths are
/// skipped with a warning.
pub fn findings_from_json(json: &str, categories: &[String]) -> Result<FindingsByCategory> {
    let records: Vec<RawRuleRecord> = serde_json::from_str(json)
        .map_err(|e| FlowgradeError::parse(format!("unreadable findings source: {e}")))?;

    let mut findings: FindingsByCategory = categories
        .iter()
        .map(|category| (category.clone(), Vec::new()))
        .collect();

    for record in records {
        let Some(bucket) = findings.get_mut(&record.rule_cwe) else {
            continue;
        };

        for result in record.result {
            let path: Vec<ProgramPoint> = result
                .path
                .into_iter()
                .map(|point| {
                    ProgramPoint::new(point.file, point.java_class, point.function, point.line)
                })
                .collect();

            match Finding::new(
                record.rule_cwe.clone(),
                record.rule_id.clone(),
                path,
                result.source_sig,
                result.sink_sig,
            ) {
                Ok(finding) => bucket.push(finding),
                Err(error) => {
                    warn!(
                        category = %record.rule_cwe,
                        rule = %record.rule_id,
                        %error,
                        "skipping malformed finding"
                    );
                }
            }
        }
    }

    for (category, bucket) in &findings {
        info!(category = %category, count = bucket.len(), "loaded findings");
    }

    Ok(findings)
}

/// Read and parse a taint-tool result dump from a file.
pub fn findings_from_file(path: impl AsRef<Path>, categories: &[String]) -> Result<FindingsByCategory> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        FlowgradeError::io(format!("Failed to read findings file: {}", path.display()), e)
    })?;
    findings_from_json(&content, categories)
}

/// Parse a truth table: a JSON map from category to rows with
/// `file_path, class_name, method_name, start_line, end_line,
/// is_vulnerability, description, remediation` columns.
///
/// Rows with non-numeric lines, inverted ranges, or unreadable
/// vulnerability flags are skipped with a warning.
pub fn truth_from_json(json: &str) -> Result<TruthTable> {
    let raw: IndexMap<String, Vec<Value>> = serde_json::from_str(json)
        .map_err(|e| FlowgradeError::parse(format!("unreadable truth table: {e}")))?;

    let mut table = TruthTable::new();

    for (category, rows) in raw {
        let mut items = Vec::with_capacity(rows.len());

        for row in rows {
            match truth_row(&category, &row) {
                Some(item) => items.push(item),
                None => {
                    warn!(category = %category, "skipping malformed truth row");
                }
            }
        }

        info!(category = %category, count = items.len(), "loaded truth items");
        table.insert(category, items);
    }

    Ok(table)
}

/// Read and parse a truth table from a file.
pub fn truth_from_file(path: impl AsRef<Path>) -> Result<TruthTable> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        FlowgradeError::io(format!("Failed to read truth table: {}", path.display()), e)
    })?;
    truth_from_json(&content)
}

fn truth_row(category: &str, row: &Value) -> Option<TruthItem> {
    let start_line = line_field(row.get("start_line")?)?;
    let end_line = line_field(row.get("end_line")?)?;
    let is_vulnerability = bool_field(row.get("is_vulnerability")?)?;

    let item = TruthItem {
        category: category.to_string(),
        file_path: str_field(row, "file_path"),
        class_name: str_field(row, "class_name"),
        method_name: str_field(row, "method_name"),
        start_line,
        end_line,
        is_vulnerability,
        description: str_field(row, "description"),
        remediation: str_field(row, "remediation"),
    };

    item.validate().ok()?;
    Some(item)
}

fn str_field(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Accept both numeric and stringly-typed line numbers (the truth table
/// originates from a spreadsheet export).
fn line_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn bool_field(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RawQuery {
    semantic: RawDistance,
    code: RawDistance,
}

#[derive(Debug, Deserialize)]
struct RawDistance {
    distance: f64,
}

/// Parse similarity-query results: one record per reviewed finding with
/// `semantic.distance` and `code.distance` fields.
///
/// Queries are positional (the n-th record belongs to the n-th reviewed
/// finding), so an invalid distance is a hard error rather than a skip;
/// silently dropping one would misalign every record after it.
pub fn queries_from_json(json: &str) -> Result<Vec<DistanceQuery>> {
    let raw: Vec<RawQuery> = serde_json::from_str(json)
        .map_err(|e| FlowgradeError::parse(format!("unreadable similarity queries: {e}")))?;

    let queries: Vec<DistanceQuery> = raw
        .into_iter()
        .map(|record| DistanceQuery {
            semantic_distance: record.semantic.distance,
            code_distance: record.code.distance,
        })
        .collect();

    for query in &queries {
        query.validate()?;
    }

    Ok(queries)
}

/// Read and parse similarity-query results from a file.
pub fn queries_from_file(path: impl AsRef<Path>) -> Result<Vec<DistanceQuery>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        FlowgradeError::io(
            format!("Failed to read similarity queries: {}", path.display()),
            e,
        )
    })?;
    queries_from_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINDINGS_JSON: &str = r#"[
        {
            "ruleId": "cmd-injection",
            "ruleCwe": "78",
            "result": [
                {
                    "path": [
                        {"function": "<p.Ctrl: void call(int)>", "file": "a/B.java", "line": 10, "javaClass": "p.Ctrl"},
                        {"function": "<p.Svc: void exec(int)>", "file": "a/B.java", "line": 42, "javaClass": "p.Svc"}
                    ],
                    "sourceSig": "src",
                    "sinkSig": "sink"
                },
                {
                    "path": [
                        {"function": "<p.Svc: void exec(int)>", "file": "a/B.java", "line": 42, "javaClass": "p.Svc"}
                    ],
                    "sourceSig": "src",
                    "sinkSig": "sink"
                }
            ]
        },
        {
            "ruleId": "other",
            "ruleCwe": "999",
            "result": []
        }
    ]"#;

    #[test]
    fn loads_findings_for_configured_categories() {
        let categories = vec!["22".to_string(), "78".to_string()];
        let findings = findings_from_json(FINDINGS_JSON, &categories).unwrap();

        // Unconfigured category 999 is dropped; 22 exists but is empty.
        assert_eq!(findings.len(), 2);
        assert!(findings["22"].is_empty());

        // The one-point path was skipped as malformed.
        assert_eq!(findings["78"].len(), 1);
        assert_eq!(findings["78"][0].path_signature, "Ctrl:call -> Svc:exec");
        assert_eq!(findings["78"][0].rule_id, "cmd-injection");
    }

    #[test]
    fn unreadable_findings_are_a_hard_error() {
        let result = findings_from_json("{not json", &["78".to_string()]);
        assert!(matches!(result, Err(FlowgradeError::Parse { .. })));
    }

    #[test]
    fn loads_truth_rows_with_lenient_field_types() {
        let json = r#"{
            "78": [
                {
                    "file_path": "a/B.java",
                    "class_name": "Svc",
                    "method_name": "exec",
                    "start_line": "40",
                    "end_line": 45,
                    "is_vulnerability": "true",
                    "description": "shell exec of user input",
                    "remediation": "use an allow-list"
                },
                {
                    "file_path": "a/B.java",
                    "class_name": "Svc",
                    "method_name": "bad",
                    "start_line": 50,
                    "end_line": 40,
                    "is_vulnerability": true
                },
                {
                    "file_path": "a/B.java",
                    "class_name": "Svc",
                    "method_name": "worse",
                    "start_line": "abc",
                    "end_line": 40,
                    "is_vulnerability": true
                }
            ]
        }"#;

        let table = truth_from_json(json).unwrap();
        // Inverted range and non-numeric line are both skipped.
        assert_eq!(table["78"].len(), 1);
        let item = &table["78"][0];
        assert_eq!(item.start_line, 40);
        assert_eq!(item.end_line, 45);
        assert!(item.is_vulnerability);
        assert_eq!(item.description, "shell exec of user input");
    }

    #[test]
    fn loads_distance_queries() {
        let json = r#"[
            {"semantic": {"distance": 0.2}, "code": {"distance": 0.1}},
            {"semantic": {"distance": 1.5}, "code": {"distance": 2.5}}
        ]"#;
        let queries = queries_from_json(json).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].semantic_distance, 0.2);

        let negative = r#"[{"semantic": {"distance": -1.0}, "code": {"distance": 0.1}}]"#;
        assert!(queries_from_json(negative).is_err());
    }

    #[test]
    fn file_loaders_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.json");
        std::fs::write(&path, FINDINGS_JSON).unwrap();

        let findings = findings_from_file(&path, &["78".to_string()]).unwrap();
        assert_eq!(findings["78"].len(), 1);

        let missing = findings_from_file(dir.path().join("nope.json"), &["78".to_string()]);
        assert!(matches!(missing, Err(FlowgradeError::Io { .. })));
    }
}
