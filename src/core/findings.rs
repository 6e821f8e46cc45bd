//! Finding records and path-signature derivation.
//!
//! A finding is one reported taint result: an ordered source-to-sink
//! propagation path of program points. Each finding carries a canonical
//! path signature (`"SrcClass:srcMethod -> SinkClass:sinkMethod"`) used to
//! collapse repeated reports of the same flow within a category.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::{FlowgradeError, Result};

/// One step along a finding's propagation path.
///
/// `class_name` and `method_name` are derived once at construction: from the
/// tool's function signature when it is well-formed, otherwise from the raw
/// class field's simple name with an empty method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramPoint {
    /// Source file the point belongs to
    pub file_path: String,
    /// Simple class name
    pub class_name: String,
    /// Raw function signature as emitted by the analysis tool
    pub function_signature: String,
    /// Method name (empty when it could not be derived)
    pub method_name: String,
    /// 1-based line number; values <= 0 mean unknown
    pub line: i64,
}

impl ProgramPoint {
    /// Build a point from raw tool output fields, deriving the class and
    /// method identity from the function signature where possible.
    pub fn new(
        file_path: impl Into<String>,
        java_class: impl Into<String>,
        function_signature: impl Into<String>,
        line: i64,
    ) -> Self {
        let java_class = java_class.into();
        let function_signature = function_signature.into();

        let (class_name, method_name) = match signature_parts(&function_signature) {
            SignatureParts::Parsed { class, method } => (class, method),
            SignatureParts::Unparsed => (simple_name(&java_class).to_string(), String::new()),
        };

        Self {
            file_path: file_path.into(),
            class_name,
            function_signature,
            method_name,
            line,
        }
    }
}

/// Outcome of parsing a tool function signature.
///
/// The parser is total: malformed input yields `Unparsed` and callers branch
/// explicitly instead of handling errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParts {
    /// Signature was well-formed; simple class name and bare method name
    Parsed {
        /// Simple (unqualified) class name
        class: String,
        /// Method name with the parameter list stripped
        method: String,
    },
    /// Signature could not be interpreted
    Unparsed,
}

/// Parse a Soot-style function signature of the form
/// `<pkg.Class: ReturnType methodName(args)>`.
///
/// The class is the last dot-segment of the text between `<` and `:`; the
/// method is the identifier following the return type with its parameter
/// list stripped.
pub fn signature_parts(signature: &str) -> SignatureParts {
    let Some(open) = signature.find('<') else {
        return SignatureParts::Unparsed;
    };
    let rest = &signature[open + 1..];
    let Some(colon) = rest.find(':') else {
        return SignatureParts::Unparsed;
    };

    let class_path = rest[..colon].trim();
    if class_path.is_empty() {
        return SignatureParts::Unparsed;
    }
    let class = simple_name(class_path).to_string();

    let method_part = rest[colon + 1..].trim();
    let method_token = match method_part.split_once(' ') {
        Some((_, after_return_type)) => after_return_type,
        None => method_part,
    };
    let method = method_token
        .split('(')
        .next()
        .unwrap_or("")
        .trim_end_matches('>')
        .trim()
        .to_string();
    if method.is_empty() {
        return SignatureParts::Unparsed;
    }

    SignatureParts::Parsed { class, method }
}

/// Last dot-segment of a (possibly qualified) class path.
pub fn simple_name(class_path: &str) -> &str {
    class_path.rsplit('.').next().unwrap_or(class_path)
}

/// Canonical identity of a propagation path, derived from its endpoints.
///
/// Never fails; a point whose signature cannot be parsed contributes its raw
/// simple class name and an empty method.
pub fn path_signature(source: &ProgramPoint, sink: &ProgramPoint) -> String {
    format!(
        "{}:{} -> {}:{}",
        source.class_name, source.method_name, sink.class_name, sink.method_name
    )
}

/// One reported taint-analysis result for one vulnerability category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Vulnerability category identifier (e.g. "22", "78", "89")
    pub category: String,
    /// Identifier of the rule that produced the result
    pub rule_id: String,
    /// Source-to-sink propagation path; index 0 is the source, the last
    /// element is the sink
    pub path: Vec<ProgramPoint>,
    /// Raw source signature string from the tool
    pub source_signature: String,
    /// Raw sink signature string from the tool
    pub sink_signature: String,
    /// Canonical path identity used for deduplication
    pub path_signature: String,
}

impl Finding {
    /// Build a finding from a parsed propagation path.
    ///
    /// Paths shorter than two points are rejected: a finding without distinct
    /// source and sink endpoints cannot be matched or deduplicated.
    pub fn new(
        category: impl Into<String>,
        rule_id: impl Into<String>,
        path: Vec<ProgramPoint>,
        source_signature: impl Into<String>,
        sink_signature: impl Into<String>,
    ) -> Result<Self> {
        if path.len() < 2 {
            return Err(FlowgradeError::validation_field(
                format!("propagation path needs at least 2 points, got {}", path.len()),
                "path",
            ));
        }

        let signature = path_signature(&path[0], &path[path.len() - 1]);

        Ok(Self {
            category: category.into(),
            rule_id: rule_id.into(),
            path,
            source_signature: source_signature.into(),
            sink_signature: sink_signature.into(),
            path_signature: signature,
        })
    }

    /// Source point of the propagation path.
    pub fn source(&self) -> Option<&ProgramPoint> {
        self.path.first()
    }

    /// Sink point of the propagation path.
    pub fn sink(&self) -> Option<&ProgramPoint> {
        self.path.last()
    }
}

/// Collapse repeated findings sharing a path signature, keeping the first
/// occurrence of each distinct signature in input order.
///
/// Idempotent: deduplicating an already-deduplicated sequence returns it
/// unchanged. Skipped duplicates are logged, never an error.
pub fn dedup_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = indexmap::IndexSet::new();
    let mut kept = Vec::with_capacity(findings.len());

    for finding in findings {
        if seen.insert(finding.path_signature.clone()) {
            kept.push(finding);
        } else {
            debug!(
                category = %finding.category,
                signature = %finding.path_signature,
                "skipping duplicate finding"
            );
        }
    }

    kept
}
