//! Error types for the flowgrade library.
//!
//! Structured error variants for every stage of the triage pipeline, with
//! constructor helpers so call sites stay terse and context is preserved
//! through `?` propagation.

use std::io;

use thiserror::Error;

/// Main result type for flowgrade operations.
pub type Result<T> = std::result::Result<T, FlowgradeError>;

/// Comprehensive error type for all flowgrade operations.
#[derive(Error, Debug)]
pub enum FlowgradeError {
    /// I/O related errors (reading finding dumps, truth tables, configs)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Structurally unreadable input sources
    #[error("Parse error: {message}")]
    Parse {
        /// Error description
        message: String,
        /// Input source being parsed (file path or logical name)
        source_name: Option<String>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl FlowgradeError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source_name: None,
        }
    }

    /// Create a new parse error naming the input source
    pub fn parse_in(message: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source_name: Some(source_name.into()),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<io::Error> for FlowgradeError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for FlowgradeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for FlowgradeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_helpers_populate_context() {
        let err = FlowgradeError::config_field("weights must sum to 1.0", "refine.weights");
        match err {
            FlowgradeError::Config { field, .. } => {
                assert_eq!(field.as_deref(), Some("refine.weights"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        let err = FlowgradeError::parse_in("unexpected token", "findings.json");
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn io_errors_convert() {
        let err: FlowgradeError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, FlowgradeError::Io { .. }));
    }

    #[test]
    fn json_errors_convert() {
        let parse_failure = serde_json::from_str::<serde_json::Value>("{");
        let err: FlowgradeError = parse_failure.unwrap_err().into();
        assert!(matches!(err, FlowgradeError::Serialization { .. }));
    }
}
