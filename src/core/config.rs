//! Configuration types for the triage pipeline.
//!
//! Configurations are plain serde structs with defaults matching the
//! benchmark setup (path traversal, command injection, and SQL injection
//! categories), loadable from YAML and validated before an engine is built.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{FlowgradeError, Result};
use crate::core::refine::WeightThresholdConfig;

/// Top-level configuration for a triage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowgradeConfig {
    /// Matching and evaluation settings
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Similarity refinement settings; absent when only the baseline
    /// evaluation is wanted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine: Option<RefineConfig>,
}

impl Default for FlowgradeConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationConfig::default(),
            refine: None,
        }
    }
}

impl FlowgradeConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            FlowgradeError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(Into::into)
    }

    /// Serialize configuration to a YAML string
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.evaluation.validate()?;
        if let Some(refine) = &self.refine {
            refine.validate()?;
        }
        Ok(())
    }
}

/// Settings for the dedup / match / metrics stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Vulnerability categories to evaluate, in report order
    pub categories: Vec<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            // Path traversal, command injection, SQL injection.
            categories: vec!["22".to_string(), "78".to_string(), "89".to_string()],
        }
    }
}

impl EvaluationConfig {
    /// Validate evaluation settings
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(FlowgradeError::config_field(
                "at least one category must be configured",
                "evaluation.categories",
            ));
        }
        if self.categories.iter().any(|category| category.is_empty()) {
            return Err(FlowgradeError::config_field(
                "category identifiers must be non-empty",
                "evaluation.categories",
            ));
        }
        Ok(())
    }
}

/// Settings for the similarity classifier pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Tuned weight pair and threshold, normally produced by the optimizer
    pub weights: WeightThresholdConfig,
}

impl RefineConfig {
    /// Validate refinement settings
    pub fn validate(&self) -> Result<()> {
        self.weights.validate().map_err(|e| {
            FlowgradeError::config_field(format!("invalid refine weights: {e}"), "refine.weights")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = FlowgradeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluation.categories, vec!["22", "78", "89"]);
    }

    #[test]
    fn empty_category_list_is_rejected() {
        let config = FlowgradeConfig {
            evaluation: EvaluationConfig { categories: vec![] },
            refine: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn refine_weights_are_validated() {
        let config = FlowgradeConfig {
            evaluation: EvaluationConfig::default(),
            refine: Some(RefineConfig {
                weights: WeightThresholdConfig {
                    semantic_weight: 0.6,
                    code_weight: 0.6,
                    threshold: -0.1,
                },
            }),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = FlowgradeConfig {
            evaluation: EvaluationConfig {
                categories: vec!["78".to_string()],
            },
            refine: Some(RefineConfig {
                weights: WeightThresholdConfig {
                    semantic_weight: 0.6,
                    code_weight: 0.4,
                    threshold: -0.1,
                },
            }),
        };

        let yaml = config.to_yaml_string().unwrap();
        let parsed = FlowgradeConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.evaluation.categories, vec!["78"]);
        assert!(parsed.refine.is_some());
    }

    #[test]
    fn yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowgrade.yml");
        std::fs::write(&path, "evaluation:\n  categories: [\"22\", \"89\"]\n").unwrap();

        let config = FlowgradeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.evaluation.categories, vec!["22", "89"]);
        assert!(config.refine.is_none());
    }
}
