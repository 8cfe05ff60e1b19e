// Degradation check configuration
//
// The configuration arrives already merged (local overrides global) from the
// configuration loader. This module only parses the resolved document and
// validates it against the method registry.

use crate::check::methods::MethodRegistry;
use crate::check::strategy::{ApplyMode, StrategyRule};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors in the strategy configuration
///
/// Fatal for the check that resolved the offending rule only.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown degradation method '{0}'")]
    UnknownMethod(String),

    #[error("Unknown parameter '{parameter}' for method '{method}'")]
    UnknownParameter { method: String, parameter: String },

    #[error("Invalid parameter '{parameter}' for method '{method}': {reason}")]
    InvalidParameter {
        method: String,
        parameter: String,
        reason: String,
    },

    #[error("Failed to parse degradation configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Resolved configuration of degradation checks
///
/// # Example TOML
/// ```toml
/// [degradation]
/// apply = "first"
///
/// [[degradation.strategies]]
/// type = "time"
/// postprocessor = "regression_analysis"
/// method = "bmoe"
///
/// [[degradation.strategies]]
/// method = "aat"
/// params = { degradation_threshold = 3.0 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub degradation: DegradationConfig,
}

/// The `degradation` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DegradationConfig {
    /// `first` or `all`; defaults to `all`
    #[serde(default)]
    pub apply: ApplyMode,

    /// Ordered strategy rules
    #[serde(default)]
    pub strategies: Vec<StrategyRule>,
}

impl CheckConfig {
    pub fn new(apply: ApplyMode, strategies: Vec<StrategyRule>) -> Self {
        Self {
            degradation: DegradationConfig { apply, strategies },
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read degradation config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid degradation config: {}", path.as_ref().display()))
    }

    /// Embedded default strategies
    ///
    /// Model order comparison for profiles postprocessed by regression
    /// analysis, average amounts for everything.
    pub fn default_strategies() -> Result<Self, ConfigError> {
        const DEFAULT_TOML: &str = include_str!("../../degradation-default.toml");
        Self::from_toml_str(DEFAULT_TOML)
    }

    pub fn apply(&self) -> ApplyMode {
        self.degradation.apply
    }

    pub fn strategies(&self) -> &[StrategyRule] {
        &self.degradation.strategies
    }

    /// Check that every rule names a known method with valid parameters
    pub fn validate(&self, registry: &MethodRegistry) -> Result<(), ConfigError> {
        for rule in self.strategies() {
            registry.build(&rule.method, &rule.params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_empty_all() {
        let config = CheckConfig::default();
        assert_eq!(config.apply(), ApplyMode::All);
        assert!(config.strategies().is_empty());
        assert!(config.validate(&MethodRegistry::builtin()).is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = CheckConfig::from_toml_str(
            r#"
            [degradation]
            apply = "first"

            [[degradation.strategies]]
            type = "time"
            method = "bmoe"

            [[degradation.strategies]]
            method = "aat"
            params = { degradation_threshold = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(config.apply(), ApplyMode::First);
        assert_eq!(config.strategies().len(), 2);
        assert_eq!(config.strategies()[0].resource_type.as_deref(), Some("time"));
        assert_eq!(config.strategies()[1].params["degradation_threshold"], 3.0);
        assert!(config.validate(&MethodRegistry::builtin()).is_ok());
    }

    #[test]
    fn test_missing_apply_defaults_to_all() {
        let config = CheckConfig::from_toml_str(
            r#"
            [[degradation.strategies]]
            method = "average_amount_threshold"
            "#,
        )
        .unwrap();
        assert_eq!(config.apply(), ApplyMode::All);
    }

    #[test]
    fn test_invalid_apply_mode() {
        let result = CheckConfig::from_toml_str("[degradation]\napply = \"some\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_malformed_rule_rejected() {
        let result = CheckConfig::from_toml_str(
            r#"
            [[degradation.strategies]]
            methd = "aat"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_unknown_method() {
        let config = CheckConfig::new(ApplyMode::All, vec![StrategyRule::new("magic")]);
        assert!(matches!(
            config.validate(&MethodRegistry::builtin()),
            Err(ConfigError::UnknownMethod(name)) if name == "magic"
        ));
    }

    #[test]
    fn test_embedded_defaults() {
        let config = CheckConfig::default_strategies().unwrap();
        assert_eq!(config.apply(), ApplyMode::All);
        assert_eq!(config.strategies().len(), 2);
        assert!(config.validate(&MethodRegistry::builtin()).is_ok());
    }
}
