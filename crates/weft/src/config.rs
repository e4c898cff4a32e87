//! Weaving configuration (weft.toml)
//!
//! ```toml
//! [weaving]
//! on_no_matching_join_points = "warn"
//! noop = false
//! ignore_no_matching_join_points = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// What creating an aspect that matches nothing does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchPolicy {
    /// Fail with `NoMatchingJoinPoints`
    #[default]
    Error,
    /// Emit a warning diagnostic and create an aspect with nothing installed
    Warn,
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeftConfig {
    /// Weaving behaviour
    #[serde(default)]
    pub weaving: WeavingConfig,
}

/// `[weaving]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeavingConfig {
    /// Policy for aspects whose pointcuts match nothing
    #[serde(default)]
    pub on_no_matching_join_points: NoMatchPolicy,

    /// Resolve pointcuts but never install advice
    #[serde(default)]
    pub noop: bool,

    /// Accept aspects that match nothing without any diagnostic
    #[serde(default)]
    pub ignore_no_matching_join_points: bool,
}

impl WeftConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: WeftConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weaving.ignore_no_matching_join_points
            && self.weaving.on_no_matching_join_points == NoMatchPolicy::Warn
        {
            return Err(ConfigError::ValidationError(
                "on_no_matching_join_points = \"warn\" has no effect when ignore_no_matching_join_points is set"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to a TOML string
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WeftConfig::from_str("").unwrap();
        assert_eq!(config.weaving.on_no_matching_join_points, NoMatchPolicy::Error);
        assert!(!config.weaving.noop);
    }

    #[test]
    fn test_parse_weaving_table() {
        let toml = r#"
[weaving]
on_no_matching_join_points = "warn"
noop = true
"#;
        let config = WeftConfig::from_str(toml).unwrap();
        assert_eq!(config.weaving.on_no_matching_join_points, NoMatchPolicy::Warn);
        assert!(config.weaving.noop);
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let toml = r#"
[weaving]
on_no_matching_join_points = "shrug"
"#;
        assert!(matches!(WeftConfig::from_str(toml), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_contradictory_settings_fail_validation() {
        let toml = r#"
[weaving]
on_no_matching_join_points = "warn"
ignore_no_matching_join_points = true
"#;
        assert!(matches!(WeftConfig::from_str(toml), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = WeftConfig::default();
        config.weaving.noop = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(WeftConfig::from_str(&text).unwrap(), config);
    }
}
