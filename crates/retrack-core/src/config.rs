//! Tracker configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! `RETRACK_MAX_ATTEMPTS` takes precedence over the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MAX_ATTEMPTS;
use crate::error::ConfigError;

pub const MAX_ATTEMPTS_ENV: &str = "RETRACK_MAX_ATTEMPTS";

/// What to do with attempts/errors/recoveries on an already processed record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostTerminalPolicy {
    /// Return `InvariantViolation::AlreadyProcessed`.
    #[default]
    Reject,
    /// Accept and record the mutation anyway.
    Allow,
}

/// Validation of the number passed to `start_attempt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptNumbering {
    /// Any number is accepted.
    #[default]
    Permissive,
    /// The number must be `attempts.len() + 1`.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// `max_attempts` given to every new record.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    /// Payload field holding the human-readable record name.
    #[serde(default = "default_display_name_field")]
    pub display_name_field: String,

    /// Age threshold used by the cleanup loop.
    #[serde(default = "default_cleanup_max_age_hours")]
    pub cleanup_max_age_hours: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub post_terminal: PostTerminalPolicy,

    #[serde(default)]
    pub attempt_numbering: AttemptNumbering,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_display_name_field() -> String {
    "name".to_string()
}

fn default_cleanup_max_age_hours() -> u64 {
    24
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: default_max_attempts(),
            display_name_field: default_display_name_field(),
            cleanup_max_age_hours: default_cleanup_max_age_hours(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            post_terminal: PostTerminalPolicy::default(),
            attempt_numbering: AttemptNumbering::default(),
        }
    }
}

impl TrackerConfig {
    /// Load from `path`, using defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TrackerConfig>(&contents)?
        } else {
            Self::default()
        };
        config.with_env_overrides(std::env::var(MAX_ATTEMPTS_ENV).ok())
    }

    fn with_env_overrides(mut self, max_attempts: Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = max_attempts
            && !value.is_empty()
        {
            self.default_max_attempts =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: MAX_ATTEMPTS_ENV,
                    value,
                })?;
        }
        Ok(self)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = TrackerConfig::default();
        assert_eq!(config.default_max_attempts, 3);
        assert_eq!(config.display_name_field, "name");
        assert_eq!(config.cleanup_max_age_hours, 24);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(3600));
        assert_eq!(config.post_terminal, PostTerminalPolicy::Reject);
        assert_eq!(config.attempt_numbering, AttemptNumbering::Permissive);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            default_max_attempts = 5
            post_terminal = "allow"
            attempt_numbering = "strict"
        "#;
        let config: TrackerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_max_attempts, 5);
        assert_eq!(config.post_terminal, PostTerminalPolicy::Allow);
        assert_eq!(config.attempt_numbering, AttemptNumbering::Strict);
        assert_eq!(config.display_name_field, "name");
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "display_name_field = \"company\"").unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();
        assert_eq!(config.display_name_field, "company");
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.display_name_field, "name");
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_max_attempts = \"three\"").unwrap();

        assert!(matches!(
            TrackerConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_override_wins() {
        let config = TrackerConfig::default()
            .with_env_overrides(Some("7".to_string()))
            .unwrap();
        assert_eq!(config.default_max_attempts, 7);

        let err = TrackerConfig::default()
            .with_env_overrides(Some("many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
