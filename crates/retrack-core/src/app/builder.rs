//! TrackerBuilder - 組み立てと起動時の設定検証

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::ports::{Clock, SystemClock};
use crate::tracker::InMemoryTracker;

/// Builds an [`InMemoryTracker`].
///
/// # Example
/// ```ignore
/// let tracker = TrackerBuilder::new()
///     .config(TrackerConfig::load("retrack.toml")?)
///     .build()?;
/// ```
///
/// `build()` rejects configurations that would make every record fail or
/// break the cleanup loop, instead of surfacing them at the first batch.
pub struct TrackerBuilder {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid tracker config: {0}")]
    InvalidConfig(String),
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the wall clock (tests, simulations).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<InMemoryTracker, BuildError> {
        validate(&self.config)?;
        Ok(InMemoryTracker::with_clock(self.config, self.clock))
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &TrackerConfig) -> Result<(), BuildError> {
    let mut problems = Vec::new();
    if config.default_max_attempts == 0 {
        problems.push("default_max_attempts must be at least 1");
    }
    if config.display_name_field.trim().is_empty() {
        problems.push("display_name_field must not be empty");
    }
    if config.cleanup_interval_secs == 0 {
        problems.push("cleanup_interval_secs must be greater than 0");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(BuildError::InvalidConfig(problems.join("; ")))
    }
}
