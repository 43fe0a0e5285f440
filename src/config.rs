//! Runtime configuration for the workflow engine.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default optimistic grace window in seconds.
pub const DEFAULT_GRACE_WINDOW_SECS: u64 = 120;

/// Tunables for the workflow engine.
///
/// # Examples
///
/// ```
/// use tasklane::config::WorkflowConfig;
///
/// let config = WorkflowConfig::from_json(r#"{ "grace_window_secs": 30 }"#)
///     .expect("valid configuration");
/// assert_eq!(config.grace_window().num_seconds(), 30);
/// assert!(config.pool_on_last_rejection);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// How long a speculative status may outlive a contradicting snapshot.
    pub grace_window_secs: u64,
    /// Return a task to the unassigned pool when the rejection of its only
    /// live assignment is approved.
    pub pool_on_last_rejection: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            grace_window_secs: DEFAULT_GRACE_WINDOW_SECS,
            pool_on_last_rejection: true,
        }
    }
}

impl WorkflowConfig {
    /// Returns a copy with a different grace window.
    #[must_use]
    pub const fn with_grace_window(mut self, seconds: u64) -> Self {
        self.grace_window_secs = seconds;
        self
    }

    /// Parses a configuration from JSON, filling omitted fields with
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the input is not valid JSON for
    /// this structure.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Returns the grace window as a duration.
    #[must_use]
    pub fn grace_window(&self) -> TimeDelta {
        i64::try_from(self.grace_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration could not be parsed.
    #[error("invalid workflow configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
