//! Executor configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::SprocError;

/// Default command timeout, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Options shared by every call an executor issues.
///
/// Deserializes from e.g. `{"command_timeout_secs": 30}`; missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    #[serde(rename = "command_timeout_secs", deserialize_with = "secs")]
    command_timeout: Duration,
}

fn secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl ExecutorOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Parse options from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::ConfigError` for malformed JSON or a zero timeout.
    pub fn from_json(json: &str) -> Result<Self, SprocError> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| SprocError::ConfigError(format!("invalid executor options: {e}")))?;
        if options.command_timeout.is_zero() {
            return Err(SprocError::ConfigError(
                "command_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_json() {
        assert_eq!(ExecutorOptions::default().command_timeout(), Duration::from_secs(300));
        let parsed = ExecutorOptions::from_json(r#"{"command_timeout_secs": 5}"#).unwrap();
        assert_eq!(parsed.command_timeout(), Duration::from_secs(5));
        assert_eq!(ExecutorOptions::from_json("{}").unwrap(), ExecutorOptions::default());
        assert!(ExecutorOptions::from_json(r#"{"command_timeout_secs": 0}"#).is_err());
        assert!(ExecutorOptions::from_json("[1]").is_err());
    }
}
