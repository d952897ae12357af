//! Timing configuration for the REPL driver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Timeouts used while talking to the interpreter.
///
/// The defaults are tuned for a local subprocess; slow links (SSH over a
/// WAN, serial bridges) may want a longer probe timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// How long a scan iteration waits for output before re-checking side
    /// commands.
    pub poll_timeout: Duration,

    /// How long to wait for the byte that decides whether a partial prompt
    /// is really a prompt.
    pub probe_timeout: Duration,

    /// Deadline for each paste-mode framing marker (mode switch, script
    /// echo, execution start).
    pub protocol_timeout: Duration,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(100),
            protocol_timeout: Duration::from_secs(10),
        }
    }
}

impl ReplConfig {
    /// Check the configuration for values the scanner cannot work with.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("poll_timeout", self.poll_timeout),
            ("probe_timeout", self.probe_timeout),
            ("protocol_timeout", self.protocol_timeout),
        ]
        .into_iter()
        .find(|(_, value)| value.is_zero());

        if let Some((name, _)) = zero {
            return Err(SessionError::InvalidConfig {
                message: format!("{name} must be greater than zero"),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.probe_timeout, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: ReplConfig =
            serde_json::from_str(r#"{"probe_timeout": {"secs": 0, "nanos": 250000000}}"#).unwrap();
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.protocol_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ReplConfig {
            poll_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_timeout"));
    }
}
