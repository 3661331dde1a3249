//! Idle session eviction

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// A chat idle this long loses its model session and cached history
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.idle_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("session idle"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidTimeout("session sweep"));
        }
        if self.sweep_interval_secs > self.idle_timeout_secs {
            return Err(ValidationError::SweepIntervalTooLong);
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sweep_longer_than_idle_rejected() {
        let config = SessionConfig {
            idle_timeout_secs: 60,
            sweep_interval_secs: 120,
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::SweepIntervalTooLong)
        ));
    }
}
