//! Language model configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Gemini model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Gemini API key
    pub api_key: Option<Secret<String>>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-turn deadline for the full streamed reply, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl ModelConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Validate model configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_api_key() {
            return Err(ValidationError::MissingRequired("MODEL__API_KEY"));
        }
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingRequired("MODEL__MODEL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidBaseUrl);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("model"));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-pro-exp-02-05".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key() -> ModelConfig {
        ModelConfig {
            api_key: Some(Secret::new("AIza-test".to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.model, "gemini-2.0-pro-exp-02-05");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_validation_requires_key() {
        assert!(ModelConfig::default().validate().is_err());

        let blank = ModelConfig {
            api_key: Some(Secret::new("  ".to_string())),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(with_key().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let config = ModelConfig {
            base_url: "generativelanguage.googleapis.com".to_string(),
            ..with_key()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBaseUrl)
        ));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = ModelConfig {
            timeout_secs: 0,
            ..with_key()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", with_key());
        assert!(!rendered.contains("AIza-test"));
    }
}
