//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid timeout for {0}")]
    InvalidTimeout(&'static str),

    #[error("Invalid model base URL")]
    InvalidBaseUrl,

    #[error("Trigger phrase must not be blank when free-text triggering is enabled")]
    BlankTriggerPhrase,

    #[error("Fallback reply must not be blank")]
    BlankFallbackReply,

    #[error("Sweep interval must not exceed the idle timeout")]
    SweepIntervalTooLong,
}
