//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `CLINICAL_INTAKE`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use clinical_intake::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod bank;
mod error;
mod intake;
mod model;
mod server;
mod sessions;
mod storage;

pub use bank::BankConfig;
pub use error::{ConfigError, ValidationError};
pub use intake::IntakeConfig;
pub use model::ModelConfig;
pub use server::{Environment, ServerConfig};
pub use sessions::SessionConfig;
pub use storage::StorageConfig;

use serde::Deserialize;

use crate::application::OrchestratorConfig;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Gemini model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Transcript folder and scoring rubric
    #[serde(default)]
    pub bank: BankConfig,

    /// Phasing, fallback and persistence behavior
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Idle session eviction
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Chat history storage
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CLINICAL_INTAKE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CLINICAL_INTAKE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `CLINICAL_INTAKE__MODEL__API_KEY=...` -> `model.api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CLINICAL_INTAKE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.model.validate()?;
        self.bank.validate()?;
        self.intake.validate()?;
        self.sessions.validate()?;
        Ok(())
    }

    /// Settings for the turn orchestrator.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        self.intake.to_orchestrator_config(self.model.timeout())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
