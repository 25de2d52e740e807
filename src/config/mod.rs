//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `TRIAGE_AGENT` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use triage_agent::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Using model {}", config.ai.model);
//! ```

mod ai;
mod error;
mod orchestration;

pub use ai::AiConfig;
pub use error::{ConfigError, ValidationError};
pub use orchestration::OrchestrationConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Reasoning service configuration (Gemini)
    #[serde(default)]
    pub ai: AiConfig,

    /// Turn budget and retry settings
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TRIAGE_AGENT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `TRIAGE_AGENT__AI__GEMINI_API_KEY=...` -> `ai.gemini_api_key = ...`
    /// - `TRIAGE_AGENT__ORCHESTRATION__MAX_TURNS=7` -> `orchestration.max_turns = 7`
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
                    .prefix("TRIAGE_AGENT")
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
        self.ai.validate()?;
        self.orchestration.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("TRIAGE_AGENT__AI__GEMINI_API_KEY");
        env::remove_var("TRIAGE_AGENT__AI__MODEL");
        env::remove_var("TRIAGE_AGENT__ORCHESTRATION__MAX_TURNS");
        env::remove_var("TRIAGE_AGENT__ORCHESTRATION__BASE_DELAY_MS");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("TRIAGE_AGENT__AI__GEMINI_API_KEY", "AIza-test");
        env::set_var("TRIAGE_AGENT__AI__MODEL", "gemini-2.5-pro");
        env::set_var("TRIAGE_AGENT__ORCHESTRATION__MAX_TURNS", "7");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(
            config.ai.gemini_api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("AIza-test")
        );
        assert_eq!(config.ai.model, "gemini-2.5-pro");
        assert_eq!(config.orchestration.max_turns, 7);
        assert_eq!(config.orchestration.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_key_fail_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_invalid_orchestration_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("TRIAGE_AGENT__AI__GEMINI_API_KEY", "AIza-test");
        env::set_var("TRIAGE_AGENT__ORCHESTRATION__BASE_DELAY_MS", "0");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));
    }
}
