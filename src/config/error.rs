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
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Base URL must use http or https")]
    InvalidBaseUrl,

    #[error("Turn budget must be at least 1")]
    InvalidTurnBudget,

    #[error("Retry attempts must be at least 1")]
    InvalidRetryAttempts,

    #[error("Backoff delays must be positive and max_delay_ms must not be below base_delay_ms")]
    InvalidBackoff,
}
