//! Turn budget and retry settings

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Orchestration loop settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OrchestrationConfig {
    /// Maximum service calls per run
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after the first failed attempt, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single wait, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl OrchestrationConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validate orchestration settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_turns == 0 {
            return Err(ValidationError::InvalidTurnBudget);
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if self.base_delay_ms == 0 || self.max_delay_ms < self.base_delay_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        Ok(())
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_turns() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    16_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestrationConfig::default();
        assert_eq!(config.max_turns, 5);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay(), Duration::from_secs(1));
        assert_eq!(config.max_delay(), Duration::from_secs(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_turns_rejected() {
        let config = OrchestrationConfig {
            max_turns: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTurnBudget));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = OrchestrationConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRetryAttempts));
    }

    #[test]
    fn test_inverted_delays_rejected() {
        let config = OrchestrationConfig {
            base_delay_ms: 2_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));
    }
}
