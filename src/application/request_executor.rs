//! One logical generate call with bounded retry and exponential backoff.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::OrchestrationConfig;
use crate::domain::triage::ActionLog;
use crate::ports::{GenerateRequest, GenerateResponse, ReasoningService, ServiceError};

/// Retry schedule for transient service failures.
///
/// The wait before attempt `n + 1` is `base_delay * 2^(n - 1)`, capped at
/// `max_delay`. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Wait after the `failed_attempts`-th consecutive failure.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl From<&OrchestrationConfig> for RetryPolicy {
    fn from(config: &OrchestrationConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_delay())
    }
}

/// Failure of a logical call after retry handling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// A non-retryable failure; surfaced without further attempts.
    #[error("service call failed permanently on attempt {attempts}: {source}")]
    Permanent { source: ServiceError, attempts: u32 },

    /// Every attempt failed with a transient error.
    #[error("service call failed after {attempts} attempts: {last}")]
    Exhausted { last: ServiceError, attempts: u32 },

    #[error("service call cancelled")]
    Cancelled,
}

impl ExecutorError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
            Self::Cancelled => 0,
        }
    }
}

/// Sends generate requests with retry.
#[derive(Clone)]
pub struct RequestExecutor {
    service: Arc<dyn ReasoningService>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(service: Arc<dyn ReasoningService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn service(&self) -> Arc<dyn ReasoningService> {
        Arc::clone(&self.service)
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// Every retry is recorded in `log` as an error entry for `turn`.
    /// Cancellation is honored while a call is in flight and while waiting
    /// between attempts.
    pub async fn send(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
        log: &mut ActionLog,
        turn: u32,
    ) -> Result<GenerateResponse, ExecutorError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                result = self.service.generate(request) => result,
            };

            let error = match result {
                Ok(response) => {
                    debug!(attempt, tool_calls = response.tool_calls.len(), "service call succeeded");
                    return Ok(response);
                }
                Err(error) => error,
            };

            if !error.is_transient() {
                log.error(turn, format!("service error (not retried): {}", error));
                return Err(ExecutorError::Permanent {
                    source: error,
                    attempts: attempt,
                });
            }

            if attempt >= self.policy.max_attempts {
                log.error(
                    turn,
                    format!("service error after {} attempts, giving up: {}", attempt, error),
                );
                return Err(ExecutorError::Exhausted {
                    last: error,
                    attempts: attempt,
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "transient service error, retrying: {}",
                error
            );
            log.error(
                turn,
                format!(
                    "{} (attempt {}/{}), retrying in {:.2}s",
                    error,
                    attempt,
                    self.policy.max_attempts,
                    delay.as_secs_f64()
                ),
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }
}
