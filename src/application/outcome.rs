//! Results of an orchestration run.

use serde::Serialize;
use thiserror::Error;

use super::request_executor::ExecutorError;
use crate::domain::foundation::RunId;
use crate::domain::triage::{ActionLog, HistoryError, ParseError, ParseStrategy, TriageReport};

/// Run-fatal errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestrationError {
    #[error("request failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("final response could not be parsed: {0}")]
    ParseExhausted(ParseError),

    #[error("turn budget of {max_turns} exceeded without a valid report")]
    TurnBudgetExceeded { max_turns: u32 },

    #[error("run cancelled")]
    Cancelled,

    #[error("conversation history invariant violated: {0}")]
    History(#[from] HistoryError),
}

/// A completed run.
#[derive(Debug, Clone, Serialize)]
pub struct TriageRun {
    pub run_id: RunId,
    pub report: TriageReport,
    /// JSON text the report was read from.
    pub raw_json: String,
    pub strategy: ParseStrategy,
    pub repaired: bool,
    pub turns_used: u32,
    /// True when the report came from last-chance extraction after the
    /// turn budget ran out.
    pub budget_exhausted: bool,
    /// Names of executed tools, in execution order.
    pub tools_invoked: Vec<String>,
    pub action_log: ActionLog,
}

impl TriageRun {
    pub fn invoked(&self, tool: &str) -> bool {
        self.tools_invoked.iter().any(|name| name == tool)
    }
}

/// A failed run. The action log gathered up to the failure is kept.
#[derive(Debug, Clone, Error)]
#[error("triage run {run_id} failed: {error}")]
pub struct RunFailure {
    pub run_id: RunId,
    #[source]
    pub error: OrchestrationError,
    pub action_log: ActionLog,
    /// Most recent model text, if any arrived.
    pub last_response_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ServiceError;

    #[test]
    fn failure_message_includes_cause() {
        let failure = RunFailure {
            run_id: RunId::new(),
            error: OrchestrationError::TurnBudgetExceeded { max_turns: 5 },
            action_log: ActionLog::new(),
            last_response_text: None,
        };
        assert!(failure
            .to_string()
            .ends_with("turn budget of 5 exceeded without a valid report"));
    }

    #[test]
    fn executor_errors_convert() {
        let err: OrchestrationError = ExecutorError::Exhausted {
            last: ServiceError::rate_limited(1),
            attempts: 5,
        }
        .into();
        assert!(matches!(err, OrchestrationError::Executor(e) if e.is_exhausted()));
    }
}
