//! Tool call request and result value objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::CallId;

/// A request from the reasoning service to run a named local tool.
///
/// Arguments are kept as raw JSON; the registry validates them against the
/// tool's declared parameters before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    call_id: CallId,
    name: String,
    arguments: Value,
}

impl ToolCallRequest {
    /// Creates a new tool call request.
    pub fn new(call_id: CallId, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id,
            name: name.into(),
            arguments,
        }
    }

    /// Returns the call identifier.
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Returns the tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw arguments.
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }
}

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Tool produced a value.
    Success(Value),
    /// Tool could not produce a value; carries a human-readable reason.
    Failure(String),
}

/// Result recorded for every tool call, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    call_id: CallId,
    name: String,
    outcome: ToolOutcome,
}

impl ToolCallResult {
    /// Creates a successful result for the given request.
    pub fn success(request: &ToolCallRequest, value: Value) -> Self {
        Self {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Success(value),
        }
    }

    /// Creates a failed result for the given request.
    pub fn failure(request: &ToolCallRequest, message: impl Into<String>) -> Self {
        Self {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Failure(message.into()),
        }
    }

    /// Returns the call identifier this result answers.
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Returns the tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> &ToolOutcome {
        &self.outcome
    }

    /// Returns true if the tool succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// Returns the produced value, if any.
    pub fn value(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Success(value) => Some(value),
            ToolOutcome::Failure(_) => None,
        }
    }

    /// Returns the failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Failure(message) => Some(message),
        }
    }

    /// Payload handed back to the reasoning service.
    pub fn response_payload(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success(value) => serde_json::json!({ "result": value }),
            ToolOutcome::Failure(message) => serde_json::json!({ "error": message }),
        }
    }
}
