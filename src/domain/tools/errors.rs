//! Tool dispatch errors.
//!
//! None of these cross the registry boundary: `ToolRegistry::invoke` turns
//! every one of them into a recorded failure outcome.

use thiserror::Error;

/// Errors raised while resolving, validating, or executing a tool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the declared parameter types.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool body reported a failure.
    #[error("execution of {tool} failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    /// The tool body panicked.
    #[error("execution of {tool} panicked: {message}")]
    Panicked { tool: String, message: String },
}

impl ToolError {
    /// Creates an invalid arguments error.
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Creates an execution failure.
    pub fn execution_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}
