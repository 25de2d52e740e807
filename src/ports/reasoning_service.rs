//! Reasoning Service Port - the external model that drives a triage run.
//!
//! One logical operation, `generate`: given the conversation so far and a
//! request configuration, return text, tool call requests, or both.
//!
//! # Example
//!
//! ```ignore
//! use async_trait::async_trait;
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl ReasoningService for Canned {
//!     async fn generate(&self, _: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
//!         Ok(GenerateResponse::text(r#"{"triage_urgency":"GREEN"}"#))
//!     }
//!
//!     fn service_info(&self) -> ServiceInfo {
//!         ServiceInfo::new("canned", "none")
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::CallId;
use crate::domain::tools::ToolCallRequest;
use crate::domain::triage::{ConversationTurn, RequestMode};

/// Port for the external reasoning service.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Performs one generate call. No retries happen at this level.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError>;

    /// Service name and model, for logs.
    fn service_info(&self) -> ServiceInfo;
}

/// Per-call configuration. Tools and a response schema never travel
/// together on one call.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestConfig {
    /// Function declarations the service may call.
    Tools { declarations: Vec<Value> },
    /// JSON schema the response must follow.
    Schema { response_schema: Value },
}

impl RequestConfig {
    pub fn mode(&self) -> RequestMode {
        match self {
            Self::Tools { .. } => RequestMode::ToolsEnabled,
            Self::Schema { .. } => RequestMode::SchemaEnforced,
        }
    }
}

/// A single generate call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub turns: Vec<ConversationTurn>,
    pub config: RequestConfig,
}

impl GenerateRequest {
    pub fn new(turns: Vec<ConversationTurn>, config: RequestConfig) -> Self {
        Self {
            system_instruction: None,
            turns,
            config,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn mode(&self) -> RequestMode {
        self.config.mode()
    }
}

/// What the service returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    /// Requested tool calls, in the order the service listed them.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: None,
            tool_calls: calls,
        }
    }

    /// Appends a call with a generated id.
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        self.tool_calls
            .push(ToolCallRequest::new(CallId::generate(), name, arguments));
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Service identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub model: String,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Failures of a single generate call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Quota or rate limit hit.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// Server-side failure (5xx).
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    /// The service rejected the request itself (4xx other than auth/quota).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The service answered but the body could not be read.
    #[error("parse error: {0}")]
    Parse(String),

    /// The service refused to answer for safety reasons.
    #[error("content blocked: {reason}")]
    ContentBlocked { reason: String },
}

impl ServiceError {
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn content_blocked(reason: impl Into<String>) -> Self {
        Self::ContentBlocked {
            reason: reason.into(),
        }
    }

    /// True for failure classes worth retrying: rate limits, server-side
    /// failures, timeouts, and network errors.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transient_classification() {
        assert!(ServiceError::rate_limited(5).is_transient());
        assert!(ServiceError::unavailable("503").is_transient());
        assert!(ServiceError::Timeout { timeout_secs: 120 }.is_transient());
        assert!(ServiceError::network("reset").is_transient());

        assert!(!ServiceError::AuthenticationFailed.is_transient());
        assert!(!ServiceError::InvalidRequest("bad schema".into()).is_transient());
        assert!(!ServiceError::parse("not json").is_transient());
        assert!(!ServiceError::content_blocked("SAFETY").is_transient());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ServiceError::rate_limited(30).to_string(),
            "rate limited: retry after 30s"
        );
        assert_eq!(
            ServiceError::Timeout { timeout_secs: 120 }.to_string(),
            "request timed out after 120s"
        );
    }

    #[test]
    fn config_determines_mode() {
        let tools = RequestConfig::Tools { declarations: vec![] };
        let schema = RequestConfig::Schema {
            response_schema: json!({"type": "object"}),
        };
        assert_eq!(tools.mode(), RequestMode::ToolsEnabled);
        assert_eq!(schema.mode(), RequestMode::SchemaEnforced);
    }

    #[test]
    fn response_builder_generates_distinct_call_ids() {
        let response = GenerateResponse::default()
            .with_tool_call("a", json!({}))
            .with_tool_call("b", json!({}));
        assert!(response.has_tool_calls());
        assert_ne!(response.tool_calls[0].call_id(), response.tool_calls[1].call_id());
    }
}
