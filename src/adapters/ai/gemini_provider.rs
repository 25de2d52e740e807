//! Gemini Provider - `ReasoningService` over the Gemini `generateContent` REST API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = GeminiConfig::new(api_key)
//!     .with_model("gemini-2.5-flash")
//!     .with_timeout(Duration::from_secs(120));
//!
//! let provider = GeminiProvider::new(config)?;
//! ```
//!
//! Each call carries either `tools` or a `generationConfig` with a response
//! schema, never both; the API rejects the combination.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::domain::foundation::CallId;
use crate::domain::tools::ToolCallRequest;
use crate::domain::triage::{ContentPart, ConversationTurn};
use crate::ports::{
    GenerateRequest, GenerateResponse, ReasoningService, RequestConfig, ServiceError, ServiceInfo,
};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Retry-after used when a 429 body carries no retry delay.
const DEFAULT_RETRY_AFTER_SECS: u32 = 30;

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_secret(Secret::new(api_key.into()))
    }

    pub fn from_secret(api_key: Secret<String>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Gemini API provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn send_request(&self, body: &WireRequest) -> Result<Response, ServiceError> {
        self.client
            .post(self.generate_url())
            .header("x-goog-api-key", self.config.api_key())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        timeout_secs: self.config.timeout.as_secs(),
                    }
                } else if e.is_connect() {
                    ServiceError::network(format!("Connection failed: {}", e))
                } else {
                    ServiceError::network(e.to_string())
                }
            })
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_body = response.text().await.unwrap_or_default();
        Err(map_status(status.as_u16(), &error_body))
    }
}

#[async_trait]
impl ReasoningService for GeminiProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        let body = to_wire_request(request);
        debug!(
            model = %self.config.model,
            mode = %request.mode(),
            contents = body.contents.len(),
            "sending generateContent"
        );

        let response = self.send_request(&body).await?;
        let response = self.handle_response_status(response).await?;

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::parse(format!("Failed to parse response: {}", e)))?;

        from_wire_response(wire)
    }

    fn service_info(&self) -> ServiceInfo {
        ServiceInfo::new("gemini", self.config.model.clone())
    }
}

/// Maps a non-success HTTP status to a service error.
fn map_status(status: u16, error_body: &str) -> ServiceError {
    match status {
        429 => ServiceError::rate_limited(parse_retry_after(error_body)),
        401 | 403 => ServiceError::AuthenticationFailed,
        400 | 404 => ServiceError::InvalidRequest(error_body.to_string()),
        408 => ServiceError::unavailable(format!("Request timeout {}: {}", status, error_body)),
        500..=599 => ServiceError::unavailable(format!("Server error {}: {}", status, error_body)),
        _ => ServiceError::InvalidRequest(format!("Unexpected status {}: {}", status, error_body)),
    }
}

/// Reads `retryDelay` (e.g. `"23s"`) from the RetryInfo detail of an error body.
fn parse_retry_after(error_body: &str) -> u32 {
    let Ok(parsed) = serde_json::from_str::<Value>(error_body) else {
        return DEFAULT_RETRY_AFTER_SECS;
    };
    parsed
        .pointer("/error/details")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|detail| detail.get("retryDelay").and_then(Value::as_str))
        .find_map(|delay| delay.trim_end_matches('s').parse::<f64>().ok())
        .map(|secs| secs.ceil() as u32)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn to_wire_request(request: &GenerateRequest) -> WireRequest {
    let mut contents: Vec<WireContent> = Vec::new();

    for turn in &request.turns {
        let (role, parts) = match turn {
            ConversationTurn::User { parts } => ("user", parts.iter().map(user_part).collect::<Vec<_>>()),
            ConversationTurn::Model { text, tool_calls } => {
                let mut parts = Vec::with_capacity(tool_calls.len() + 1);
                if let Some(text) = text {
                    parts.push(WirePart::text(text.clone()));
                }
                parts.extend(tool_calls.iter().map(|call| WirePart {
                    function_call: Some(WireFunctionCall {
                        id: None,
                        name: call.name().to_string(),
                        args: call.arguments().clone(),
                    }),
                    ..Default::default()
                }));
                ("model", parts)
            }
        };
        if parts.is_empty() {
            continue;
        }

        // Consecutive turns from the same side travel as one content.
        match contents.last_mut() {
            Some(last) if last.role == role => last.parts.extend(parts),
            _ => contents.push(WireContent {
                role: role.to_string(),
                parts,
            }),
        }
    }

    let (tools, generation_config) = match &request.config {
        RequestConfig::Tools { declarations } => (
            Some(vec![WireTool {
                function_declarations: declarations.clone(),
            }]),
            None,
        ),
        RequestConfig::Schema { response_schema } => (
            None,
            Some(WireGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema.clone(),
            }),
        ),
    };

    WireRequest {
        system_instruction: request.system_instruction.as_ref().map(|text| WireContent {
            role: String::new(),
            parts: vec![WirePart::text(text.clone())],
        }),
        contents,
        tools,
        generation_config,
    }
}

fn user_part(part: &ContentPart) -> WirePart {
    match part {
        ContentPart::Text(text) => WirePart::text(text.clone()),
        ContentPart::Binary { mime_type, data } => WirePart {
            inline_data: Some(WireInlineData {
                mime_type: mime_type.clone(),
                data: STANDARD.encode(data),
            }),
            ..Default::default()
        },
        ContentPart::ToolResult(result) => WirePart {
            function_response: Some(WireFunctionResponse {
                name: result.name().to_string(),
                response: result.response_payload(),
            }),
            ..Default::default()
        },
    }
}

fn from_wire_response(wire: WireResponse) -> Result<GenerateResponse, ServiceError> {
    let Some(candidate) = wire.candidates.into_iter().next() else {
        if let Some(reason) = wire.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ServiceError::content_blocked(reason));
        }
        return Err(ServiceError::parse("response contained no candidates"));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        if let Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII")) =
            candidate.finish_reason.as_deref()
        {
            return Err(ServiceError::content_blocked(reason));
        }
    }

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if part.thought == Some(true) {
            continue;
        }
        if let Some(chunk) = part.text {
            text.push_str(&chunk);
        }
        if let Some(call) = part.function_call {
            let call_id = call.id.map(CallId::new).unwrap_or_else(CallId::generate);
            tool_calls.push(ToolCallRequest::new(call_id, call.name, call.args));
        }
    }

    Ok(GenerateResponse {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireInlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

impl WirePart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    function_declarations: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}
