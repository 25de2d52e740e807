//! Scripted reasoning service for tests and offline runs.
//!
//! Replies are consumed in order; every request is recorded together with
//! the tokio instant it arrived at, so retry timing can be checked under a
//! paused clock.
//!
//! # Example
//!
//! ```ignore
//! let service = ScriptedProvider::new()
//!     .with_error(ServiceError::rate_limited(1))
//!     .with_text(r#"{"triage_urgency":"GREEN", ...}"#);
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::domain::triage::RequestMode;
use crate::ports::{GenerateRequest, GenerateResponse, ReasoningService, ServiceError, ServiceInfo};

/// A request the provider received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: GenerateRequest,
    pub at: Instant,
}

/// Queue-driven `ReasoningService`.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Result<GenerateResponse, ServiceError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Duration,
    info: ServiceInfo,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            info: ServiceInfo::new("scripted", "scripted-model"),
        }
    }

    pub fn with_response(self, response: GenerateResponse) -> Self {
        lock(&self.replies).push_back(Ok(response));
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(GenerateResponse::text(text))
    }

    /// Queues a reply requesting the given `(name, arguments)` tool calls.
    pub fn with_tool_calls<N: Into<String>>(self, calls: impl IntoIterator<Item = (N, Value)>) -> Self {
        let response = calls
            .into_iter()
            .fold(GenerateResponse::default(), |r, (name, args)| r.with_tool_call(name, args));
        self.with_response(response)
    }

    pub fn with_error(self, error: ServiceError) -> Self {
        lock(&self.replies).push_back(Err(error));
        self
    }

    /// Simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        lock(&self.calls).iter().map(|c| c.request.clone()).collect()
    }

    /// Modes of the recorded requests, in call order.
    pub fn modes(&self) -> Vec<RequestMode> {
        lock(&self.calls).iter().map(|c| c.request.mode()).collect()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl ReasoningService for ScriptedProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        lock(&self.calls).push(RecordedCall {
            request: request.clone(),
            at: Instant::now(),
        });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Err(ServiceError::InvalidRequest("no scripted reply left".to_string())))
    }

    fn service_info(&self) -> ServiceInfo {
        self.info.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
