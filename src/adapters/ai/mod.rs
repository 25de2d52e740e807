//! Reasoning service adapters.
//!
//! - `GeminiProvider` - Gemini `generateContent` over HTTPS
//! - `ScriptedProvider` - queue-driven double for tests and offline runs

mod gemini_provider;
mod scripted_provider;

pub use gemini_provider::{GeminiConfig, GeminiProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use scripted_provider::{RecordedCall, ScriptedProvider};
