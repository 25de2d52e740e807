//! Request mode selection.
//!
//! The reasoning service rejects calls that declare tools and constrain the
//! response schema at once, so every outbound call runs in exactly one mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mode of a single outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestMode {
    /// Tools are declared; no response schema.
    ToolsEnabled,
    /// The response schema is enforced; no tools.
    SchemaEnforced,
}

impl RequestMode {
    pub fn allows_tools(&self) -> bool {
        matches!(self, Self::ToolsEnabled)
    }

    pub fn enforces_schema(&self) -> bool {
        matches!(self, Self::SchemaEnforced)
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolsEnabled => f.write_str("TOOLS_ENABLED"),
            Self::SchemaEnforced => f.write_str("SCHEMA_ENFORCED"),
        }
    }
}

/// Stateless mode transition rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeSelector;

impl ModeSelector {
    /// Mode of the first call of a run.
    pub fn initial_mode() -> RequestMode {
        RequestMode::ToolsEnabled
    }

    /// Mode of the next call.
    ///
    /// `had_tool_calls_this_round`: the response just received requested tools.
    /// `already_satisfied_schema`: the call just made was schema-enforced.
    ///
    /// | tool calls | was schema call | next           |
    /// |------------|-----------------|----------------|
    /// | yes        | no              | SchemaEnforced |
    /// | yes        | yes             | ToolsEnabled   |
    /// | no         | no              | SchemaEnforced |
    /// | no         | yes             | SchemaEnforced |
    ///
    /// Tool calls arriving on a schema-enforced call open a new tool round,
    /// so the following call declares tools again.
    pub fn next_mode(had_tool_calls_this_round: bool, already_satisfied_schema: bool) -> RequestMode {
        match (had_tool_calls_this_round, already_satisfied_schema) {
            (true, true) => RequestMode::ToolsEnabled,
            _ => RequestMode::SchemaEnforced,
        }
    }
}
