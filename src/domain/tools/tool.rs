//! The `Tool` trait implemented by every registered tool.

use serde_json::{Map, Value};

use super::{ToolDefinition, ToolError};

/// A named, typed, synchronous function the reasoning service may request.
///
/// Implementations must be deterministic and free of hidden state. Arguments
/// have already been validated against [`Tool::definition`] when
/// [`Tool::execute`] is called.
pub trait Tool: Send + Sync {
    /// Declared name, description, and parameters.
    fn definition(&self) -> &ToolDefinition;

    /// Runs the tool body.
    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError>;
}
