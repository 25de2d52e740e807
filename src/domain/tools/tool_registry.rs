//! Tool Registry - fixed mapping from tool name to executable tool.
//!
//! The registry is built once at startup and shared read-only between runs.
//! [`ToolRegistry::invoke`] is the dispatch boundary: whatever goes wrong
//! (unknown name, bad arguments, failing or panicking tool body) comes back
//! as a failed [`ToolCallResult`], never as an error or unwind.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use triage_agent::domain::foundation::CallId;
//! use triage_agent::domain::tools::{default_registry, ToolCallRequest};
//!
//! let registry = default_registry();
//! let request = ToolCallRequest::new(
//!     CallId::new("c1"),
//!     "calculate_sepsis_risk",
//!     json!({"heart_rate": 110, "blood_pressure": 90, "lactate_level": 4.8, "respiratory_rate": 24}),
//! );
//!
//! let result = registry.invoke(&request);
//! assert!(result.is_success());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use super::{Tool, ToolCallRequest, ToolCallResult, ToolDefinition, ToolError};

/// Central registry of executable tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    /// All registered tools by name
    tools: HashMap<String, Arc<dyn Tool>>,

    /// Registration order, used for stable declaration output
    order: Vec<String>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    /// Creates a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its declared name.
    ///
    /// Registering a second tool with the same name replaces the first.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Arc::new(tool));
    }

    /// Builder form of [`ToolRegistry::register`].
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Checks if a tool is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Gets a tool definition by name.
    pub fn get_definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|tool| tool.definition())
    }

    /// Returns registered tool names in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Returns the number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function declarations for every tool, in registration order.
    pub fn declarations(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().to_declaration())
            .collect()
    }

    /// Invokes a tool and always returns a result for the request.
    pub fn invoke(&self, request: &ToolCallRequest) -> ToolCallResult {
        match self.dispatch(request) {
            Ok(value) => ToolCallResult::success(request, value),
            Err(err) => ToolCallResult::failure(request, err.to_string()),
        }
    }

    fn dispatch(&self, request: &ToolCallRequest) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(request.name())
            .ok_or_else(|| ToolError::UnknownTool(request.name().to_string()))?;

        tool.definition().validate_arguments(request.arguments())?;

        let arguments = request.arguments().as_object().ok_or_else(|| {
            ToolError::invalid_arguments(request.name(), "arguments must be a JSON object")
        })?;

        catch_unwind(AssertUnwindSafe(|| tool.execute(arguments))).unwrap_or_else(|payload| {
            Err(ToolError::Panicked {
                tool: request.name().to_string(),
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
