//! Tools the reasoning service may call, and the registry that dispatches them.

mod definitions;
mod errors;
mod tool;
mod tool_call;
mod tool_definition;
mod tool_registry;

pub use definitions::{
    default_registry, SepsisRiskTool, VitalsChartTool, VitalsSample, HIGH_RISK_THRESHOLD,
    SEPSIS_RISK_TOOL, VITALS_CHART_TOOL,
};
pub use errors::ToolError;
pub use tool::Tool;
pub use tool_call::{ToolCallRequest, ToolCallResult, ToolOutcome};
pub use tool_definition::{ParameterType, ToolDefinition, ToolParameter};
pub use tool_registry::ToolRegistry;
