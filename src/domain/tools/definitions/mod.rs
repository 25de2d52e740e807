//! Built-in clinical tools.

mod sepsis_risk;
mod vitals_chart;

pub use sepsis_risk::{SepsisRiskTool, HIGH_RISK_THRESHOLD, SEPSIS_RISK_TOOL};
pub use vitals_chart::{VitalsChartTool, VitalsSample, VITALS_CHART_TOOL};

use super::ToolRegistry;

/// Registry holding every built-in tool.
pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(SepsisRiskTool::new())
        .with_tool(VitalsChartTool::new())
}
