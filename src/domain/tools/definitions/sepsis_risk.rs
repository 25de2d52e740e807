//! `calculate_sepsis_risk` - simplified sepsis risk score.
//!
//! Demonstration scoring only; not a clinical instrument.

use serde_json::{Map, Value};

use crate::domain::tools::{ParameterType, Tool, ToolDefinition, ToolError};

/// Registered tool name.
pub const SEPSIS_RISK_TOOL: &str = "calculate_sepsis_risk";

/// Scores at or above this value are "High Risk".
pub const HIGH_RISK_THRESHOLD: i64 = 20;

/// Upper bound for heart rate, respiratory rate, and blood pressure.
const MAX_VITAL: f64 = 1_000.0;

/// Upper bound for serum lactate in mmol/L.
const MAX_LACTATE: f64 = 100.0;

/// Computes `heart_rate/10 + respiratory_rate/5 + trunc(lactate*3)`.
pub struct SepsisRiskTool {
    definition: ToolDefinition,
}

impl Default for SepsisRiskTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SepsisRiskTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                SEPSIS_RISK_TOOL,
                "Calculate a simplified sepsis risk score from heart rate, systolic blood \
                 pressure, lactate level, and respiratory rate.",
            )
            .with_parameter("heart_rate", ParameterType::Integer, "Heart rate in beats per minute", true)
            .with_parameter(
                "blood_pressure",
                ParameterType::Integer,
                "Systolic blood pressure in mmHg",
                true,
            )
            .with_parameter("lactate_level", ParameterType::Number, "Serum lactate in mmol/L", true)
            .with_parameter(
                "respiratory_rate",
                ParameterType::Integer,
                "Respiratory rate in breaths per minute",
                true,
            ),
        }
    }

    /// Scores the given vitals. Saturates instead of overflowing.
    pub fn score(heart_rate: i64, respiratory_rate: i64, lactate_level: f64) -> i64 {
        (heart_rate / 10)
            .saturating_add(respiratory_rate / 5)
            .saturating_add((lactate_level * 3.0).trunc() as i64)
    }

    /// Category label for a score.
    pub fn category(score: i64) -> &'static str {
        if score >= HIGH_RISK_THRESHOLD {
            "High Risk"
        } else {
            "Low Risk"
        }
    }

    fn bounded(arguments: &Map<String, Value>, name: &str, max: f64) -> Result<f64, ToolError> {
        let value = arguments
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::invalid_arguments(SEPSIS_RISK_TOOL, format!("missing {}", name)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ToolError::execution_failed(
                SEPSIS_RISK_TOOL,
                format!("{} must be a non-negative number", name),
            ));
        }
        if value > max {
            return Err(ToolError::invalid_arguments(
                SEPSIS_RISK_TOOL,
                format!("{} of {} exceeds the plausible maximum of {}", name, value, max),
            ));
        }
        Ok(value)
    }
}

impl Tool for SepsisRiskTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let heart_rate = Self::bounded(arguments, "heart_rate", MAX_VITAL)? as i64;
        let respiratory_rate = Self::bounded(arguments, "respiratory_rate", MAX_VITAL)? as i64;
        // Declared and validated, but not part of the score.
        Self::bounded(arguments, "blood_pressure", MAX_VITAL)?;
        let lactate_level = Self::bounded(arguments, "lactate_level", MAX_LACTATE)?;

        let score = Self::score(heart_rate, respiratory_rate, lactate_level);

        Ok(serde_json::json!({
            "risk_score": score,
            "score_category": Self::category(score),
        }))
    }
}
