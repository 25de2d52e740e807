//! Tool definition - declared parameters and metadata for a tool.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ToolError;

/// Primitive type a tool parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Integer,
    Number,
    String,
    Boolean,
}

impl ParameterType {
    /// JSON Schema type name.
    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }

    /// Returns true if the value has this type.
    ///
    /// Integers sent as whole floats (`110.0`) are accepted, since the
    /// reasoning service serializes every number as a double.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParameterType,
    pub description: String,
    pub required: bool,
}

/// Definition of a tool the reasoning service may request.
///
/// # Examples
///
/// ```
/// use triage_agent::domain::tools::{ParameterType, ToolDefinition};
///
/// let definition = ToolDefinition::new("calculate_sepsis_risk", "Score sepsis risk")
///     .with_parameter("heart_rate", ParameterType::Integer, "Beats per minute", true);
///
/// assert_eq!(definition.parameters_schema()["required"][0], "heart_rate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    /// Creates a definition with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter to the definition.
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(ToolParameter {
            name: name.into(),
            param_type,
            description: description.into(),
            required,
        });
        self
    }

    /// Returns the tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared parameters in declaration order.
    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                serde_json::json!({
                    "type": param.param_type.schema_name(),
                    "description": param.description,
                }),
            );
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Function declaration in the reasoning service's tool format.
    pub fn to_declaration(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters_schema(),
        })
    }

    /// Validates argument shapes against the declared parameter types.
    ///
    /// Arguments the definition does not declare are ignored.
    pub fn validate_arguments(&self, arguments: &Value) -> Result<(), ToolError> {
        let object = arguments.as_object().ok_or_else(|| {
            ToolError::invalid_arguments(&self.name, "arguments must be a JSON object")
        })?;

        for param in &self.parameters {
            match object.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!("missing required parameter '{}'", param.name),
                    ));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!(
                            "parameter '{}' must be {}, got {}",
                            param.name,
                            param.param_type.schema_name(),
                            json_type_name(value)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vitals_definition() -> ToolDefinition {
        ToolDefinition::new("score", "Score vitals")
            .with_parameter("heart_rate", ParameterType::Integer, "bpm", true)
            .with_parameter("lactate_level", ParameterType::Number, "mmol/L", true)
            .with_parameter("note", ParameterType::String, "free text", false)
    }

    #[test]
    fn parameters_schema_lists_required_in_order() {
        let schema = vitals_definition().parameters_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["heart_rate"]["type"], "integer");
        assert_eq!(schema["properties"]["lactate_level"]["type"], "number");
        assert_eq!(schema["required"], json!(["heart_rate", "lactate_level"]));
    }

    #[test]
    fn declaration_has_name_description_and_parameters() {
        let declaration = vitals_definition().to_declaration();

        assert_eq!(declaration["name"], "score");
        assert_eq!(declaration["description"], "Score vitals");
        assert!(declaration["parameters"].is_object());
    }

    #[test]
    fn validate_accepts_well_typed_arguments() {
        let args = json!({"heart_rate": 110, "lactate_level": 4.8});
        assert!(vitals_definition().validate_arguments(&args).is_ok());
    }

    #[test]
    fn validate_accepts_whole_float_for_integer() {
        let args = json!({"heart_rate": 110.0, "lactate_level": 2});
        assert!(vitals_definition().validate_arguments(&args).is_ok());
    }

    #[test]
    fn validate_rejects_fractional_integer() {
        let args = json!({"heart_rate": 110.5, "lactate_level": 2});
        let err = vitals_definition().validate_arguments(&args).unwrap_err();
        assert!(err.to_string().contains("'heart_rate' must be integer"));
    }

    #[test]
    fn validate_rejects_missing_required() {
        let args = json!({"heart_rate": 90});
        let err = vitals_definition().validate_arguments(&args).unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'lactate_level'"));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let args = json!({"heart_rate": "fast", "lactate_level": 1.0});
        let err = vitals_definition().validate_arguments(&args).unwrap_err();
        assert!(err.to_string().contains("got string"));
    }

    #[test]
    fn validate_rejects_non_object_arguments() {
        let err = vitals_definition().validate_arguments(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn validate_ignores_undeclared_arguments() {
        let args = json!({"heart_rate": 90, "lactate_level": 1.0, "extra": true});
        assert!(vitals_definition().validate_arguments(&args).is_ok());
    }
}
