//! The terminal triage report and its pieces.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use super::errors::ParseError;
use crate::domain::tools::{ToolCallResult, SEPSIS_RISK_TOOL, VITALS_CHART_TOOL};

/// Name of the discriminator field every accepted report must carry.
pub const URGENCY_FIELD: &str = "triage_urgency";

/// Keys under which a visualization may arrive, canonical key first.
pub const VISUALIZATION_KEYS: [&str; 3] =
    ["visualization_base64", "base64_image", "vitals_visualization"];

/// Triage urgency category. Serialized verbatim as `RED`, `YELLOW`, `GREEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriageUrgency {
    Red,
    Yellow,
    Green,
}

impl TriageUrgency {
    pub const ALL: [TriageUrgency; 3] = [Self::Red, Self::Yellow, Self::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
        }
    }
}

impl fmt::Display for TriageUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriageUrgency {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| ParseError::InvalidDiscriminator(s.to_string()))
    }
}

/// Confidence in the primary hypothesis, within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Returns `None` for values outside `[0.0, 1.0]` or NaN.
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("confidence {} is outside [0, 1]", value))
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// Typed view of a `calculate_sepsis_risk` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepsisRisk {
    pub risk_score: f64,
    pub score_category: String,
}

/// Verbatim tool outputs embedded in the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ToolVerificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sepsis_risk: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_base64: Option<String>,
    /// Any other keys the service chose to include.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for ToolVerificationData {
    fn from(mut map: Map<String, Value>) -> Self {
        let sepsis_risk = map.remove("sepsis_risk").filter(|v| !v.is_null());

        // Every alias leaves the map, usable or not, so none reappears
        // through `extra` next to the canonical key.
        let candidates: Vec<Value> = VISUALIZATION_KEYS
            .into_iter()
            .filter_map(|key| map.remove(key))
            .collect();
        let visualization_base64 = candidates.into_iter().find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        });

        Self {
            sepsis_risk,
            visualization_base64,
            extra: map,
        }
    }
}

impl ToolVerificationData {
    pub fn is_empty(&self) -> bool {
        self.sepsis_risk.is_none() && self.visualization_base64.is_none() && self.extra.is_empty()
    }

    /// Parses the sepsis entry, if it has the expected shape.
    pub fn sepsis_assessment(&self) -> Option<SepsisRisk> {
        self.sepsis_risk
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Fills entries the service left out from recorded successful tool
    /// results. The most recent result for a tool wins; entries already
    /// present are kept. Returns the names of the filled entries.
    pub fn backfill_from<'a>(
        &mut self,
        results: impl DoubleEndedIterator<Item = &'a ToolCallResult>,
    ) -> Vec<&'static str> {
        let mut filled = Vec::new();

        for result in results.rev() {
            let Some(value) = result.value() else {
                continue;
            };
            match result.name() {
                SEPSIS_RISK_TOOL if self.sepsis_risk.is_none() => {
                    self.sepsis_risk = Some(value.clone());
                    filled.push("sepsis_risk");
                }
                VITALS_CHART_TOOL if self.visualization_base64.is_none() => {
                    if let Value::String(encoded) = value {
                        self.visualization_base64 = Some(encoded.clone());
                        filled.push("visualization_base64");
                    }
                }
                _ => {}
            }
        }

        filled
    }
}

/// Structured triage report, the final artifact of a run.
///
/// `confidence_score` and `evidence_summary` are only absent on reports
/// accepted as partial during last-chance extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageReport {
    /// Ranked hypotheses, most likely first.
    #[serde(default)]
    pub differential_diagnosis: Vec<String>,
    pub triage_urgency: TriageUrgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_summary: Option<String>,
    #[serde(default)]
    pub tool_verification_data: ToolVerificationData,
}

impl TriageReport {
    pub fn primary_hypothesis(&self) -> Option<&str> {
        self.differential_diagnosis.first().map(String::as_str)
    }

    /// True when every field a strict parse requires is present.
    pub fn is_complete(&self) -> bool {
        !self.differential_diagnosis.is_empty()
            && self.confidence_score.is_some()
            && self.evidence_summary.is_some()
    }
}

/// Response schema sent with schema-enforced calls.
pub fn report_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "differential_diagnosis": {
                "type": "array",
                "description": "Ranked list of possible diagnoses, most likely first.",
                "items": { "type": "string" }
            },
            "triage_urgency": {
                "type": "string",
                "description": "The final triage category.",
                "enum": ["RED", "YELLOW", "GREEN"]
            },
            "confidence_score": {
                "type": "number",
                "description": "Confidence in the primary diagnosis (0.0 to 1.0)."
            },
            "evidence_summary": {
                "type": "string",
                "description": "Concise summary of the cross-modal evidence supporting the diagnosis."
            },
            "tool_verification_data": {
                "type": "object",
                "description": "Results from the function calls (risk score, visualization base64).",
                "properties": {
                    "sepsis_risk": {
                        "type": "object",
                        "properties": {
                            "risk_score": { "type": "number" },
                            "score_category": { "type": "string" }
                        }
                    },
                    "visualization_base64": { "type": "string" }
                }
            }
        },
        "required": [
            "differential_diagnosis",
            "triage_urgency",
            "confidence_score",
            "evidence_summary"
        ]
    })
}
