//! Post-run verification summary for a completed triage.

use serde::Serialize;
use std::fmt;

use super::outcome::TriageRun;
use crate::domain::tools::{SEPSIS_RISK_TOOL, VITALS_CHART_TOOL};

/// Overall verdict over the six checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationGrade {
    Passed,
    Partial,
    Failed,
}

impl VerificationGrade {
    fn from_score(score: f64) -> Self {
        if score >= 5.0 {
            Self::Passed
        } else if score >= 3.0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for VerificationGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One named check and the credit it earned (0.0, 0.5 or 1.0).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationCheck {
    pub name: &'static str,
    pub credit: f64,
    pub detail: String,
}

impl VerificationCheck {
    fn binary(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            credit: if passed { 1.0 } else { 0.0 },
            detail: detail.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.credit >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunVerification {
    pub checks: Vec<VerificationCheck>,
    pub score: f64,
    pub grade: VerificationGrade,
}

impl fmt::Display for RunVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let mark = if check.passed() {
                "ok"
            } else if check.credit > 0.0 {
                "partial"
            } else {
                "missing"
            };
            writeln!(f, "[{:>7}] {}: {}", mark, check.name, check.detail)?;
        }
        write!(f, "score {:.1}/{}: {}", self.score, self.checks.len(), self.grade)
    }
}

/// Scores a completed run against what a complete triage should contain.
pub fn verify_run(run: &TriageRun) -> RunVerification {
    let report = &run.report;

    let confidence = report.confidence_score.map(|c| c.value());
    let evidence = report
        .evidence_summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let sepsis = run.invoked(SEPSIS_RISK_TOOL);
    let chart = run.invoked(VITALS_CHART_TOOL);
    let tools_check = VerificationCheck {
        name: "tools_invoked",
        credit: match (sepsis, chart) {
            (true, true) => 1.0,
            (true, false) => 0.5,
            _ => 0.0,
        },
        detail: match (sepsis, chart) {
            (true, true) => "sepsis risk and vitals chart".to_string(),
            (true, false) => "sepsis risk only".to_string(),
            (false, true) => "vitals chart only".to_string(),
            (false, false) => "none".to_string(),
        },
    };

    let checks = vec![
        // A report only exists with a recognized urgency.
        VerificationCheck::binary("triage_urgency", true, report.triage_urgency.as_str()),
        VerificationCheck::binary(
            "differential_diagnosis",
            !report.differential_diagnosis.is_empty(),
            format!("{} hypotheses", report.differential_diagnosis.len()),
        ),
        VerificationCheck::binary(
            "confidence_score",
            confidence.is_some(),
            confidence.map_or_else(|| "absent".to_string(), |c| format!("{:.2}", c)),
        ),
        VerificationCheck::binary(
            "evidence_summary",
            evidence.is_some(),
            evidence.map_or_else(|| "absent".to_string(), |e| format!("{} chars", e.len())),
        ),
        VerificationCheck::binary(
            "tool_verification_data",
            !report.tool_verification_data.is_empty(),
            if report.tool_verification_data.is_empty() {
                "empty"
            } else {
                "present"
            },
        ),
        tools_check,
    ];

    let score = checks.iter().map(|c| c.credit).sum();
    RunVerification {
        grade: VerificationGrade::from_score(score),
        checks,
        score,
    }
}
