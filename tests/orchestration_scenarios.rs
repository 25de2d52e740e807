//! End-to-end orchestration scenarios against a scripted reasoning service.
//!
//! Each test drives a full run through the public API and checks the
//! request sequence the service saw, the conversation it was sent, and the
//! action log the run produced.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use triage_agent::adapters::ai::ScriptedProvider;
use triage_agent::application::{
    verify_run, ExecutorError, OrchestrationError, TurnOrchestrator, VerificationGrade,
};
use triage_agent::domain::tools::{
    default_registry, ParameterType, Tool, ToolDefinition, ToolError, SEPSIS_RISK_TOOL,
    VITALS_CHART_TOOL,
};
use triage_agent::domain::triage::{
    ActionKind, ContentBundle, ConversationTurn, ParseStrategy, RequestMode, TriageUrgency,
};
use triage_agent::ports::{RequestConfig, ServiceError};

// =============================================================================
// Test Infrastructure
// =============================================================================

const FINAL_REPORT: &str = r#"{
  "differential_diagnosis": ["Septic shock", "Community-acquired pneumonia"],
  "triage_urgency": "RED",
  "confidence_score": 0.88,
  "evidence_summary": "Fever, HR 110, BP 90/60, lactate 4.8 and a right lower lobe opacity."
}"#;

fn case() -> ContentBundle {
    ContentBundle::new("62M, fever 39.2C, HR 110, BP 90/60, RR 24, confused.")
        .with_attachment("image/png", vec![0x89, b'P', b'N', b'G'])
        .with_summary("Tabular Data Feature: Lactate 4.8 mmol/L")
}

fn sepsis_args() -> Value {
    json!({"heart_rate": 110, "blood_pressure": 90, "lactate_level": 4.8, "respiratory_rate": 24})
}

fn vitals_args() -> Value {
    let series = json!([
        {"time": "08:00", "SpO2": 96, "HeartRate": 92},
        {"time": "09:00", "SpO2": 93, "HeartRate": 104},
        {"time": "10:00", "SpO2": 90, "HeartRate": 112}
    ]);
    json!({ "time_series_data": series.to_string() })
}

fn orchestrator(provider: &ScriptedProvider) -> TurnOrchestrator {
    TurnOrchestrator::new(Arc::new(provider.clone()), default_registry())
}

/// A tool whose body always panics.
struct PanickingTool {
    definition: ToolDefinition,
}

impl PanickingTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("order_ct_scan", "Orders a CT scan.").with_parameter(
                "region",
                ParameterType::String,
                "Body region",
                true,
            ),
        }
    }
}

impl Tool for PanickingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        panic!("scanner offline")
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn plain_text_answer_forces_a_schema_call() {
    let provider = ScriptedProvider::new()
        .with_text("The patient looks septic; I will summarize.")
        .with_text(FINAL_REPORT);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        provider.modes(),
        vec![RequestMode::ToolsEnabled, RequestMode::SchemaEnforced]
    );
    assert_eq!(run.turns_used, 2);
    assert_eq!(run.strategy, ParseStrategy::Direct);
    assert_eq!(run.report.triage_urgency, TriageUrgency::Red);
    assert_eq!(run.report.primary_hypothesis(), Some("Septic shock"));
    assert!(run.tools_invoked.is_empty());

    // The forced call carries the earlier text answer.
    let second = &provider.requests()[1];
    assert!(second.turns.iter().any(|t| matches!(
        t,
        ConversationTurn::Model { text: Some(text), .. } if text.contains("looks septic")
    )));
}

#[tokio::test]
async fn every_request_is_in_exactly_one_mode() {
    let provider = ScriptedProvider::new()
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
        .with_text(FINAL_REPORT);

    orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    for request in provider.requests() {
        match &request.config {
            RequestConfig::Tools { declarations } => {
                assert_eq!(declarations.len(), 2);
                assert_eq!(request.mode(), RequestMode::ToolsEnabled);
            }
            RequestConfig::Schema { response_schema } => {
                assert_eq!(response_schema["type"], "object");
                assert_eq!(request.mode(), RequestMode::SchemaEnforced);
            }
        }
        assert!(request.system_instruction.is_some());
    }
}

#[tokio::test]
async fn known_and_unknown_tools_are_answered_in_order() {
    let provider = ScriptedProvider::new()
        .with_tool_calls([
            (SEPSIS_RISK_TOOL, sepsis_args()),
            ("order_ct_scan", json!({"region": "chest"})),
        ])
        .with_text(FINAL_REPORT);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    let second = &provider.requests()[1];
    let model_turn = second.turns.iter().position(ConversationTurn::is_model).unwrap();
    let requested: Vec<_> = second.turns[model_turn]
        .tool_calls()
        .iter()
        .map(|c| c.call_id().clone())
        .collect();
    let results: Vec<_> = second.turns[model_turn + 1..model_turn + 3]
        .iter()
        .map(|t| t.tool_result().unwrap())
        .collect();

    assert_eq!(results[0].call_id(), &requested[0]);
    assert_eq!(results[1].call_id(), &requested[1]);
    assert!(results[0].is_success());
    assert!(results[1]
        .error_message()
        .unwrap()
        .contains("unknown tool: order_ct_scan"));

    assert_eq!(run.tools_invoked, vec![SEPSIS_RISK_TOOL]);
    assert!(run
        .action_log
        .of_kind(ActionKind::Error)
        .any(|e| e.message.contains("unknown tool")));
}

#[tokio::test]
async fn panicking_tool_becomes_a_failure_result() {
    let registry = default_registry().with_tool(PanickingTool::new());
    let provider = ScriptedProvider::new()
        .with_tool_calls([("order_ct_scan", json!({"region": "chest"}))])
        .with_text(FINAL_REPORT);

    let run = TurnOrchestrator::new(Arc::new(provider.clone()), registry)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    let second = &provider.requests()[1];
    let result = second.turns.iter().find_map(ConversationTurn::tool_result).unwrap();
    assert!(result.error_message().unwrap().contains("scanner offline"));
    assert_eq!(run.report.triage_urgency, TriageUrgency::Red);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_back_off_with_growing_gaps() {
    let provider = ScriptedProvider::new()
        .with_error(ServiceError::rate_limited(30))
        .with_error(ServiceError::unavailable("503 Service Unavailable"))
        .with_error(ServiceError::network("connection reset"))
        .with_text("No tools needed.")
        .with_text(FINAL_REPORT);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 5);

    let gaps: Vec<Duration> = calls[..4].windows(2).map(|w| w[1].at - w[0].at).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert!(gaps.windows(2).all(|w| w[1] > w[0]));

    // Retries stay within one logical call.
    assert_eq!(run.turns_used, 2);
    assert_eq!(
        run.action_log
            .of_kind(ActionKind::Error)
            .filter(|e| e.turn == 1)
            .count(),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_fails_the_run() {
    let mut provider = ScriptedProvider::new();
    for _ in 0..5 {
        provider = provider.with_error(ServiceError::rate_limited(1));
    }

    let failure = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        OrchestrationError::Executor(ExecutorError::Exhausted { attempts: 5, .. })
    ));
    assert_eq!(provider.call_count(), 5);
}

#[tokio::test]
async fn fenced_report_is_accepted() {
    let fenced = format!("```json\n{}\n```", FINAL_REPORT);
    let provider = ScriptedProvider::new()
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
        .with_text(fenced);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.strategy, ParseStrategy::FencedBlock);
    assert!(!run.repaired);
    assert_eq!(run.report.triage_urgency, TriageUrgency::Red);
}

#[tokio::test]
async fn fenced_report_inside_prose_is_found_by_scanning() {
    let wrapped = format!("Here is the final report:\n```json\n{}\n```\nStay safe.", FINAL_REPORT);
    let provider = ScriptedProvider::new()
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
        .with_text(wrapped);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.strategy, ParseStrategy::BalancedScan);
    assert_eq!(run.report.triage_urgency, TriageUrgency::Red);
}

#[tokio::test]
async fn tool_outputs_are_backfilled_verbatim() {
    let provider = ScriptedProvider::new()
        .with_tool_calls([
            (SEPSIS_RISK_TOOL, sepsis_args()),
            (VITALS_CHART_TOOL, vitals_args()),
        ])
        .with_text(FINAL_REPORT);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    let data = &run.report.tool_verification_data;
    assert_eq!(
        data.sepsis_risk,
        Some(json!({"risk_score": 29, "score_category": "High Risk"}))
    );
    let encoded = data.visualization_base64.as_deref().unwrap();
    assert!(!encoded.is_empty());

    let verification = verify_run(&run);
    assert_eq!(verification.score, 6.0);
    assert_eq!(verification.grade, VerificationGrade::Passed);
}

#[tokio::test]
async fn tool_calls_in_schema_mode_reopen_tools() {
    let provider = ScriptedProvider::new()
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
        .with_tool_calls([(VITALS_CHART_TOOL, vitals_args())])
        .with_text("Both tools done.")
        .with_text(FINAL_REPORT);

    let run = orchestrator(&provider)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        provider.modes(),
        vec![
            RequestMode::ToolsEnabled,
            RequestMode::SchemaEnforced,
            RequestMode::ToolsEnabled,
            RequestMode::SchemaEnforced,
        ]
    );
    assert_eq!(run.tools_invoked, vec![SEPSIS_RISK_TOOL, VITALS_CHART_TOOL]);
    assert_eq!(run.turns_used, 4);
}

#[tokio::test]
async fn budget_exhaustion_without_a_report_fails() {
    let provider = ScriptedProvider::new()
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
        .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())]);

    let failure = orchestrator(&provider)
        .with_max_turns(3)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        failure.error,
        OrchestrationError::TurnBudgetExceeded { max_turns: 3 }
    );
    assert_eq!(provider.call_count(), 3);
    assert!(failure
        .action_log
        .of_kind(ActionKind::Action)
        .any(|e| e.message.contains("last-chance")));
}

#[tokio::test]
async fn last_chance_repairs_truncated_text() {
    let truncated = r#"Interim: {"triage_urgency": "YELLOW", "differential_diagnosis": ["Asthma exacerbation", "Pneum"#;
    let provider = ScriptedProvider::new().with_response(
        triage_agent::ports::GenerateResponse::text(truncated)
            .with_tool_call(SEPSIS_RISK_TOOL, sepsis_args()),
    );

    let run = orchestrator(&provider)
        .with_max_turns(1)
        .run(case(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(run.budget_exhausted);
    assert!(run.repaired);
    assert_eq!(run.strategy, ParseStrategy::Partial);
    assert_eq!(run.report.triage_urgency, TriageUrgency::Yellow);
    assert_eq!(
        run.report.differential_diagnosis.first().map(String::as_str),
        Some("Asthma exacerbation")
    );
    assert!(!run.report.is_complete());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_a_call_stops_the_run() {
    let provider = ScriptedProvider::new()
        .with_delay(Duration::from_secs(10))
        .with_text(FINAL_REPORT);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let failure = orchestrator(&provider).run(case(), &cancel).await.unwrap_err();

    assert_eq!(failure.error, OrchestrationError::Cancelled);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.remaining(), 1);
}

#[tokio::test]
async fn concurrent_runs_share_one_orchestrator() {
    let mut provider = ScriptedProvider::new();
    for _ in 0..4 {
        provider = provider.with_text(FINAL_REPORT);
    }
    let orchestrator = Arc::new(orchestrator(&provider));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.run(case(), &CancellationToken::new()).await })
        })
        .collect();

    let mut runs = Vec::new();
    for handle in handles {
        runs.push(handle.await.unwrap().unwrap());
    }

    assert_ne!(runs[0].run_id, runs[1].run_id);
    assert!(runs.iter().all(|run| run.turns_used == 2));
    assert_eq!(provider.call_count(), 4);
}
