//! Turn orchestrator: drives a triage run from case content to a report.
//!
//! Each turn sends the history in one [`RequestMode`]. Tool calls are
//! executed and recorded, and the next call asks for the structured report.
//! A plain-text answer to a tools-enabled call forces one schema-enforced
//! call. A schema-enforced answer is parsed and ends the run. When the turn
//! budget runs out, the most recent model text gets one last-chance parse
//! before the run fails.

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::outcome::{OrchestrationError, RunFailure, TriageRun};
use super::prompts;
use super::request_executor::{ExecutorError, RequestExecutor, RetryPolicy};
use crate::config::OrchestrationConfig;
use crate::domain::foundation::RunId;
use crate::domain::tools::{ToolCallRequest, ToolCallResult, ToolOutcome, ToolRegistry};
use crate::domain::triage::{
    report_schema, ActionLog, ContentBundle, ContentPart, Conversation, ModeSelector, ParseError,
    ParsedReport, RequestMode, ResponseParser,
};
use crate::ports::{GenerateRequest, ReasoningService, RequestConfig};

/// Default turn budget.
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Longest tool value rendered into the action log.
const PREVIEW_CHARS: usize = 160;

/// Drives orchestration runs. Runs share nothing mutable; one orchestrator
/// can serve concurrent runs.
#[derive(Clone)]
pub struct TurnOrchestrator {
    executor: RequestExecutor,
    registry: ToolRegistry,
    parser: ResponseParser,
    max_turns: u32,
    system_instruction: String,
}

/// Per-run mutable state.
struct RunState {
    run_id: RunId,
    history: Conversation,
    log: ActionLog,
    turn: u32,
    tools_invoked: Vec<String>,
}

impl RunState {
    fn fail(self, error: OrchestrationError) -> RunFailure {
        error!(turn = self.turn, "triage run failed: {}", error);
        RunFailure {
            run_id: self.run_id,
            error,
            last_response_text: self.history.last_model_text().map(String::from),
            action_log: self.log,
        }
    }
}

impl TurnOrchestrator {
    pub fn new(service: Arc<dyn ReasoningService>, registry: ToolRegistry) -> Self {
        Self {
            executor: RequestExecutor::new(service, RetryPolicy::default()),
            registry,
            parser: ResponseParser::new(),
            max_turns: DEFAULT_MAX_TURNS,
            system_instruction: prompts::SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn from_config(
        service: Arc<dyn ReasoningService>,
        registry: ToolRegistry,
        config: &OrchestrationConfig,
    ) -> Self {
        Self::new(service, registry)
            .with_retry_policy(RetryPolicy::from(config))
            .with_max_turns(config.max_turns)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.executor = RequestExecutor::new(self.executor_service(), policy);
        self
    }

    /// Sets the turn budget; values below one are raised to one.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn executor_service(&self) -> Arc<dyn ReasoningService> {
        self.executor.service()
    }

    /// Runs one triage from `bundle` to a report.
    pub async fn run(&self, bundle: ContentBundle, cancel: &CancellationToken) -> Result<TriageRun, RunFailure> {
        let run_id = RunId::new();
        let span = info_span!("triage_run", run_id = %run_id);
        self.run_inner(run_id, bundle, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: RunId,
        bundle: ContentBundle,
        cancel: &CancellationToken,
    ) -> Result<TriageRun, RunFailure> {
        let service = self.executor.service().service_info();
        info!(
            service = %service.name,
            model = %service.model,
            max_turns = self.max_turns,
            tools = self.registry.tool_count(),
            "triage run started"
        );

        let mut state = RunState {
            run_id,
            history: Conversation::new(),
            log: ActionLog::new(),
            turn: 0,
            tools_invoked: Vec::new(),
        };

        let mut parts = bundle.into_parts();
        parts.push(ContentPart::text(prompts::initial_instruction(&self.registry)));
        state.history.push_user(parts);

        let mut mode = ModeSelector::initial_mode();

        loop {
            if cancel.is_cancelled() {
                return Err(state.fail(OrchestrationError::Cancelled));
            }

            state.turn += 1;
            if state.turn > self.max_turns {
                state.turn = self.max_turns;
                return self.last_chance(state);
            }

            debug!(turn = state.turn, %mode, "sending request");
            state
                .log
                .action(state.turn, format!("requesting response in {} mode", mode));

            let request = self.build_request(&state.history, mode);
            let response = match self
                .executor
                .send(&request, cancel, &mut state.log, state.turn)
                .await
            {
                Ok(response) => response,
                Err(ExecutorError::Cancelled) => return Err(state.fail(OrchestrationError::Cancelled)),
                Err(e) => return Err(state.fail(e.into())),
            };

            if response.has_tool_calls() {
                state.log.observation(
                    state.turn,
                    format!("service requested {} tool call(s)", response.tool_calls.len()),
                );

                let results = match self.execute_tools(&response.tool_calls, &mut state, cancel) {
                    Ok(results) => results,
                    Err(e) => return Err(state.fail(e)),
                };
                if let Err(e) = state
                    .history
                    .record_tool_round(response.text, response.tool_calls, results)
                {
                    return Err(state.fail(e.into()));
                }

                mode = ModeSelector::next_mode(true, mode.enforces_schema());
                if mode.enforces_schema() {
                    state.history.push_user_text(prompts::TOOL_RESULTS_FOLLOW_UP);
                }
                continue;
            }

            if mode.enforces_schema() {
                let text = response.text.unwrap_or_default();
                state.history.push_model_text(Some(text.clone()));
                return match self.parser.parse(&text) {
                    Ok(parsed) => Ok(self.finish(state, parsed, false)),
                    Err(e) => {
                        record_parse_failure(&mut state.log, state.turn, &e);
                        Err(state.fail(OrchestrationError::ParseExhausted(e)))
                    }
                };
            }

            // Tools were available but none were used: demand the report.
            debug!(turn = state.turn, "no tool calls in tools mode, forcing schema call");
            state.log.observation(
                state.turn,
                "service answered without tool calls; requesting the final report",
            );
            state.history.push_model_text(response.text);
            state.history.push_user_text(prompts::FINAL_REPORT_REQUEST);
            mode = ModeSelector::next_mode(false, mode.enforces_schema());
        }
    }

    fn build_request(&self, history: &Conversation, mode: RequestMode) -> GenerateRequest {
        let config = match mode {
            RequestMode::ToolsEnabled => RequestConfig::Tools {
                declarations: self.registry.declarations(),
            },
            RequestMode::SchemaEnforced => RequestConfig::Schema {
                response_schema: report_schema(),
            },
        };
        GenerateRequest::new(history.turns().to_vec(), config)
            .with_system_instruction(self.system_instruction.clone())
    }

    /// Executes one turn's tool calls in request order.
    fn execute_tools(
        &self,
        calls: &[ToolCallRequest],
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolCallResult>, OrchestrationError> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }

            state.log.action(
                state.turn,
                format!("service requested {}({})", call.name(), call.arguments()),
            );

            let result = self.registry.invoke(call);
            match result.outcome() {
                ToolOutcome::Success(value) => {
                    debug!(tool = call.name(), "tool succeeded");
                    state.tools_invoked.push(call.name().to_string());
                    state.log.observation(
                        state.turn,
                        format!("host executed {}: {}", call.name(), preview(value)),
                    );
                }
                ToolOutcome::Failure(message) => {
                    warn!(tool = call.name(), "tool call failed: {}", message);
                    state.log.error(state.turn, message.clone());
                }
            }
            results.push(result);
        }

        Ok(results)
    }

    fn last_chance(&self, mut state: RunState) -> Result<TriageRun, RunFailure> {
        warn!(
            max_turns = self.max_turns,
            "turn budget exhausted, attempting last-chance extraction"
        );
        state.log.action(
            state.turn,
            format!(
                "turn budget of {} exhausted; attempting last-chance extraction",
                self.max_turns
            ),
        );

        let outcome = state
            .history
            .last_model_text()
            .map(|text| self.parser.parse_last_chance(text));

        match outcome {
            Some(Ok(parsed)) => return Ok(self.finish(state, parsed, true)),
            Some(Err(e)) => record_parse_failure(&mut state.log, state.turn, &e),
            None => state
                .log
                .error(state.turn, "no model text available for last-chance extraction"),
        }

        Err(state.fail(OrchestrationError::TurnBudgetExceeded {
            max_turns: self.max_turns,
        }))
    }

    fn finish(&self, mut state: RunState, parsed: ParsedReport, budget_exhausted: bool) -> TriageRun {
        let ParsedReport {
            mut report,
            strategy,
            json,
            repaired,
            failed_attempts,
        } = parsed;

        for attempt in &failed_attempts {
            state
                .log
                .observation(state.turn, format!("parse attempt failed ({})", attempt));
        }
        state.log.observation(
            state.turn,
            format!(
                "report accepted via {} parse{}",
                strategy,
                if repaired { " after repair" } else { "" }
            ),
        );

        let filled = report
            .tool_verification_data
            .backfill_from(state.history.tool_results());
        if !filled.is_empty() {
            state.log.observation(
                state.turn,
                format!("filled tool_verification_data from tool results: {}", filled.join(", ")),
            );
        }

        info!(
            urgency = %report.triage_urgency,
            %strategy,
            turns = state.turn,
            budget_exhausted,
            "triage run completed"
        );

        TriageRun {
            run_id: state.run_id,
            report,
            raw_json: json,
            strategy,
            repaired,
            turns_used: state.turn,
            budget_exhausted,
            tools_invoked: state.tools_invoked,
            action_log: state.log,
        }
    }
}

fn record_parse_failure(log: &mut ActionLog, turn: u32, error: &ParseError) {
    if let ParseError::Exhausted { attempts } = error {
        for attempt in attempts {
            log.observation(turn, format!("parse attempt failed ({})", attempt));
        }
    }
    log.error(turn, format!("could not extract a report: {}", error));
}

/// Short rendering of a tool value for the action log.
fn preview(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() <= PREVIEW_CHARS {
        return rendered;
    }
    let head: String = rendered.chars().take(PREVIEW_CHARS).collect();
    format!("{}... ({} chars)", head, rendered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::ScriptedProvider;
    use crate::domain::tools::{default_registry, SEPSIS_RISK_TOOL};
    use crate::domain::triage::{ActionKind, ConversationTurn, ParseStrategy, TriageUrgency};
    use crate::ports::ServiceError;
    use serde_json::json;

    const FINAL: &str = r#"{"differential_diagnosis":["Septic shock"],"triage_urgency":"RED","confidence_score":0.85,"evidence_summary":"Tachycardia, hypotension, lactate 4.8."}"#;

    fn orchestrator(provider: &ScriptedProvider) -> TurnOrchestrator {
        TurnOrchestrator::new(Arc::new(provider.clone()), default_registry())
    }

    fn bundle() -> ContentBundle {
        ContentBundle::new("62M, fever, HR 110, BP 90/60, RR 24").with_summary("Tabular Data Feature: Lactate 4.8")
    }

    fn sepsis_args() -> Value {
        json!({"heart_rate": 110, "blood_pressure": 90, "lactate_level": 4.8, "respiratory_rate": 24})
    }

    #[tokio::test]
    async fn tool_round_then_schema_call_produces_report() {
        let provider = ScriptedProvider::new()
            .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
            .with_text(FINAL);

        let run = orchestrator(&provider).run(bundle(), &CancellationToken::new()).await.unwrap();

        assert_eq!(run.report.triage_urgency, TriageUrgency::Red);
        assert_eq!(run.turns_used, 2);
        assert_eq!(run.tools_invoked, vec![SEPSIS_RISK_TOOL]);
        assert_eq!(
            provider.modes(),
            vec![RequestMode::ToolsEnabled, RequestMode::SchemaEnforced]
        );
        // Verbatim tool output was filled in.
        let risk = run.report.tool_verification_data.sepsis_assessment().unwrap();
        assert_eq!(risk.risk_score, 29.0);
    }

    #[tokio::test]
    async fn schema_call_carries_tool_results_and_follow_up() {
        let provider = ScriptedProvider::new()
            .with_tool_calls([(SEPSIS_RISK_TOOL, sepsis_args())])
            .with_text(FINAL);

        orchestrator(&provider).run(bundle(), &CancellationToken::new()).await.unwrap();

        let second = &provider.requests()[1];
        let turns = &second.turns;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[1].tool_calls().len(), 1);
        assert!(turns[2].tool_result().unwrap().is_success());
        assert_eq!(
            turns[3],
            ConversationTurn::user_text(prompts::TOOL_RESULTS_FOLLOW_UP)
        );
    }

    #[tokio::test]
    async fn unparseable_schema_answer_fails_with_parse_exhausted() {
        let provider = ScriptedProvider::new()
            .with_text("I think the patient is fine.")
            .with_text("Still no JSON here.");

        let failure = orchestrator(&provider)
            .run(bundle(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, OrchestrationError::ParseExhausted(ParseError::Exhausted { .. })));
        assert_eq!(failure.last_response_text.as_deref(), Some("Still no JSON here."));
        assert!(failure.action_log.of_kind(ActionKind::Error).count() >= 1);
    }

    #[tokio::test]
    async fn permanent_service_error_fails_the_run_with_log() {
        let provider = ScriptedProvider::new().with_error(ServiceError::AuthenticationFailed);

        let failure = orchestrator(&provider)
            .run(bundle(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            OrchestrationError::Executor(ExecutorError::Permanent { .. })
        ));
        assert!(!failure.action_log.is_empty());
    }

    #[tokio::test]
    async fn tool_failure_does_not_abort_the_run() {
        let provider = ScriptedProvider::new()
            .with_tool_calls([(SEPSIS_RISK_TOOL, json!({"heart_rate": "fast"}))])
            .with_text(FINAL);

        let run = orchestrator(&provider).run(bundle(), &CancellationToken::new()).await.unwrap();

        assert!(run.tools_invoked.is_empty());
        assert_eq!(run.action_log.of_kind(ActionKind::Error).count(), 1);
        assert!(run.report.tool_verification_data.sepsis_risk.is_none());
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_calls() {
        let provider = ScriptedProvider::new().with_text(FINAL);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = orchestrator(&provider).run(bundle(), &cancel).await.unwrap_err();

        assert_eq!(failure.error, OrchestrationError::Cancelled);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn single_turn_budget_uses_last_chance_on_tool_text() {
        let provider = ScriptedProvider::new().with_response(
            crate::ports::GenerateResponse::text(
                r#"Working on it. {"triage_urgency":"YELLOW","differential_diagnosis":["Asthma"]}"#,
            )
            .with_tool_call(SEPSIS_RISK_TOOL, sepsis_args()),
        );

        let run = orchestrator(&provider)
            .with_max_turns(1)
            .run(bundle(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(run.budget_exhausted);
        assert_eq!(run.strategy, ParseStrategy::Partial);
        assert_eq!(run.report.triage_urgency, TriageUrgency::Yellow);
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn preview_truncates_long_values() {
        let long = Value::String("A".repeat(1000));
        let rendered = preview(&long);
        assert!(rendered.starts_with(&"A".repeat(PREVIEW_CHARS)));
        assert!(rendered.ends_with("(1000 chars)"));
        assert_eq!(preview(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
