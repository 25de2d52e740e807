//! Fixed instructions sent to the reasoning service.

use crate::domain::tools::ToolRegistry;

pub const SYSTEM_INSTRUCTION: &str = "\
You are a senior clinical triage specialist working in an emergency department.

Your task:
- Synthesize every modality you are given: free-text notes, images, lab summaries, and vitals trends.
- Produce a ranked differential diagnosis and a triage urgency of RED, YELLOW, or GREEN.
- Ground quantitative claims in the available tools instead of estimating them yourself.

Tool use:
- Call calculate_sepsis_risk whenever heart rate, respiratory rate, lactate, or blood pressure is known.
- Call generate_vitals_visualization whenever at least two time-stamped vitals readings are known, \
passing the readings as a JSON string.
- When unsure between two urgency categories, choose the more urgent one.

Output:
- The final answer is a single JSON object with differential_diagnosis, triage_urgency, \
confidence_score (0.0 to 1.0), evidence_summary, and tool_verification_data.
- tool_verification_data carries the tool results verbatim: sepsis_risk and visualization_base64.";

/// Appended after every tool round that is followed by a schema-enforced call.
pub const TOOL_RESULTS_FOLLOW_UP: &str = "\
Now that you have the tool results, provide your final diagnostic report as a JSON object only, \
with no markdown and no explanation. Use exactly these fields: differential_diagnosis (list of \
strings), triage_urgency (RED, YELLOW, or GREEN), confidence_score (0.0 to 1.0), evidence_summary \
(string), tool_verification_data (object). Include the tool results in tool_verification_data.";

/// Appended when the service answered a tools-enabled call without using any tool.
pub const FINAL_REPORT_REQUEST: &str = "\
Please provide your final diagnostic report as a JSON object only, with no markdown and no \
explanation. Use exactly these fields: differential_diagnosis (list of strings), triage_urgency \
(RED, YELLOW, or GREEN), confidence_score (0.0 to 1.0), evidence_summary (string), \
tool_verification_data (object).";

/// Closing instruction of the first user turn.
pub fn initial_instruction(registry: &ToolRegistry) -> String {
    if registry.is_empty() {
        return "Assess the patient and provide your final diagnostic report.".to_string();
    }

    let mut lines = vec!["Before answering, call each of these tools for which the case provides inputs:".to_string()];
    for name in registry.tool_names() {
        let description = registry
            .get_definition(name)
            .map(|d| d.description())
            .unwrap_or_default();
        lines.push(format!("- {}: {}", name, description));
    }
    lines.push("Then synthesize all data into your final report and include the tool results in tool_verification_data.".to_string());
    lines.join("\n")
}
