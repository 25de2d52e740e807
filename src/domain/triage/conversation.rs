//! Append-only conversation history for a single run.

use super::content::ContentPart;
use super::errors::HistoryError;
use crate::domain::tools::{ToolCallRequest, ToolCallResult};

/// One exchange unit in the history.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationTurn {
    /// Caller-side content: case material, instructions, or a tool result.
    User { parts: Vec<ContentPart> },
    /// Service-side content: text and/or tool call requests.
    Model {
        text: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
}

impl ConversationTurn {
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self::User { parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::User {
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model { .. })
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Model { tool_calls, .. } => tool_calls,
            Self::User { .. } => &[],
        }
    }

    /// The tool result carried by a result turn.
    pub fn tool_result(&self) -> Option<&ToolCallResult> {
        match self {
            Self::User { parts } if parts.len() == 1 => parts[0].as_tool_result(),
            _ => None,
        }
    }
}

/// Ordered history of a run.
///
/// Turns are only ever appended. A model turn with tool calls is always
/// followed by one result turn per call, in request order; the only way to
/// append such a turn is [`Conversation::record_tool_round`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, parts: Vec<ContentPart>) {
        self.turns.push(ConversationTurn::user(parts));
    }

    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::user_text(text));
    }

    /// Appends a model turn that requested no tools.
    pub fn push_model_text(&mut self, text: Option<String>) {
        self.turns.push(ConversationTurn::Model {
            text,
            tool_calls: Vec::new(),
        });
    }

    /// Appends a model tool-call turn followed by its results.
    ///
    /// Nothing is appended unless `results` answers `requests` one-to-one
    /// and in order.
    pub fn record_tool_round(
        &mut self,
        text: Option<String>,
        requests: Vec<ToolCallRequest>,
        results: Vec<ToolCallResult>,
    ) -> Result<(), HistoryError> {
        check_round(&requests, &results)?;

        self.turns.push(ConversationTurn::Model {
            text,
            tool_calls: requests,
        });
        self.turns.extend(
            results
                .into_iter()
                .map(|r| ConversationTurn::user(vec![ContentPart::ToolResult(r)])),
        );
        Ok(())
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text of the most recent model turn that had any.
    pub fn last_model_text(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|turn| match turn {
            ConversationTurn::Model { text: Some(t), .. } => Some(t.as_str()),
            _ => None,
        })
    }

    /// Every recorded tool result, oldest first.
    pub fn tool_results(&self) -> impl DoubleEndedIterator<Item = &ToolCallResult> {
        self.turns.iter().filter_map(ConversationTurn::tool_result)
    }

    /// Re-checks the tool round ordering rule over the whole history.
    pub fn validate(&self) -> Result<(), HistoryError> {
        for (i, turn) in self.turns.iter().enumerate() {
            let requests = turn.tool_calls();
            if requests.is_empty() {
                continue;
            }
            let answers: Vec<ToolCallResult> = self.turns[i + 1..]
                .iter()
                .take(requests.len())
                .map_while(|t| t.tool_result().cloned())
                .collect();
            check_round(requests, &answers)?;
        }
        Ok(())
    }
}

fn check_round(requests: &[ToolCallRequest], results: &[ToolCallResult]) -> Result<(), HistoryError> {
    if requests.len() != results.len() {
        return Err(HistoryError::ResultCountMismatch {
            requests: requests.len(),
            results: results.len(),
        });
    }
    for (position, (request, result)) in requests.iter().zip(results).enumerate() {
        if request.call_id() != result.call_id() {
            return Err(HistoryError::ResultOrderMismatch {
                position,
                expected: request.call_id().to_string(),
                actual: result.call_id().to_string(),
            });
        }
    }
    Ok(())
}
