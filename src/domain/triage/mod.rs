//! Triage domain: the report model, conversation history, request modes,
//! the response parser, and the action log.

mod action_log;
mod content;
mod conversation;
mod errors;
mod mode;
mod parser;
mod report;

pub use action_log::{ActionEntry, ActionKind, ActionLog};
pub use content::{Attachment, ContentBundle, ContentPart};
pub use conversation::{Conversation, ConversationTurn};
pub use errors::{HistoryError, ParseError};
pub use mode::{ModeSelector, RequestMode};
pub use parser::{ParseAttempt, ParseStrategy, ParsedReport, ResponseParser};
pub use report::{
    report_schema, Confidence, SepsisRisk, ToolVerificationData, TriageReport, TriageUrgency,
    URGENCY_FIELD, VISUALIZATION_KEYS,
};
