//! Caller-visible log of tool invocations, parse attempts, and errors.

use serde::Serialize;
use std::fmt;

use crate::domain::foundation::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Action,
    Observation,
    Error,
}

impl ActionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Action => "ACTION",
            Self::Observation => "OBSERVATION",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEntry {
    pub kind: ActionKind,
    /// Turn the entry belongs to; 0 before the first call.
    pub turn: u32,
    pub message: String,
    pub recorded_at: Timestamp,
}

impl fmt::Display for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] turn {}: {}", self.kind.tag(), self.turn, self.message)
    }
}

/// Append-only action log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActionLog {
    entries: Vec<ActionEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ActionKind, turn: u32, message: impl Into<String>) {
        self.entries.push(ActionEntry {
            kind,
            turn,
            message: message.into(),
            recorded_at: Timestamp::now(),
        });
    }

    pub fn action(&mut self, turn: u32, message: impl Into<String>) {
        self.record(ActionKind::Action, turn, message);
    }

    pub fn observation(&mut self, turn: u32, message: impl Into<String>) {
        self.record(ActionKind::Observation, turn, message);
    }

    pub fn error(&mut self, turn: u32, message: impl Into<String>) {
        self.record(ActionKind::Error, turn, message);
    }

    pub fn entries(&self) -> &[ActionEntry] {
        &self.entries
    }

    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
