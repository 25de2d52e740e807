//! Errors raised by the triage domain.

use thiserror::Error;

use super::parser::ParseAttempt;

/// Reasons the response parser refused a text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    /// The response carried no text at all.
    #[error("response text is empty")]
    Empty,

    /// A candidate object was found but it has no `triage_urgency` field.
    #[error("missing required field: triage_urgency")]
    MissingDiscriminator,

    /// `triage_urgency` holds something other than RED, YELLOW, or GREEN.
    #[error("invalid triage_urgency value: {0}")]
    InvalidDiscriminator(String),

    /// Every strategy in the fallback chain failed.
    #[error("no strategy produced a valid report ({} attempts)", .attempts.len())]
    Exhausted { attempts: Vec<ParseAttempt> },
}

impl ParseError {
    /// True when the failure is about the discriminator field.
    ///
    /// Such failures are never rescued by partial acceptance.
    pub fn is_discriminator_failure(&self) -> bool {
        matches!(self, Self::MissingDiscriminator | Self::InvalidDiscriminator(_))
    }
}

/// Violations of the tool round ordering rule in the conversation history.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("tool round has {results} results for {requests} requested calls")]
    ResultCountMismatch { requests: usize, results: usize },

    #[error("tool result {position} answers call {actual}, expected {expected}")]
    ResultOrderMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::triage::ParseStrategy;

    #[test]
    fn exhausted_reports_attempt_count() {
        let err = ParseError::Exhausted {
            attempts: vec![
                ParseAttempt::new(ParseStrategy::Direct, "expected value"),
                ParseAttempt::new(ParseStrategy::FencedBlock, "no fenced block"),
            ],
        };
        assert_eq!(err.to_string(), "no strategy produced a valid report (2 attempts)");
    }

    #[test]
    fn discriminator_failures_are_flagged() {
        assert!(ParseError::MissingDiscriminator.is_discriminator_failure());
        assert!(ParseError::InvalidDiscriminator("BLUE".into()).is_discriminator_failure());
        assert!(!ParseError::Empty.is_discriminator_failure());
    }

    #[test]
    fn order_mismatch_names_both_calls() {
        let err = HistoryError::ResultOrderMismatch {
            position: 1,
            expected: "call-b".into(),
            actual: "call-a".into(),
        };
        assert_eq!(err.to_string(), "tool result 1 answers call call-a, expected call-b");
    }
}
