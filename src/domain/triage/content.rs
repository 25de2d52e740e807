//! Typed content parts and the inbound content bundle.

use crate::domain::tools::ToolCallResult;

/// One part of a user-side conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Binary { mime_type: String, data: Vec<u8> },
    ToolResult(ToolCallResult),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolCallResult> {
        match self {
            Self::ToolResult(r) => Some(r),
            _ => None,
        }
    }
}

/// A binary attachment such as a chest X-ray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Inbound case content: free-text notes, an optional attachment, and
/// summaries rendered by upstream preprocessors. Summaries are opaque text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBundle {
    notes: String,
    attachment: Option<Attachment>,
    summaries: Vec<String>,
}

impl ContentBundle {
    pub fn new(notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachment = Some(Attachment {
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summaries.push(summary.into());
        self
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn summaries(&self) -> &[String] {
        &self.summaries
    }

    /// Converts the bundle into turn parts. A single image goes first,
    /// then the notes, then each summary in order.
    pub fn into_parts(self) -> Vec<ContentPart> {
        let mut parts = Vec::with_capacity(2 + self.summaries.len());

        if let Some(attachment) = self.attachment {
            parts.push(ContentPart::Binary {
                mime_type: attachment.mime_type,
                data: attachment.data,
            });
        }
        parts.push(ContentPart::Text(format!("Patient Notes: {}", self.notes)));
        parts.extend(self.summaries.into_iter().map(ContentPart::Text));

        parts
    }
}
