//! Conversation turns and transcript rendering.

use serde::{Deserialize, Serialize};

/// Default marker for scripted turns that stand in for withheld test content.
pub const MEMORY_TEST_MARKER: &str = "[MEMORY TEST]";

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Label used when rendering a transcript.
    pub fn speaker(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

/// One utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// True when the turn contains any of the placeholder markers.
    pub fn is_placeholder(&self, markers: &[String]) -> bool {
        markers
            .iter()
            .any(|m| !m.is_empty() && self.content.contains(m.as_str()))
    }
}

/// Drop placeholder turns, keeping the rest in order.
pub fn strip_placeholders(turns: &[Turn], markers: &[String]) -> Vec<Turn> {
    turns
        .iter()
        .filter(|t| !t.is_placeholder(markers))
        .cloned()
        .collect()
}

/// Render turns as `Speaker: content` lines.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.speaker(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}
