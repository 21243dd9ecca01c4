//! Memory entry model: one persisted fact plus its embedding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, unique identifier of a memory entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Generate a fresh short id (first 8 hex chars of a v4 UUID).
    pub fn generate() -> Self {
        let full = uuid::Uuid::new_v4().simple().to_string();
        EntryId(full[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for EntryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        EntryId(s.to_string())
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        EntryId(s)
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How much a fact matters for future sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

impl Importance {
    /// Lenient parse used for oracle output: unknown labels fall back to medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Which path created an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Added by the mutation planner during conversation ingestion.
    Conversation,
    /// Synthesized by a consolidation merge.
    Consolidation,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conversation => write!(f, "conversation"),
            Self::Consolidation => write!(f, "consolidation"),
        }
    }
}

/// Metadata carried by every entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub importance: Importance,
    pub session_created: u32,
    pub session_updated: u32,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<EntryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryMetadata {
    pub fn new(importance: Importance, session: u32, provenance: Provenance) -> Self {
        let now = Utc::now();
        Self {
            importance,
            session_created: session,
            session_updated: session,
            provenance,
            last_update_reason: None,
            merged_from: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_merged_from(mut self, sources: Vec<EntryId>) -> Self {
        self.merged_from = sources;
        self
    }
}

/// A single persisted fact about a user.
///
/// `content` and `embedding` are private: the only way to change either is
/// [`MemoryEntry::replace_content`], which swaps both at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: EntryId,
    content: String,
    pub metadata: EntryMetadata,
    embedding: Vec<f32>,
}

impl MemoryEntry {
    pub fn new(
        id: EntryId,
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: EntryMetadata,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            metadata,
            embedding,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn importance(&self) -> Importance {
        self.metadata.importance
    }

    /// Replace content and embedding together, advancing `session_updated`.
    pub fn replace_content(
        &mut self,
        content: impl Into<String>,
        embedding: Vec<f32>,
        session: u32,
        reason: Option<String>,
    ) {
        self.content = content.into();
        self.embedding = embedding;
        self.metadata.session_updated = session;
        self.metadata.last_update_reason = reason;
        self.metadata.updated_at = Utc::now();
    }
}
