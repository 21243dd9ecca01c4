//! Request rendering for the reasoning oracle.

use crate::entry::MemoryEntry;
use crate::turn::{render_transcript, Turn};

/// Shown instead of the store view when feedback is disabled.
pub const FEEDBACK_DISABLED_PLACEHOLDER: &str = "(Memory context not available)";

/// Shown when there is nothing to enumerate.
pub const EMPTY_STORE_PLACEHOLDER: &str = "(No memories stored yet)";

/// What the planner is allowed to see of the current store.
#[derive(Debug, Clone, Copy)]
pub enum MemoryView<'a> {
    Entries(&'a [MemoryEntry]),
    /// Feedback disabled: the oracle sees an opaque placeholder.
    Hidden,
}

/// Enumerate entries as `[id] content (importance: x)` lines.
pub fn render_entries(entries: &[MemoryEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_STORE_PLACEHOLDER.to_string();
    }
    entries
        .iter()
        .map(|e| format!("[{}] {} (importance: {})", e.id, e.content(), e.importance()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl MemoryView<'_> {
    pub fn render(&self) -> String {
        match self {
            Self::Entries(entries) => render_entries(entries),
            Self::Hidden => FEEDBACK_DISABLED_PLACEHOLDER.to_string(),
        }
    }
}

const TURN_INSTRUCTIONS: &str = r#"## Instructions

1. Reply to the user's latest message.
2. Decide which memory operations are needed to keep an accurate, compact profile of the user.

ADD facts that will matter in future sessions:
- identity and role (name, job, company, location)
- goals, plans, deadlines and ongoing work (projects, tools, team)
- specific numbers and metrics
- preferences, including ones inferred from how the user behaves, not only what they state

UPDATE an existing memory when a fact changes (status change, role change, tool switch,
metric improvement). Never ADD a duplicate of a changed fact. The new content must fully
replace the stale content.

DELETE time-bound details once they have clearly expired, and facts superseded by an update.

SKIP small talk (weather, food, travel complaints) unless it reveals a lasting preference.

Prefer a few high-value facts per session over transcribing everything.

Output ONLY valid JSON:
{"response": "...", "memory_ops": {"add": [{"content": "...", "importance": "high|medium|low"}], "update": [{"id": "...", "new_content": "...", "reason": "..."}], "delete": [{"id": "...", "reason": "..."}]}}"#;

/// Build the per-turn planner request.
pub fn turn_prompt(view: MemoryView<'_>, transcript: &[Turn], session: u32) -> String {
    format!(
        "You are a personal assistant with persistent memory about the user.\n\n\
         ## Current Memories\n{}\n\n\
         ## Conversation So Far (Session {})\n{}\n\n{}",
        view.render(),
        session,
        render_transcript(transcript),
        TURN_INSTRUCTIONS
    )
}

const CONSOLIDATION_INSTRUCTIONS: &str = r#"## Instructions

Consolidate these memories:
1. Merge related or overlapping memories into single, richer entries.
2. Remove redundant information.
3. Resolve contradictions by keeping the most recent version.
4. Keep the total count small.

Output ONLY valid JSON:
{"keep": ["id", ...], "merge": [{"source_ids": ["id", "id"], "merged_content": "..."}], "delete": ["id", ...]}"#;

/// Build the consolidation request over the full store.
pub fn consolidation_prompt(entries: &[MemoryEntry]) -> String {
    format!(
        "You are a memory consolidation system.\n\n## Current Memories\n{}\n\n{}",
        render_entries(entries),
        CONSOLIDATION_INSTRUCTIONS
    )
}
