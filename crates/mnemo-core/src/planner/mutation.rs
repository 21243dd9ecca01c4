//! Mutation directives proposed for one conversational turn.

use serde::{Deserialize, Serialize};

use crate::entry::{EntryId, Importance};

/// A new fact the planner wants stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEntry {
    pub content: String,
    pub importance: Importance,
}

/// Replace the content of an existing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDirective {
    pub target_id: EntryId,
    pub new_content: String,
    pub reason: Option<String>,
}

/// Remove an existing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDirective {
    pub target_id: EntryId,
    pub reason: Option<String>,
}

/// The add/update/delete triple for one turn.
///
/// Updates and deletes naming an id the store does not hold are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSet {
    pub adds: Vec<ProposedEntry>,
    pub updates: Vec<UpdateDirective>,
    pub deletes: Vec<DeleteDirective>,
}

impl MutationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total number of directives.
    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }

    pub fn add(mut self, content: impl Into<String>, importance: Importance) -> Self {
        self.adds.push(ProposedEntry {
            content: content.into(),
            importance,
        });
        self
    }

    pub fn update(mut self, target_id: impl Into<EntryId>, new_content: impl Into<String>) -> Self {
        self.updates.push(UpdateDirective {
            target_id: target_id.into(),
            new_content: new_content.into(),
            reason: None,
        });
        self
    }

    pub fn delete(mut self, target_id: impl Into<EntryId>) -> Self {
        self.deletes.push(DeleteDirective {
            target_id: target_id.into(),
            reason: None,
        });
        self
    }
}
