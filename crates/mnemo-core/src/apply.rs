//! Applying a [`MutationSet`] to a [`MemoryStore`].
//!
//! Order: adds, then updates, then deletes. Adds and updates are each
//! embedded in one batch before any entry is written. A failed batch skips
//! every directive in it, and the store never holds an entry without its
//! vector.

use serde::Serialize;

use crate::entry::{EntryId, EntryMetadata, MemoryEntry, Provenance};
use crate::oracle::{embed_each, EmbeddingOracle};
use crate::planner::MutationSet;
use crate::stats::MemoryStats;
use crate::store::MemoryStore;

/// Category of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Add,
    Update,
    Delete,
}

/// Why a directive was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum SkipReason {
    UnknownId,
    EmbeddingFailed(String),
}

/// A directive that left the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDirective {
    pub kind: DirectiveKind,
    pub target: Option<EntryId>,
    pub content: Option<String>,
    pub reason: SkipReason,
}

/// What one application changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub added: Vec<MemoryEntry>,
    pub updated: Vec<MemoryEntry>,
    pub deleted: Vec<EntryId>,
    pub skipped: Vec<SkippedDirective>,
}

impl ApplyReport {
    /// Added then updated entries, as they were right after being written.
    pub fn touched(&self) -> Vec<MemoryEntry> {
        self.added.iter().chain(&self.updated).cloned().collect()
    }

    pub fn changed_store(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }
}

/// Apply `set` to `store` for `session`.
pub async fn apply_mutations(
    store: &mut MemoryStore,
    embedder: &dyn EmbeddingOracle,
    set: MutationSet,
    session: u32,
    stats: &MemoryStats,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    // Adds
    let add_texts: Vec<String> = set.adds.iter().map(|a| a.content.clone()).collect();
    let add_vectors = embed_each(embedder, &add_texts).await;
    for (proposed, vector) in set.adds.into_iter().zip(add_vectors) {
        match vector {
            Ok(embedding) => {
                let entry = MemoryEntry::new(
                    store.allocate_id(),
                    proposed.content,
                    embedding,
                    EntryMetadata::new(proposed.importance, session, Provenance::Conversation),
                );
                store.put(entry.clone());
                report.added.push(entry);
            }
            Err(err) => {
                stats.record_embedding_failure();
                tracing::warn!(error = %err, "skipping add: embedding failed");
                report.skipped.push(SkippedDirective {
                    kind: DirectiveKind::Add,
                    target: None,
                    content: Some(proposed.content),
                    reason: SkipReason::EmbeddingFailed(err),
                });
            }
        }
    }

    // Updates: only targets present in the store are embedded.
    let mut updates = Vec::with_capacity(set.updates.len());
    for update in set.updates {
        if store.contains(update.target_id.as_str()) {
            updates.push(update);
        } else {
            stats.record_unknown_id();
            tracing::debug!(target_id = %update.target_id, "ignoring update of unknown entry");
            report.skipped.push(SkippedDirective {
                kind: DirectiveKind::Update,
                target: Some(update.target_id),
                content: Some(update.new_content),
                reason: SkipReason::UnknownId,
            });
        }
    }
    let update_texts: Vec<String> = updates.iter().map(|u| u.new_content.clone()).collect();
    let update_vectors = embed_each(embedder, &update_texts).await;
    for (update, vector) in updates.into_iter().zip(update_vectors) {
        let embedding = match vector {
            Ok(embedding) => embedding,
            Err(err) => {
                stats.record_embedding_failure();
                tracing::warn!(
                    target_id = %update.target_id,
                    error = %err,
                    "skipping update: embedding failed"
                );
                report.skipped.push(SkippedDirective {
                    kind: DirectiveKind::Update,
                    target: Some(update.target_id),
                    content: Some(update.new_content),
                    reason: SkipReason::EmbeddingFailed(err),
                });
                continue;
            }
        };
        match store.replace_content(
            update.target_id.as_str(),
            update.new_content.clone(),
            embedding,
            session,
            update.reason,
        ) {
            Ok(entry) => report.updated.push(entry.clone()),
            Err(_) => {
                stats.record_unknown_id();
                report.skipped.push(SkippedDirective {
                    kind: DirectiveKind::Update,
                    target: Some(update.target_id),
                    content: Some(update.new_content),
                    reason: SkipReason::UnknownId,
                });
            }
        }
    }

    // Deletes
    for delete in set.deletes {
        match store.delete(delete.target_id.as_str()) {
            Some(_) => report.deleted.push(delete.target_id),
            None => {
                stats.record_unknown_id();
                tracing::debug!(target_id = %delete.target_id, "ignoring delete of unknown entry");
                report.skipped.push(SkippedDirective {
                    kind: DirectiveKind::Delete,
                    target: Some(delete.target_id),
                    content: None,
                    reason: SkipReason::UnknownId,
                });
            }
        }
    }

    stats.record_added(report.added.len() as u64);
    stats.record_updated(report.updated.len() as u64);
    stats.record_deleted(report.deleted.len() as u64);
    report
}
