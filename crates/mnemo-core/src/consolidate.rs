//! Consolidation: oracle-planned merging and pruning of the whole store.
//!
//! The oracle sees every entry and answers with a [`ConsolidationPlan`].
//! Merges are applied first, then deletes. Ids listed in `keep` are never
//! removed, whether a merge or a delete names them. All merged contents are
//! embedded in one batch before the store is touched; an unparsable plan or a
//! failed oracle call leaves the store exactly as it was.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::entry::{EntryId, EntryMetadata, Importance, MemoryEntry, Provenance};
use crate::obs;
use crate::oracle::{embed_each, EmbeddingOracle, ReasoningOracle};
use crate::planner::{consolidation_prompt, decode_json, ParseOutcome};
use crate::stats::MemoryStats;
use crate::store::MemoryStore;

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Several entries to be replaced by one synthesized entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeGroup {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_ids: Vec<EntryId>,
    #[serde(default)]
    pub merged_content: String,
}

/// The oracle's consolidation decision.
///
/// Ids named in none of the three lists are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationPlan {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keep: Vec<EntryId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub merge: Vec<MergeGroup>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub delete: Vec<EntryId>,
}

/// How a consolidation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    Applied,
    ParseFailed,
    OracleFailed,
}

/// One merge that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMerge {
    pub new_id: EntryId,
    pub removed: Vec<EntryId>,
}

/// One merge group that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMerge {
    pub source_ids: Vec<EntryId>,
    pub reason: String,
}

/// Result of a consolidation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    pub status: ConsolidationStatus,
    pub before: usize,
    pub after: usize,
    pub merged: Vec<AppliedMerge>,
    pub deleted: Vec<EntryId>,
    pub skipped_merges: Vec<SkippedMerge>,
    /// Deletes refused because the same id was also listed in `keep`.
    pub kept_over_delete: Vec<EntryId>,
    /// Merge sources left in place because they were also listed in `keep`.
    pub kept_over_merge: Vec<EntryId>,
}

impl ConsolidationReport {
    fn unchanged(status: ConsolidationStatus, len: usize) -> Self {
        Self {
            status,
            before: len,
            after: len,
            merged: Vec::new(),
            deleted: Vec::new(),
            skipped_merges: Vec::new(),
            kept_over_delete: Vec::new(),
            kept_over_merge: Vec::new(),
        }
    }

    pub fn removed_count(&self) -> usize {
        self.before - self.after
    }
}

/// Runs consolidation against a reasoning oracle.
#[derive(Clone)]
pub struct Consolidator {
    oracle: Arc<dyn ReasoningOracle>,
    embedder: Arc<dyn EmbeddingOracle>,
}

impl Consolidator {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, embedder: Arc<dyn EmbeddingOracle>) -> Self {
        Self { oracle, embedder }
    }

    /// Ask the oracle for a plan over the full store and apply it.
    pub async fn run(
        &self,
        store: &mut MemoryStore,
        session: u32,
        stats: &MemoryStats,
    ) -> ConsolidationReport {
        let before = store.len();
        if store.is_empty() {
            return ConsolidationReport::unchanged(ConsolidationStatus::Applied, 0);
        }

        let prompt = consolidation_prompt(&store.snapshot());
        let completion = match self.oracle.complete(&prompt).await {
            Ok(completion) => completion,
            Err(err) => {
                stats.record_oracle_failure();
                obs::emit_oracle_failure("consolidation", session, &err);
                return ConsolidationReport::unchanged(ConsolidationStatus::OracleFailed, before);
            }
        };
        stats.record_oracle_call(completion.usage);

        let plan = match decode_json::<ConsolidationPlan>(&completion.text) {
            ParseOutcome::Parsed(plan) => plan,
            ParseOutcome::ParseFailed(raw) => {
                stats.record_parse_failure();
                obs::emit_parse_failure("consolidation", session, &raw);
                return ConsolidationReport::unchanged(ConsolidationStatus::ParseFailed, before);
            }
        };

        let report = self.apply_plan(store, plan, session).await;
        stats.record_consolidation();
        stats.record_deleted(report.deleted.len() as u64);
        obs::emit_consolidation_finished(
            report.before,
            report.after,
            report.merged.len(),
            report.deleted.len(),
        );
        report
    }

    /// Apply an already-decoded plan. Merges first, then deletes.
    pub async fn apply_plan(
        &self,
        store: &mut MemoryStore,
        plan: ConsolidationPlan,
        session: u32,
    ) -> ConsolidationReport {
        let mut report = ConsolidationReport::unchanged(ConsolidationStatus::Applied, store.len());
        let keep: HashSet<EntryId> = plan.keep.into_iter().collect();

        let mut groups = Vec::with_capacity(plan.merge.len());
        for group in plan.merge {
            let mut seen = HashSet::new();
            let sources: Vec<EntryId> = group
                .source_ids
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect();
            let content = group.merged_content.trim().to_string();
            if sources.is_empty() || content.is_empty() {
                report.skipped_merges.push(SkippedMerge {
                    source_ids: sources,
                    reason: "merge group needs source ids and merged content".to_string(),
                });
                continue;
            }
            groups.push((sources, content));
        }

        // Embed every merged content before mutating anything.
        let texts: Vec<String> = groups.iter().map(|(_, content)| content.clone()).collect();
        let vectors = embed_each(self.embedder.as_ref(), &texts).await;

        for ((sources, content), vector) in groups.into_iter().zip(vectors) {
            let embedding = match vector {
                Ok(embedding) => embedding,
                Err(err) => {
                    report.skipped_merges.push(SkippedMerge {
                        source_ids: sources,
                        reason: format!("embedding failed: {err}"),
                    });
                    continue;
                }
            };

            let mut present = Vec::with_capacity(sources.len());
            for id in &sources {
                if !store.contains(id.as_str()) {
                    continue;
                }
                if keep.contains(id) {
                    report.kept_over_merge.push(id.clone());
                } else {
                    present.push(id.clone());
                }
            }
            if present.is_empty() {
                report.skipped_merges.push(SkippedMerge {
                    source_ids: sources,
                    reason: "no mergeable source entry is present".to_string(),
                });
                continue;
            }

            for id in &present {
                store.delete(id.as_str());
            }
            let new_id = store.allocate_id();
            let metadata = EntryMetadata::new(Importance::High, session, Provenance::Consolidation)
                .with_merged_from(present.clone());
            store.put(MemoryEntry::new(new_id.clone(), content, embedding, metadata));
            report.merged.push(AppliedMerge {
                new_id,
                removed: present,
            });
        }

        for id in plan.delete {
            if keep.contains(&id) {
                report.kept_over_delete.push(id);
                continue;
            }
            if store.delete(id.as_str()).is_some() {
                report.deleted.push(id);
            }
        }

        report.after = store.len();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingEmbedder, FailingOracle, HashEmbedder, ScriptedOracle};

    fn store_with(ids: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for id in ids {
            let content = format!("fact {id}");
            store.put(MemoryEntry::new(
                (*id).into(),
                content.clone(),
                HashEmbedder::vector_for(&content),
                EntryMetadata::new(Importance::Medium, 1, Provenance::Conversation),
            ));
        }
        store
    }

    fn consolidator(reply: &str) -> Consolidator {
        Consolidator::new(
            Arc::new(ScriptedOracle::with_replies([reply])),
            Arc::new(HashEmbedder::new()),
        )
    }

    #[test]
    fn test_plan_decodes_with_nulls_and_missing_keys() {
        let plan = decode_json::<ConsolidationPlan>(r#"{"keep": null, "merge": [{"source_ids": ["a"], "merged_content": "x"}]}"#)
            .parsed()
            .unwrap();
        assert!(plan.keep.is_empty());
        assert!(plan.delete.is_empty());
        assert_eq!(plan.merge[0].source_ids, vec![EntryId::from("a")]);
    }

    #[tokio::test]
    async fn test_merge_then_delete() {
        let mut store = store_with(&["a", "b", "c", "d"]);
        let stats = MemoryStats::new();
        let c = consolidator(
            r#"{"keep": ["d"], "merge": [{"source_ids": ["a", "b"], "merged_content": "a and b"}], "delete": ["c"]}"#,
        );

        let report = c.run(&mut store, 4, &stats).await;

        assert_eq!(report.status, ConsolidationStatus::Applied);
        assert_eq!(report.before, 4);
        assert_eq!(report.after, 2);
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.deleted, vec![EntryId::from("c")]);

        let merged = store.get(report.merged[0].new_id.as_str()).unwrap();
        assert_eq!(merged.content(), "a and b");
        assert_eq!(merged.metadata.provenance, Provenance::Consolidation);
        assert_eq!(merged.metadata.importance, Importance::High);
        assert_eq!(merged.metadata.merged_from.len(), 2);
        assert!(store.contains("d"));
        assert_eq!(stats.snapshot(store.len()).consolidations, 1);
    }

    #[tokio::test]
    async fn test_unlisted_ids_are_preserved() {
        let mut store = store_with(&["a", "b", "c"]);
        let c = consolidator(r#"{"keep": [], "merge": [], "delete": ["a"]}"#);

        let report = c.run(&mut store, 2, &MemoryStats::new()).await;

        assert_eq!(report.after, 2);
        assert!(store.contains("b"));
        assert!(store.contains("c"));
    }

    #[tokio::test]
    async fn test_keep_wins_over_delete() {
        let mut store = store_with(&["a", "b"]);
        let c = consolidator(r#"{"keep": ["a"], "delete": ["a", "b"]}"#);

        let report = c.run(&mut store, 2, &MemoryStats::new()).await;

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert_eq!(report.kept_over_delete, vec![EntryId::from("a")]);
    }

    #[tokio::test]
    async fn test_unparsable_plan_is_strict_noop() {
        let mut store = store_with(&["a", "b"]);
        let before = store.snapshot();
        let stats = MemoryStats::new();
        let c = consolidator("Let me think about merging a and b...");

        let report = c.run(&mut store, 2, &stats).await;

        assert_eq!(report.status, ConsolidationStatus::ParseFailed);
        assert_eq!(store.snapshot(), before);
        assert_eq!(stats.snapshot(2).parse_failures, 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_noop() {
        let mut store = store_with(&["a", "b"]);
        let before = store.snapshot();
        let c = Consolidator::new(Arc::new(FailingOracle::new()), Arc::new(HashEmbedder::new()));

        let report = c.run(&mut store, 2, &MemoryStats::new()).await;

        assert_eq!(report.status, ConsolidationStatus::OracleFailed);
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_failed_merge_embedding_keeps_sources() {
        let mut store = store_with(&["a", "b", "c"]);
        let embedder = Arc::new(FailingEmbedder::new("POISON"));
        let c = Consolidator::new(
            Arc::new(ScriptedOracle::with_replies([
                r#"{"merge": [{"source_ids": ["a", "b"], "merged_content": "POISON merge"}, {"source_ids": ["b", "c"], "merged_content": "b and c"}], "delete": ["c"]}"#,
            ])),
            embedder.clone(),
        );

        let report = c.run(&mut store, 2, &MemoryStats::new()).await;

        // One batch for all merges; its failure skips every group.
        assert_eq!(embedder.calls(), 1);
        assert_eq!(report.skipped_merges.len(), 2);
        assert!(report.merged.is_empty());
        assert!(store.contains("a"));
        assert!(store.contains("b"));
        assert!(!store.contains("c"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_of_absent_sources_is_skipped() {
        let mut store = store_with(&["a", "b"]);
        let c = consolidator(
            r#"{"merge": [{"source_ids": ["a", "b"], "merged_content": "ab"}, {"source_ids": ["a", "zz"], "merged_content": "again"}, {"source_ids": [], "merged_content": "nothing"}]}"#,
        );

        let report = c.run(&mut store, 2, &MemoryStats::new()).await;

        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.skipped_merges.len(), 2);
        assert_eq!(store.len(), 1);
        assert!(report.after <= report.before);
    }

    #[tokio::test]
    async fn test_kept_ids_are_not_merged_away() {
        let mut store = store_with(&["a", "b", "c", "d"]);
        let c = consolidator(
            r#"{"keep": ["a", "c"], "merge": [{"source_ids": ["a", "b"], "merged_content": "ab"}, {"source_ids": ["c"], "merged_content": "just c"}]}"#,
        );

        let report = c.run(&mut store, 2, &MemoryStats::new()).await;

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.merged[0].removed, vec![EntryId::from("b")]);
        assert_eq!(report.skipped_merges.len(), 1);
        assert_eq!(
            report.kept_over_merge,
            vec![EntryId::from("a"), EntryId::from("c")]
        );
        assert_eq!(store.len(), 4);
    }
}
