//! `AgentMemory`: one user's memory store driven by the reasoning oracle.
//!
//! Sessions are ingested turn by turn. For every user turn the engine
//! retrieves the entries most similar to that utterance, asks the planner for
//! mutations, filters them through the policy, and applies them before the
//! next turn is looked at. After the session, the store is consolidated if it
//! has grown past the configured threshold.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;

use crate::apply::{apply_mutations, SkippedDirective};
use crate::config::EngineConfig;
use crate::consolidate::{ConsolidationReport, Consolidator};
use crate::entry::MemoryEntry;
use crate::error::MemoryResult;
use crate::index::{search_scored, ScoredEntry};
use crate::obs::{self, session_span};
use crate::oracle::{EmbeddingOracle, ReasoningOracle};
use crate::planner::{MemoryView, MutationPlanner, PlanRequest, PlanStatus};
use crate::policy::PolicyVariant;
use crate::stats::{MemoryStats, StatsSnapshot};
use crate::store::MemoryStore;
use crate::turn::{strip_placeholders, Turn};

/// How one user turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The planner answered and its mutations were applied.
    Applied,
    ParseFailed,
    OracleFailed,
    /// The utterance could not be embedded for retrieval.
    RetrievalFailed,
}

impl From<PlanStatus> for TurnStatus {
    fn from(status: PlanStatus) -> Self {
        match status {
            PlanStatus::Parsed => Self::Applied,
            PlanStatus::ParseFailed => Self::ParseFailed,
            PlanStatus::OracleFailed => Self::OracleFailed,
        }
    }
}

/// Per-turn summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// Position of the turn in the session after placeholder removal.
    pub turn_index: usize,
    pub status: TurnStatus,
    pub retrieved: usize,
    pub suppressed: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl TurnOutcome {
    fn without_changes(turn_index: usize, status: TurnStatus, retrieved: usize) -> Self {
        Self {
            turn_index,
            status,
            retrieved,
            suppressed: 0,
            added: 0,
            updated: 0,
            deleted: 0,
        }
    }
}

/// Everything one call to [`AgentMemory::ingest_session`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub session: u32,
    /// Entries created or modified, in the state they were last written.
    pub touched: Vec<MemoryEntry>,
    /// Free-text replies the oracle produced alongside its mutations.
    pub replies: Vec<String>,
    pub turns: Vec<TurnOutcome>,
    pub skipped: Vec<SkippedDirective>,
    pub consolidation: Option<ConsolidationReport>,
}

impl IngestReport {
    fn new(session: u32) -> Self {
        Self {
            session,
            touched: Vec::new(),
            replies: Vec::new(),
            turns: Vec::new(),
            skipped: Vec::new(),
            consolidation: None,
        }
    }

    fn record_touched(&mut self, entry: MemoryEntry) {
        match self.touched.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => *slot = entry,
            None => self.touched.push(entry),
        }
    }
}

/// Memory engine for a single user.
pub struct AgentMemory {
    user_id: String,
    config: EngineConfig,
    store: MemoryStore,
    planner: MutationPlanner,
    consolidator: Consolidator,
    embedder: Arc<dyn EmbeddingOracle>,
    stats: MemoryStats,
    last_session: u32,
}

impl AgentMemory {
    pub fn new(
        user_id: impl Into<String>,
        config: EngineConfig,
        reasoning: Arc<dyn ReasoningOracle>,
        embedder: Arc<dyn EmbeddingOracle>,
    ) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self {
            user_id: user_id.into(),
            config,
            store: MemoryStore::new(),
            planner: MutationPlanner::new(reasoning.clone()),
            consolidator: Consolidator::new(reasoning, embedder.clone()),
            embedder,
            stats: MemoryStats::new(),
            last_session: 0,
        })
    }

    /// Engine with default settings and the policy of `variant`.
    pub fn for_variant(
        user_id: impl Into<String>,
        variant: PolicyVariant,
        reasoning: Arc<dyn ReasoningOracle>,
        embedder: Arc<dyn EmbeddingOracle>,
    ) -> MemoryResult<Self> {
        let config = EngineConfig::default().with_policy(variant.config());
        Self::new(user_id, config, reasoning, embedder)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Ingest one session's turns and return the created or modified entries.
    pub async fn ingest(&mut self, turns: &[Turn], session: u32) -> Vec<MemoryEntry> {
        self.ingest_session(turns, session).await.touched
    }

    /// Ingest one session's turns and report everything that happened.
    ///
    /// Never fails: oracle and parse failures degrade to "no change" for the
    /// affected turn and are counted in [`AgentMemory::stats`].
    pub async fn ingest_session(&mut self, turns: &[Turn], session: u32) -> IngestReport {
        let span = session_span(&self.user_id, session);
        self.run_session(turns, session).instrument(span).await
    }

    async fn run_session(&mut self, turns: &[Turn], session: u32) -> IngestReport {
        let started = Instant::now();
        let turns = strip_placeholders(turns, &self.config.placeholder_markers);
        obs::emit_session_started(&self.user_id, session, turns.len());

        self.last_session = session;
        let mut report = IngestReport::new(session);

        for (index, turn) in turns.iter().enumerate() {
            if !turn.is_user() {
                continue;
            }
            let outcome = self
                .ingest_turn(&turns[..=index], index, session, &mut report)
                .await;
            report.turns.push(outcome);
        }

        if self.config.consolidation_due(self.store.len()) {
            let consolidation = self
                .consolidator
                .run(&mut self.store, session, &self.stats)
                .await;
            // Entries merged away are no longer part of the result.
            report
                .touched
                .retain(|entry| self.store.contains(entry.id.as_str()));
            report.consolidation = Some(consolidation);
        }

        obs::emit_session_finished(
            &self.user_id,
            session,
            report.touched.len(),
            self.store.len(),
            started.elapsed().as_millis() as u64,
        );
        self.stats.flush(&self.user_id, self.store.len());
        report
    }

    async fn ingest_turn(
        &mut self,
        transcript: &[Turn],
        index: usize,
        session: u32,
        report: &mut IngestReport,
    ) -> TurnOutcome {
        let utterance = match transcript.last() {
            Some(turn) => turn.content.as_str(),
            None => return TurnOutcome::without_changes(index, TurnStatus::Applied, 0),
        };

        let retrieved: Vec<MemoryEntry> = if self.config.policy.feedback_enabled {
            match search_scored(
                &self.store,
                self.embedder.as_ref(),
                utterance,
                self.config.retrieval_k,
            )
            .await
            {
                Ok(hits) => hits.into_iter().map(|hit| hit.entry).collect(),
                Err(err) => {
                    self.stats.record_embedding_failure();
                    tracing::warn!(
                        session = session,
                        turn_index = index,
                        error = %err,
                        "retrieval failed; turn skipped"
                    );
                    return TurnOutcome::without_changes(index, TurnStatus::RetrievalFailed, 0);
                }
            }
        } else {
            Vec::new()
        };

        let view = if self.config.policy.feedback_enabled {
            MemoryView::Entries(&retrieved)
        } else {
            MemoryView::Hidden
        };
        let request = PlanRequest {
            view,
            transcript,
            session,
        };
        let plan = self.planner.plan(request, &self.stats).await;
        if let Some(reply) = plan.reply {
            report.replies.push(reply);
        }
        if plan.status != PlanStatus::Parsed {
            return TurnOutcome::without_changes(index, plan.status.into(), retrieved.len());
        }

        obs::emit_turn_planned(
            session,
            index,
            plan.mutations.adds.len(),
            plan.mutations.updates.len(),
            plan.mutations.deletes.len(),
        );
        let (mutations, suppressed) = self.config.policy.filter(plan.mutations);
        self.stats.record_suppressed(suppressed as u64);

        let applied = apply_mutations(
            &mut self.store,
            self.embedder.as_ref(),
            mutations,
            session,
            &self.stats,
        )
        .await;
        obs::emit_mutations_applied(
            session,
            applied.added.len(),
            applied.updated.len(),
            applied.deleted.len(),
            applied.skipped.len(),
        );

        let outcome = TurnOutcome {
            turn_index: index,
            status: TurnStatus::Applied,
            retrieved: retrieved.len(),
            suppressed,
            added: applied.added.len(),
            updated: applied.updated.len(),
            deleted: applied.deleted.len(),
        };
        for entry in applied.touched() {
            report.record_touched(entry);
        }
        report
            .touched
            .retain(|entry| !applied.deleted.contains(&entry.id));
        report.skipped.extend(applied.skipped);
        outcome
    }

    /// Top `k` entries most similar to `query`.
    pub async fn search(&self, query: &str, k: usize) -> MemoryResult<Vec<MemoryEntry>> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.entry)
            .collect())
    }

    /// Top `k` entries most similar to `query`, with scores.
    pub async fn search_scored(&self, query: &str, k: usize) -> MemoryResult<Vec<ScoredEntry>> {
        search_scored(&self.store, self.embedder.as_ref(), query, k).await
    }

    pub fn get(&self, id: &str) -> MemoryResult<&MemoryEntry> {
        self.store.get(id)
    }

    /// Every entry, oldest first.
    pub fn get_all(&self) -> Vec<MemoryEntry> {
        self.store.snapshot()
    }

    /// Consolidate now, regardless of the threshold and policy.
    pub async fn consolidate_now(&mut self) -> ConsolidationReport {
        let span = session_span(&self.user_id, self.last_session);
        self.consolidator
            .run(&mut self.store, self.last_session, &self.stats)
            .instrument(span)
            .await
    }

    /// Drop every entry and zero the counters.
    pub fn reset(&mut self) {
        self.store.clear();
        self.stats.reset();
        self.last_session = 0;
        tracing::info!(user_id = %self.user_id, "memory reset");
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.store.len())
    }
}

impl std::fmt::Debug for AgentMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentMemory")
            .field("user_id", &self.user_id)
            .field("config", &self.config)
            .field("entries", &self.store.len())
            .field("last_session", &self.last_session)
            .finish_non_exhaustive()
    }
}
