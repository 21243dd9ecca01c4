//! Thread-safe handle around an [`AgentMemory`].
//!
//! Every operation, reads included, takes the same async mutex, so callers
//! never observe a store with a mutation set half applied.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::consolidate::ConsolidationReport;
use crate::engine::{AgentMemory, IngestReport};
use crate::entry::MemoryEntry;
use crate::error::MemoryResult;
use crate::stats::StatsSnapshot;
use crate::turn::Turn;

/// Cloneable handle; clones share one engine.
#[derive(Clone)]
pub struct SharedAgentMemory {
    inner: Arc<Mutex<AgentMemory>>,
}

impl SharedAgentMemory {
    pub fn new(memory: AgentMemory) -> Self {
        Self {
            inner: Arc::new(Mutex::new(memory)),
        }
    }

    pub async fn ingest(&self, turns: &[Turn], session: u32) -> Vec<MemoryEntry> {
        self.inner.lock().await.ingest(turns, session).await
    }

    pub async fn ingest_session(&self, turns: &[Turn], session: u32) -> IngestReport {
        self.inner.lock().await.ingest_session(turns, session).await
    }

    pub async fn search(&self, query: &str, k: usize) -> MemoryResult<Vec<MemoryEntry>> {
        self.inner.lock().await.search(query, k).await
    }

    pub async fn get(&self, id: &str) -> MemoryResult<MemoryEntry> {
        self.inner.lock().await.get(id).cloned()
    }

    pub async fn get_all(&self) -> Vec<MemoryEntry> {
        self.inner.lock().await.get_all()
    }

    pub async fn consolidate_now(&self) -> ConsolidationReport {
        self.inner.lock().await.consolidate_now().await
    }

    pub async fn reset(&self) {
        self.inner.lock().await.reset();
    }

    pub async fn stats(&self) -> StatsSnapshot {
        self.inner.lock().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
