//! Per-store atomic counters for cost and behaviour analysis.
//!
//! Counters are incremented silently at the call site and never feed back
//! into control flow. Call [`MemoryStats::flush`] to emit current values as
//! a single `tracing::info!` event (e.g. at the end of a session).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::oracle::TokenUsage;

/// Lightweight atomic counters. No allocations and no locking.
#[derive(Debug, Default)]
pub struct MemoryStats {
    entries_added: AtomicU64,
    entries_updated: AtomicU64,
    entries_deleted: AtomicU64,
    oracle_calls: AtomicU64,
    oracle_failures: AtomicU64,
    parse_failures: AtomicU64,
    embedding_failures: AtomicU64,
    unknown_id_references: AtomicU64,
    directives_suppressed: AtomicU64,
    consolidations: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

/// Point-in-time copy of [`MemoryStats`], plus the store size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_entries: usize,
    pub entries_added: u64,
    pub entries_updated: u64,
    pub entries_deleted: u64,
    pub oracle_calls: u64,
    pub oracle_failures: u64,
    pub parse_failures: u64,
    pub embedding_failures: u64,
    pub unknown_id_references: u64,
    pub directives_suppressed: u64,
    pub consolidations: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_added(&self, n: u64) {
        bump(&self.entries_added, n);
    }

    pub fn record_updated(&self, n: u64) {
        bump(&self.entries_updated, n);
    }

    pub fn record_deleted(&self, n: u64) {
        bump(&self.entries_deleted, n);
    }

    /// Count one oracle call and its token usage, if reported.
    pub fn record_oracle_call(&self, usage: Option<TokenUsage>) {
        bump(&self.oracle_calls, 1);
        if let Some(usage) = usage {
            bump(&self.input_tokens, usage.input_tokens);
            bump(&self.output_tokens, usage.output_tokens);
        }
        tracing::trace!(metric = "oracle_calls", "counter incremented");
    }

    /// Count an oracle call that failed (transport, timeout, cancellation).
    pub fn record_oracle_failure(&self) {
        bump(&self.oracle_calls, 1);
        bump(&self.oracle_failures, 1);
    }

    pub fn record_parse_failure(&self) {
        bump(&self.parse_failures, 1);
    }

    pub fn record_embedding_failure(&self) {
        bump(&self.embedding_failures, 1);
    }

    pub fn record_unknown_id(&self) {
        bump(&self.unknown_id_references, 1);
    }

    pub fn record_suppressed(&self, n: u64) {
        bump(&self.directives_suppressed, n);
    }

    pub fn record_consolidation(&self) {
        bump(&self.consolidations, 1);
    }

    /// Copy all counters; `total_entries` is supplied by the caller.
    pub fn snapshot(&self, total_entries: usize) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            total_entries,
            entries_added: load(&self.entries_added),
            entries_updated: load(&self.entries_updated),
            entries_deleted: load(&self.entries_deleted),
            oracle_calls: load(&self.oracle_calls),
            oracle_failures: load(&self.oracle_failures),
            parse_failures: load(&self.parse_failures),
            embedding_failures: load(&self.embedding_failures),
            unknown_id_references: load(&self.unknown_id_references),
            directives_suppressed: load(&self.directives_suppressed),
            consolidations: load(&self.consolidations),
            total_input_tokens: load(&self.input_tokens),
            total_output_tokens: load(&self.output_tokens),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self, user_id: &str, total_entries: usize) {
        let s = self.snapshot(total_entries);
        tracing::info!(
            metric = "flush",
            user_id = %user_id,
            total_entries = s.total_entries,
            entries_added = s.entries_added,
            entries_updated = s.entries_updated,
            entries_deleted = s.entries_deleted,
            oracle_calls = s.oracle_calls,
            oracle_failures = s.oracle_failures,
            parse_failures = s.parse_failures,
            input_tokens = s.total_input_tokens,
            output_tokens = s.total_output_tokens,
        );
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.entries_added,
            &self.entries_updated,
            &self.entries_deleted,
            &self.oracle_calls,
            &self.oracle_failures,
            &self.parse_failures,
            &self.embedding_failures,
            &self.unknown_id_references,
            &self.directives_suppressed,
            &self.consolidations,
            &self.input_tokens,
            &self.output_tokens,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let s = MemoryStats::new();
        s.record_added(3);
        s.record_updated(1);
        s.record_oracle_call(Some(TokenUsage {
            input_tokens: 120,
            output_tokens: 40,
        }));
        s.record_oracle_call(None);
        s.record_oracle_failure();

        let snap = s.snapshot(7);
        assert_eq!(snap.total_entries, 7);
        assert_eq!(snap.entries_added, 3);
        assert_eq!(snap.entries_updated, 1);
        assert_eq!(snap.oracle_calls, 3);
        assert_eq!(snap.oracle_failures, 1);
        assert_eq!(snap.total_input_tokens, 120);
        assert_eq!(snap.total_output_tokens, 40);
    }

    #[test]
    fn reset_zeroes_all() {
        let s = MemoryStats::new();
        s.record_added(1);
        s.record_parse_failure();
        s.record_consolidation();
        s.reset();
        assert_eq!(s.snapshot(0), StatsSnapshot::default());
    }
}
