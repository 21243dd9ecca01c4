//! Flat cosine-similarity search over the entries of a [`MemoryStore`].

use crate::entry::MemoryEntry;
use crate::error::MemoryResult;
use crate::oracle::EmbeddingOracle;
use crate::store::MemoryStore;

/// Cosine similarity of two vectors. Mismatched lengths or a zero-norm
/// vector yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A search hit with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: MemoryEntry,
    pub score: f32,
}

/// Rank store entries against an already-embedded query.
///
/// Descending by score; equal scores keep insertion order (stable sort).
pub fn rank(store: &MemoryStore, query: &[f32], k: usize) -> Vec<ScoredEntry> {
    let mut scored: Vec<(f32, &MemoryEntry)> = store
        .list_all()
        .map(|e| (cosine_similarity(query, e.embedding()), e))
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored
        .into_iter()
        .take(k)
        .map(|(score, entry)| ScoredEntry {
            entry: entry.clone(),
            score,
        })
        .collect()
}

/// Embed `query` and return the top `k` entries with scores.
///
/// An empty store or `k == 0` returns immediately without calling the oracle.
pub async fn search_scored(
    store: &MemoryStore,
    embedder: &dyn EmbeddingOracle,
    query: &str,
    k: usize,
) -> MemoryResult<Vec<ScoredEntry>> {
    if store.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let query_vec = embedder.embed(query).await?;
    Ok(rank(store, &query_vec, k))
}

/// Embed `query` and return the top `k` entries.
pub async fn search(
    store: &MemoryStore,
    embedder: &dyn EmbeddingOracle,
    query: &str,
    k: usize,
) -> MemoryResult<Vec<MemoryEntry>> {
    Ok(search_scored(store, embedder, query, k)
        .await?
        .into_iter()
        .map(|hit| hit.entry)
        .collect())
}
