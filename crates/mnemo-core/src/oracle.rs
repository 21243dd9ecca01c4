//! Oracle traits: the reasoning service and the embedding service.
//!
//! Both are injected as trait objects so an engine can run against a real
//! HTTP adapter or an in-memory fake. Calls are all-or-nothing: an oracle
//! either returns a complete result or an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Token accounting reported by a reasoning oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Raw text returned by a reasoning oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = Some(TokenUsage {
            input_tokens,
            output_tokens,
        });
        self
    }
}

/// Stateless text-completion service.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> MemoryResult<Completion>;
}

/// Text-to-vector service. Similarity over its output is cosine.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Embed many texts in one call. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            actual => Err(MemoryError::EmbeddingCountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}

/// Embed `texts` in one batch call, checking the oracle returned one vector per text.
pub async fn embed_checked(
    embedder: &dyn EmbeddingOracle,
    texts: &[String],
) -> MemoryResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = embedder.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(MemoryError::EmbeddingCountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Embed `texts` with a single batch call, one result per text.
///
/// A failed batch is not re-sent: every text in it gets the batch's error.
pub async fn embed_each(
    embedder: &dyn EmbeddingOracle,
    texts: &[String],
) -> Vec<Result<Vec<f32>, String>> {
    match embed_checked(embedder, texts).await {
        Ok(vectors) => vectors.into_iter().map(Ok).collect(),
        Err(batch_err) => {
            tracing::debug!(error = %batch_err, count = texts.len(), "batch embedding failed");
            vec![Err(batch_err.to_string()); texts.len()]
        }
    }
}
