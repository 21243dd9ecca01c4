//! In-memory oracle fakes (testing only)
//!
//! Provides `ScriptedOracle`, `FnOracle`, `FailingOracle`, `HashEmbedder` and
//! `FailingEmbedder`, which satisfy the oracle traits without any network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{MemoryError, MemoryResult};
use crate::oracle::{Completion, EmbeddingOracle, ReasoningOracle};

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

/// Reasoning oracle that replays a queue of canned replies and records prompts.
///
/// When the queue runs dry it answers with `fallback` (an empty memory-ops
/// reply by default).
#[derive(Debug)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
    fallback: String,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            fallback: r#"{"memory_ops": {"add": [], "update": [], "delete": []}}"#.to_string(),
        }
    }
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of replies, consumed in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let oracle = Self::new();
        for reply in replies {
            oracle.push_reply(reply);
        }
        oracle
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted::Reply(reply.into()));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted::Fail(message.into()));
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> MemoryResult<Completion> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Scripted::Reply(text)) => {
                let input_tokens = prompt.split_whitespace().count() as u64;
                let output_tokens = text.split_whitespace().count() as u64;
                Ok(Completion::text(text).with_usage(input_tokens, output_tokens))
            }
            Some(Scripted::Fail(message)) => Err(MemoryError::OracleUnavailable(message)),
            None => Ok(Completion::text(self.fallback.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// FnOracle
// ---------------------------------------------------------------------------

/// Reasoning oracle computed by a closure over the prompt.
pub struct FnOracle<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> FnOracle<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<F> ReasoningOracle for FnOracle<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    async fn complete(&self, prompt: &str) -> MemoryResult<Completion> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(Completion::text((self.respond)(prompt)))
    }
}

// ---------------------------------------------------------------------------
// FailingOracle
// ---------------------------------------------------------------------------

/// Reasoning oracle whose every call times out.
#[derive(Debug, Default)]
pub struct FailingOracle {
    calls: AtomicUsize,
}

impl FailingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReasoningOracle for FailingOracle {
    async fn complete(&self, _prompt: &str) -> MemoryResult<Completion> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(MemoryError::OracleTimeout { seconds: 30 })
    }
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

const HASH_DIMENSIONS: usize = 256;

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of 256
/// buckets, so texts sharing words have positive cosine similarity.
#[derive(Debug, Default)]
pub struct HashEmbedder {
    batch_calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed_batch` calls made.
    pub fn calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    /// Total number of texts embedded across all calls.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::Relaxed)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASH_DIMENSIONS];
        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % HASH_DIMENSIONS as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingOracle for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        self.texts_embedded.fetch_add(texts.len(), Ordering::Relaxed);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// FailingEmbedder
// ---------------------------------------------------------------------------

/// Embedder that fails for any text containing `poison`; other texts embed
/// like [`HashEmbedder`]. A batch containing a poisoned text fails as a whole.
#[derive(Debug)]
pub struct FailingEmbedder {
    poison: String,
    inner: HashEmbedder,
}

impl FailingEmbedder {
    pub fn new(poison: impl Into<String>) -> Self {
        Self {
            poison: poison.into(),
            inner: HashEmbedder::new(),
        }
    }

    /// Embedder that fails on every call.
    pub fn always() -> Self {
        Self::new("")
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl EmbeddingOracle for FailingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(&self.poison)) {
            self.inner.batch_calls.fetch_add(1, Ordering::Relaxed);
            return Err(MemoryError::Embedding(format!(
                "refusing to embed text containing {:?}",
                self.poison
            )));
        }
        self.inner.embed_batch(texts).await
    }
}
