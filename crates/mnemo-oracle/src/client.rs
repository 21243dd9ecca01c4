//! OpenAI-compatible client implementing both oracle traits.

use std::time::Duration;

use async_trait::async_trait;
use mnemo_core::{Completion, EmbeddingOracle, MemoryResult, ReasoningOracle};
use serde::Serialize;
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::error::{OracleHttpError, Result};
use crate::wire::{
    build_chat_body, build_embeddings_body, parse_chat_response, parse_embeddings_response,
};

/// HTTP client for chat completions and embeddings.
///
/// Each call is attempted once; failures are returned to the engine, which
/// treats them as "no change" for the affected turn.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("mnemo-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| OracleHttpError::Transport(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(OracleHttpError::MissingApiKey)?;

        let response = self
            .http_client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(OracleHttpError::Status {
                status: status.as_u16(),
                body: text.chars().take(240).collect(),
            });
        }
        Ok(text)
    }

    fn transport_error(&self, error: reqwest::Error) -> OracleHttpError {
        if error.is_timeout() {
            OracleHttpError::Timeout(self.config.timeout_secs)
        } else {
            OracleHttpError::Transport(error.to_string())
        }
    }

    async fn chat(&self, prompt: &str) -> Result<Completion> {
        let body = build_chat_body(&self.config.chat_model, self.config.max_tokens, prompt);
        let text = self.post_json(&self.config.chat_url(), &body).await?;
        let completion = parse_chat_response(&text)?;
        debug!(
            model = %self.config.chat_model,
            prompt_chars = prompt.len(),
            reply_chars = completion.text.len(),
            "chat completion received"
        );
        Ok(completion)
    }

    async fn embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = build_embeddings_body(&self.config.embedding_model, texts);
        let text = self.post_json(&self.config.embeddings_url(), &body).await?;
        let vectors = parse_embeddings_response(&text, texts.len())?;
        debug!(
            model = %self.config.embedding_model,
            count = vectors.len(),
            "embeddings received"
        );
        Ok(vectors)
    }
}

#[async_trait]
impl ReasoningOracle for OpenAiClient {
    async fn complete(&self, prompt: &str) -> MemoryResult<Completion> {
        self.chat(prompt)
            .await
            .map_err(OracleHttpError::into_reasoning_error)
    }
}

#[async_trait]
impl EmbeddingOracle for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        self.embeddings(texts)
            .await
            .map_err(OracleHttpError::into_embedding_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::MemoryError;

    fn keyless_client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig::default().with_api_base("http://127.0.0.1:9")).unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_is_oracle_unavailable() {
        let err = keyless_client().complete("hi").await.unwrap_err();
        match err {
            MemoryError::OracleUnavailable(msg) => assert!(msg.contains("OPENAI_API_KEY")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_embedding_failure() {
        let err = keyless_client()
            .embed_batch(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_embedding_failure());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_the_network() {
        let vectors = keyless_client().embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
