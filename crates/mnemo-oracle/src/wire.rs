//! Request and response bodies for the chat-completions and embeddings APIs.

use mnemo_core::Completion;
use serde::{Deserialize, Serialize};

use crate::error::{OracleHttpError, Result};

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage<'a>>,
}

/// Single user message carrying the whole prompt.
pub fn build_chat_body<'a>(model: &'a str, max_tokens: u32, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        max_tokens,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Text of the first choice plus token usage when reported.
pub fn parse_chat_response(body: &str) -> Result<Completion> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OracleHttpError::Decode("response has no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();
    let completion = Completion::text(text);
    Ok(match response.usage {
        Some(usage) => completion.with_usage(usage.prompt_tokens, usage.completion_tokens),
        None => completion,
    })
}

#[derive(Debug, Serialize)]
pub struct EmbeddingsRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

pub fn build_embeddings_body<'a>(model: &'a str, input: &'a [String]) -> EmbeddingsRequest<'a> {
    EmbeddingsRequest { model, input }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Vectors in input order, regardless of the order the server listed them.
pub fn parse_embeddings_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingsResponse = serde_json::from_str(body)?;
    if response.data.len() != expected {
        return Err(OracleHttpError::Decode(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }
    response.data.sort_by_key(|item| item.index);
    if response
        .data
        .iter()
        .enumerate()
        .any(|(position, item)| item.index != position)
    {
        return Err(OracleHttpError::Decode(
            "embedding indices are not 0..n".to_string(),
        ));
    }
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}
