//! Endpoint configuration, read from the environment.

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_BASE: &str = "OPENAI_API_BASE";
pub const ENV_CHAT_MODEL: &str = "LLM_MODEL";
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "MNEMO_ORACLE_TIMEOUT_SECS";

/// OpenAI-compatible endpoint settings
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL, without a trailing slash
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAiConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset or blank values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(base) = get(ENV_API_BASE) {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        config.api_key = get(ENV_API_KEY);
        if let Some(model) = get(ENV_CHAT_MODEL) {
            config.chat_model = model;
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            config.embedding_model = model;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            match raw.trim().parse() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_TIMEOUT_SECS,
                    "ignoring invalid {}",
                    ENV_TIMEOUT_SECS
                ),
            }
        }
        config
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_chat_model(mut self, model: &str) -> Self {
        self.chat_model = model.to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.api_base)
    }
}
