//! Error types for the HTTP oracles

use mnemo_core::MemoryError;
use thiserror::Error;

/// Errors raised while talking to an OpenAI-compatible endpoint.
#[derive(Error, Debug)]
pub enum OracleHttpError {
    /// No API key configured
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    /// Request did not complete within the configured timeout
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Connection or protocol failure
    #[error("HTTP error: {0}")]
    Transport(String),

    /// Non-2xx response
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for HTTP oracle operations
pub type Result<T> = std::result::Result<T, OracleHttpError>;

impl OracleHttpError {
    /// Map a failed chat call into the engine's error taxonomy.
    pub fn into_reasoning_error(self) -> MemoryError {
        match self {
            Self::Timeout(seconds) => MemoryError::OracleTimeout { seconds },
            other => MemoryError::OracleUnavailable(other.to_string()),
        }
    }

    /// Map a failed embeddings call into the engine's error taxonomy.
    pub fn into_embedding_error(self) -> MemoryError {
        MemoryError::Embedding(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_oracle_timeout() {
        let err = OracleHttpError::Timeout(30).into_reasoning_error();
        assert!(matches!(err, MemoryError::OracleTimeout { seconds: 30 }));
        assert!(err.is_oracle_failure());
    }

    #[test]
    fn test_status_maps_to_unavailable() {
        let err = OracleHttpError::Status {
            status: 429,
            body: "rate limited".to_string(),
        }
        .into_reasoning_error();
        match err {
            MemoryError::OracleUnavailable(msg) => assert!(msg.contains("429")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_embedding_errors_are_embedding_failures() {
        let err = OracleHttpError::MissingApiKey.into_embedding_error();
        assert!(err.is_embedding_failure());
    }
}
