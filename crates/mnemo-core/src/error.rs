//! Error types for the memory engine.

/// Errors produced by memory operations and oracle adapters.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("entry not found: {id}")]
    EntryNotFound { id: String },

    #[error("reasoning oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("oracle call timed out after {seconds}s")]
    OracleTimeout { seconds: u64 },

    #[error("oracle call cancelled")]
    OracleCancelled,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding batch size mismatch: sent {expected} texts, got {actual} vectors")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// True for failures of the reasoning oracle (transport, timeout, cancellation).
    pub fn is_oracle_failure(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable(_) | Self::OracleTimeout { .. } | Self::OracleCancelled
        )
    }

    /// True for failures computing an embedding.
    pub fn is_embedding_failure(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::EmbeddingCountMismatch { .. }
        )
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_not_found_display() {
        let err = MemoryError::EntryNotFound { id: "ab12cd34".into() };
        assert_eq!(err.to_string(), "entry not found: ab12cd34");
    }

    #[test]
    fn test_failure_classification() {
        assert!(MemoryError::OracleTimeout { seconds: 30 }.is_oracle_failure());
        assert!(MemoryError::OracleCancelled.is_oracle_failure());
        assert!(!MemoryError::Embedding("boom".into()).is_oracle_failure());

        let mismatch = MemoryError::EmbeddingCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert!(mismatch.is_embedding_failure());
        assert!(mismatch.to_string().contains("sent 3 texts"));
    }
}
