//! Engine configuration: retrieval width, consolidation threshold, policy.
//!
//! Loadable from TOML and overridable from the environment:
//! - `MNEMO_RETRIEVAL_K`: entries retrieved per user turn
//! - `MNEMO_CONSOLIDATION_THRESHOLD`: entry count that triggers
//!   consolidation (`inf`, `infinite`, `none` or `off` disable it)

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};
use crate::policy::PolicyConfig;
use crate::turn::MEMORY_TEST_MARKER;

pub const DEFAULT_RETRIEVAL_K: usize = 5;
pub const DEFAULT_CONSOLIDATION_THRESHOLD: usize = 20;

pub const ENV_RETRIEVAL_K: &str = "MNEMO_RETRIEVAL_K";
pub const ENV_CONSOLIDATION_THRESHOLD: &str = "MNEMO_CONSOLIDATION_THRESHOLD";

/// Store size above which consolidation runs after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ThresholdRepr", into = "ThresholdRepr")]
pub enum ConsolidationThreshold {
    Entries(usize),
    Infinite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ThresholdRepr {
    Count(usize),
    Word(String),
}

impl TryFrom<ThresholdRepr> for ConsolidationThreshold {
    type Error = MemoryError;

    fn try_from(repr: ThresholdRepr) -> Result<Self, Self::Error> {
        match repr {
            ThresholdRepr::Count(n) => Ok(Self::Entries(n)),
            ThresholdRepr::Word(word) => word.parse(),
        }
    }
}

impl From<ConsolidationThreshold> for ThresholdRepr {
    fn from(t: ConsolidationThreshold) -> Self {
        match t {
            ConsolidationThreshold::Entries(n) => ThresholdRepr::Count(n),
            ConsolidationThreshold::Infinite => ThresholdRepr::Word("infinite".to_string()),
        }
    }
}

impl std::str::FromStr for ConsolidationThreshold {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "inf" | "infinite" | "infinity" | "none" | "off" | "disabled" => Ok(Self::Infinite),
            other => other.parse::<usize>().map(Self::Entries).map_err(|_| {
                MemoryError::InvalidConfig(format!("invalid consolidation threshold: {s}"))
            }),
        }
    }
}

impl std::fmt::Display for ConsolidationThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entries(n) => write!(f, "{n}"),
            Self::Infinite => write!(f, "infinite"),
        }
    }
}

impl ConsolidationThreshold {
    /// True when a store of `len` entries is over the threshold.
    pub fn exceeded_by(&self, len: usize) -> bool {
        match self {
            Self::Entries(n) => len > *n,
            Self::Infinite => false,
        }
    }
}

impl Default for ConsolidationThreshold {
    fn default() -> Self {
        Self::Entries(DEFAULT_CONSOLIDATION_THRESHOLD)
    }
}

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entries retrieved per user utterance for the planner.
    pub retrieval_k: usize,
    pub consolidation_threshold: ConsolidationThreshold,
    /// Turns containing any of these markers are dropped before ingestion.
    pub placeholder_markers: Vec<String>,
    pub policy: PolicyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval_k: DEFAULT_RETRIEVAL_K,
            consolidation_threshold: ConsolidationThreshold::default(),
            placeholder_markers: vec![MEMORY_TEST_MARKER.to_string()],
            policy: PolicyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> MemoryResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> MemoryResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| MemoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> MemoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RETRIEVAL_K) {
            self.retrieval_k = raw.trim().parse().map_err(|_| {
                MemoryError::InvalidConfig(format!(
                    "{ENV_RETRIEVAL_K} must be an integer, got {raw:?}"
                ))
            })?;
        }
        if let Some(raw) = lookup(ENV_CONSOLIDATION_THRESHOLD) {
            self.consolidation_threshold = raw.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    pub fn with_consolidation_threshold(mut self, threshold: ConsolidationThreshold) -> Self {
        self.consolidation_threshold = threshold;
        self
    }

    pub fn validate(&self) -> MemoryResult<()> {
        if self.retrieval_k == 0 {
            return Err(MemoryError::InvalidConfig(
                "retrieval_k must be at least 1".to_string(),
            ));
        }
        if self.consolidation_threshold == ConsolidationThreshold::Entries(0) {
            return Err(MemoryError::InvalidConfig(
                "consolidation_threshold must be at least 1 (use \"infinite\" to disable)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// True when a store of `len` entries should be consolidated now.
    pub fn consolidation_due(&self, len: usize) -> bool {
        self.policy.consolidation_enabled && self.consolidation_threshold.exceeded_by(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.retrieval_k, 5);
        assert_eq!(c.consolidation_threshold, ConsolidationThreshold::Entries(20));
        assert_eq!(c.placeholder_markers, vec!["[MEMORY TEST]".to_string()]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!(
            "12".parse::<ConsolidationThreshold>().unwrap(),
            ConsolidationThreshold::Entries(12)
        );
        assert_eq!(
            "inf".parse::<ConsolidationThreshold>().unwrap(),
            ConsolidationThreshold::Infinite
        );
        assert!("lots".parse::<ConsolidationThreshold>().is_err());
    }

    #[test]
    fn test_consolidation_due() {
        let c = EngineConfig::default();
        assert!(!c.consolidation_due(20));
        assert!(c.consolidation_due(21));

        let infinite = c
            .clone()
            .with_consolidation_threshold(ConsolidationThreshold::Infinite);
        assert!(!infinite.consolidation_due(10_000));

        let disabled = c.with_policy(PolicyConfig {
            consolidation_enabled: false,
            ..PolicyConfig::default()
        });
        assert!(!disabled.consolidation_due(10_000));
    }

    #[test]
    fn test_from_toml() {
        let c = EngineConfig::from_toml_str(
            r#"
            retrieval_k = 3
            consolidation_threshold = "infinite"

            [policy]
            feedback_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(c.retrieval_k, 3);
        assert_eq!(c.consolidation_threshold, ConsolidationThreshold::Infinite);
        assert!(!c.policy.feedback_enabled);
        assert!(c.policy.honor_updates);
    }

    #[test]
    fn test_from_toml_rejects_zero_k() {
        assert!(EngineConfig::from_toml_str("retrieval_k = 0").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_RETRIEVAL_K, "8"),
            (ENV_CONSOLIDATION_THRESHOLD, "none"),
        ]
        .into_iter()
        .collect();
        let c = EngineConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.retrieval_k, 8);
        assert_eq!(c.consolidation_threshold, ConsolidationThreshold::Infinite);

        let bad = EngineConfig::default().with_overrides(|k| {
            (k == ENV_RETRIEVAL_K).then(|| "many".to_string())
        });
        assert!(bad.is_err());
    }
}
