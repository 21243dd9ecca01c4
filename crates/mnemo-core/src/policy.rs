//! Policy flags for controlled ablation runs.
//!
//! One ingestor consumes these flags; each named variant is just a preset.

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::planner::MutationSet;

/// Which capabilities of the engine are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Show the planner the retrieved store view (otherwise a placeholder).
    pub feedback_enabled: bool,
    pub honor_updates: bool,
    pub honor_deletes: bool,
    pub consolidation_enabled: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            feedback_enabled: true,
            honor_updates: true,
            honor_deletes: true,
            consolidation_enabled: true,
        }
    }
}

impl PolicyConfig {
    /// Drop directive categories this policy does not honour.
    ///
    /// Returns the filtered set and the number of directives suppressed.
    pub fn filter(&self, mut set: MutationSet) -> (MutationSet, usize) {
        let mut suppressed = 0;
        if !self.honor_updates {
            suppressed += set.updates.len();
            set.updates.clear();
        }
        if !self.honor_deletes {
            suppressed += set.deletes.len();
            set.deletes.clear();
        }
        (set, suppressed)
    }

    /// True when the store can only grow under this policy.
    pub fn is_append_only(&self) -> bool {
        !self.honor_updates && !self.honor_deletes && !self.consolidation_enabled
    }
}

/// Named presets used by the experiment tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVariant {
    /// Everything enabled.
    Agent,
    /// Planner never sees existing memories.
    NoFeedback,
    /// Consolidation never runs.
    NoConsolidation,
    /// Only adds are honoured; no update, delete or consolidation.
    AddOnly,
}

impl PolicyVariant {
    pub const ALL: [PolicyVariant; 4] = [
        Self::Agent,
        Self::NoFeedback,
        Self::NoConsolidation,
        Self::AddOnly,
    ];

    pub fn config(&self) -> PolicyConfig {
        let full = PolicyConfig::default();
        match self {
            Self::Agent => full,
            Self::NoFeedback => PolicyConfig {
                feedback_enabled: false,
                ..full
            },
            Self::NoConsolidation => PolicyConfig {
                consolidation_enabled: false,
                ..full
            },
            Self::AddOnly => PolicyConfig {
                honor_updates: false,
                honor_deletes: false,
                consolidation_enabled: false,
                ..full
            },
        }
    }

    /// Stable name used on the command line and in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::NoFeedback => "ablation_no_feedback",
            Self::NoConsolidation => "ablation_no_consolidation",
            Self::AddOnly => "ablation_add_only",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Agent => "Agent-driven memory with all capabilities",
            Self::NoFeedback => "Planner is blind to existing memories",
            Self::NoConsolidation => "Consolidation never triggers",
            Self::AddOnly => "Append-only: updates, deletes and consolidation ignored",
        }
    }
}

impl std::fmt::Display for PolicyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PolicyVariant {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let bare = normalized.strip_prefix("ablation_").unwrap_or(&normalized);
        match bare {
            "agent" | "full" => Ok(Self::Agent),
            "no_feedback" => Ok(Self::NoFeedback),
            "no_consolidation" => Ok(Self::NoConsolidation),
            "add_only" => Ok(Self::AddOnly),
            _ => Err(MemoryError::InvalidConfig(format!(
                "unknown policy variant: {s}"
            ))),
        }
    }
}
