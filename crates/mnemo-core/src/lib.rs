//! mnemo core library
//!
//! An agent-driven memory engine: a reasoning oracle decides, turn by turn,
//! which facts about a user to add, update or delete, and periodically
//! consolidates the store. Embedding and reasoning services are injected as
//! trait objects; see [`oracle`].

pub mod apply;
pub mod config;
pub mod consolidate;
pub mod engine;
pub mod entry;
pub mod error;
pub mod fakes;
pub mod index;
pub mod obs;
pub mod oracle;
pub mod planner;
pub mod policy;
pub mod shared;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod turn;

pub use apply::{apply_mutations, ApplyReport, DirectiveKind, SkipReason, SkippedDirective};
pub use config::{
    ConsolidationThreshold, EngineConfig, DEFAULT_CONSOLIDATION_THRESHOLD, DEFAULT_RETRIEVAL_K,
};
pub use consolidate::{
    AppliedMerge, ConsolidationPlan, ConsolidationReport, ConsolidationStatus, Consolidator,
    MergeGroup, SkippedMerge,
};
pub use engine::{AgentMemory, IngestReport, TurnOutcome, TurnStatus};
pub use entry::{EntryId, EntryMetadata, Importance, MemoryEntry, Provenance};
pub use error::{MemoryError, MemoryResult};
pub use index::{cosine_similarity, ScoredEntry};
pub use oracle::{Completion, EmbeddingOracle, ReasoningOracle, TokenUsage};
pub use planner::{
    DeleteDirective, MutationPlanner, MutationSet, ParseOutcome, PlanOutcome, PlanStatus,
    ProposedEntry, UpdateDirective,
};
pub use policy::{PolicyConfig, PolicyVariant};
pub use shared::SharedAgentMemory;
pub use stats::{MemoryStats, StatsSnapshot};
pub use store::MemoryStore;
pub use turn::{Role, Turn, MEMORY_TEST_MARKER};
