//! mnemo - replay recorded conversations through an agent-driven memory
//!
//! ## Commands
//!
//! - `replay`: feed a profile transcript through an engine and print the
//!   resulting memories, counters and query hits as JSON
//! - `variants`: list the named policy presets

mod transcript;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mnemo_core::{
    AgentMemory, ConsolidationReport, ConsolidationThreshold, EmbeddingOracle, EngineConfig,
    EntryId, Importance, PolicyConfig, PolicyVariant, Provenance, ReasoningOracle, StatsSnapshot,
    TurnOutcome,
};
use mnemo_oracle::OpenAiClient;
use serde::Serialize;
use tracing::{info, Level};

use crate::transcript::Profile;

#[derive(Parser)]
#[command(name = "mnemo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Agent-driven conversational memory", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a profile transcript through a memory engine
    Replay(ReplayArgs),

    /// List the named policy presets
    Variants,
}

#[derive(clap::Args, Debug, Clone)]
struct ReplayArgs {
    /// Profile transcript (JSON)
    #[arg(short, long)]
    transcript: PathBuf,

    /// Policy preset (agent, ablation_no_feedback, ablation_no_consolidation, ablation_add_only)
    #[arg(long)]
    variant: Option<PolicyVariant>,

    /// Consolidation threshold in entries, or "inf" to disable
    #[arg(long)]
    threshold: Option<ConsolidationThreshold>,

    /// Entries retrieved per user turn
    #[arg(long)]
    top_k: Option<usize>,

    /// Only ingest sessions with a lower ordinal than this
    #[arg(long)]
    until_session: Option<u32>,

    /// Queries to run against the final store (repeatable)
    #[arg(short, long)]
    query: Vec<String>,

    /// Number of hits per query
    #[arg(long, default_value = "5")]
    hits: usize,

    /// Engine configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Entry as shown in reports, without its embedding.
#[derive(Debug, Serialize)]
struct MemorySummary {
    id: EntryId,
    content: String,
    importance: Importance,
    provenance: Provenance,
    session_created: u32,
    session_updated: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    merged_from: Vec<EntryId>,
}

impl From<&mnemo_core::MemoryEntry> for MemorySummary {
    fn from(entry: &mnemo_core::MemoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            content: entry.content().to_string(),
            importance: entry.importance(),
            provenance: entry.metadata.provenance,
            session_created: entry.metadata.session_created,
            session_updated: entry.metadata.session_updated,
            merged_from: entry.metadata.merged_from.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    session: u32,
    touched: Vec<EntryId>,
    replies: usize,
    skipped: usize,
    turns: Vec<TurnOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consolidation: Option<ConsolidationReport>,
}

#[derive(Debug, Serialize)]
struct QueryHit {
    id: EntryId,
    content: String,
    score: f32,
}

#[derive(Debug, Serialize)]
struct QueryResult {
    query: String,
    hits: Vec<QueryHit>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    user_id: String,
    policy: PolicyConfig,
    consolidation_threshold: ConsolidationThreshold,
    retrieval_k: usize,
    sessions: Vec<SessionSummary>,
    memories: Vec<MemorySummary>,
    queries: Vec<QueryResult>,
    stats: StatsSnapshot,
}

#[derive(Debug, Serialize)]
struct VariantInfo {
    name: &'static str,
    description: &'static str,
    policy: PolicyConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mnemo_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Replay(args) => {
            let client = Arc::new(
                OpenAiClient::from_env().context("Failed to build OpenAI client")?,
            );
            let report = cmd_replay(&args, client.clone(), client).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Variants => {
            println!("{}", serde_json::to_string_pretty(&cmd_variants())?);
            Ok(())
        }
    }
}

/// Configuration file (or defaults), then environment, then flags.
fn build_config(args: &ReplayArgs) -> Result<EngineConfig> {
    let base = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let mut config = base
        .with_overrides(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;

    if let Some(variant) = args.variant {
        config = config.with_policy(variant.config());
    }
    if let Some(threshold) = args.threshold {
        config = config.with_consolidation_threshold(threshold);
    }
    if let Some(k) = args.top_k {
        config = config.with_retrieval_k(k);
    }
    config.validate().context("Invalid engine configuration")?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    EngineConfig::from_toml_str(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

async fn cmd_replay(
    args: &ReplayArgs,
    reasoning: Arc<dyn ReasoningOracle>,
    embedder: Arc<dyn EmbeddingOracle>,
) -> Result<ReplayReport> {
    let profile = Profile::load(&args.transcript)?;
    let config = build_config(args)?;
    let mut memory = AgentMemory::new(profile.user_id.clone(), config, reasoning, embedder)
        .context("Failed to create memory engine")?;

    let mut sessions = Vec::new();
    for session in profile.sessions_before(args.until_session) {
        info!(
            user_id = %profile.user_id,
            session = session.session_id,
            turns = session.turns.len(),
            "Replaying session"
        );
        let report = memory
            .ingest_session(&session.turns, session.session_id)
            .await;
        sessions.push(SessionSummary {
            session: report.session,
            touched: report.touched.iter().map(|e| e.id.clone()).collect(),
            replies: report.replies.len(),
            skipped: report.skipped.len(),
            turns: report.turns,
            consolidation: report.consolidation,
        });
    }

    let mut queries = Vec::with_capacity(args.query.len());
    for query in &args.query {
        let hits = memory
            .search_scored(query, args.hits)
            .await
            .with_context(|| format!("Search failed for query {query:?}"))?;
        queries.push(QueryResult {
            query: query.clone(),
            hits: hits
                .into_iter()
                .map(|hit| QueryHit {
                    id: hit.entry.id.clone(),
                    content: hit.entry.content().to_string(),
                    score: hit.score,
                })
                .collect(),
        });
    }

    let config = memory.config();
    Ok(ReplayReport {
        user_id: profile.user_id.clone(),
        policy: config.policy,
        consolidation_threshold: config.consolidation_threshold,
        retrieval_k: config.retrieval_k,
        sessions,
        memories: memory.get_all().iter().map(MemorySummary::from).collect(),
        queries,
        stats: memory.stats(),
    })
}

fn cmd_variants() -> Vec<VariantInfo> {
    PolicyVariant::ALL
        .iter()
        .map(|v| VariantInfo {
            name: v.name(),
            description: v.description(),
            policy: v.config(),
        })
        .collect()
}
