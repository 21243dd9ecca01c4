//! Mutation planner: turns store state plus conversation into a
//! [`MutationSet`] by asking the reasoning oracle.
//!
//! The planner fails soft. Unparsable output and oracle failures both yield
//! an empty mutation set with a warning; a session is never aborted.

pub mod mutation;
pub mod parse;
pub mod prompt;

use std::sync::Arc;

pub use mutation::{DeleteDirective, MutationSet, ProposedEntry, UpdateDirective};
pub use parse::{decode_json, extract_json, parse_planner_reply, ParseOutcome, PlannerReply};
pub use prompt::{consolidation_prompt, render_entries, turn_prompt, MemoryView};

use crate::obs;
use crate::oracle::ReasoningOracle;
use crate::stats::MemoryStats;
use crate::turn::Turn;

/// Everything the planner conditions on for one turn.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub view: MemoryView<'a>,
    /// Transcript up to and including the current turn.
    pub transcript: &'a [Turn],
    pub session: u32,
}

/// How a planning call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Parsed,
    ParseFailed,
    OracleFailed,
}

/// Planner result. `mutations` is empty unless `status` is `Parsed`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub status: PlanStatus,
    pub mutations: MutationSet,
    pub reply: Option<String>,
}

impl PlanOutcome {
    fn no_change(status: PlanStatus) -> Self {
        Self {
            status,
            mutations: MutationSet::empty(),
            reply: None,
        }
    }
}

/// Asks the reasoning oracle for memory mutations.
#[derive(Clone)]
pub struct MutationPlanner {
    oracle: Arc<dyn ReasoningOracle>,
}

impl MutationPlanner {
    pub fn new(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self { oracle }
    }

    /// Plan mutations for one turn.
    pub async fn plan(&self, request: PlanRequest<'_>, stats: &MemoryStats) -> PlanOutcome {
        let prompt = turn_prompt(request.view, request.transcript, request.session);

        let completion = match self.oracle.complete(&prompt).await {
            Ok(completion) => completion,
            Err(err) => {
                stats.record_oracle_failure();
                obs::emit_oracle_failure("planner", request.session, &err);
                return PlanOutcome::no_change(PlanStatus::OracleFailed);
            }
        };
        stats.record_oracle_call(completion.usage);

        match parse_planner_reply(&completion.text) {
            ParseOutcome::Parsed(reply) => PlanOutcome {
                status: PlanStatus::Parsed,
                mutations: reply.mutations,
                reply: reply.response,
            },
            ParseOutcome::ParseFailed(raw) => {
                stats.record_parse_failure();
                obs::emit_parse_failure("planner", request.session, &raw);
                PlanOutcome::no_change(PlanStatus::ParseFailed)
            }
        }
    }
}
