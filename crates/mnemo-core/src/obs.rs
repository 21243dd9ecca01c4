//! Structured observability hooks for ingestion and consolidation events.
//!
//! This module provides:
//! - A session-scoped tracing span via [`session_span`]
//! - Emission functions for key lifecycle events: session start/finish, turn
//!   planning, mutation application, consolidation, and recovered failures
//!
//! Recovered failures (unparsable oracle output, oracle unavailability) are
//! emitted at `warn!`; everything else at `info!` or `debug!`.

use tracing::{debug, info, warn};

/// Longest excerpt of raw oracle text included in a warning.
pub const RAW_EXCERPT_CHARS: usize = 500;

/// Span tagging every event of one ingestion pass with user and session.
///
/// Attach it with [`tracing::Instrument::instrument`] so it stays correct
/// across `.await` points.
///
/// # Example
///
/// ```ignore
/// async { /* ... */ }.instrument(session_span("sarah_01", 3)).await;
/// ```
pub fn session_span(user_id: &str, session: u32) -> tracing::Span {
    tracing::info_span!("mnemo.session", user_id = %user_id, session = session)
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Emit event: a session's turns are about to be ingested.
pub fn emit_session_started(user_id: &str, session: u32, turns: usize) {
    info!(event = "session.started", user_id = %user_id, session = session, turns = turns);
}

/// Emit event: a session finished ingesting.
pub fn emit_session_finished(
    user_id: &str,
    session: u32,
    touched: usize,
    total_entries: usize,
    duration_ms: u64,
) {
    info!(
        event = "session.finished",
        user_id = %user_id,
        session = session,
        touched = touched,
        total_entries = total_entries,
        duration_ms = duration_ms,
    );
}

/// Emit event: the planner proposed mutations for a turn.
pub fn emit_turn_planned(
    session: u32,
    turn_index: usize,
    adds: usize,
    updates: usize,
    deletes: usize,
) {
    debug!(
        event = "turn.planned",
        session = session,
        turn_index = turn_index,
        adds = adds,
        updates = updates,
        deletes = deletes,
    );
}

/// Emit event: a mutation set was applied to the store.
pub fn emit_mutations_applied(
    session: u32,
    added: usize,
    updated: usize,
    deleted: usize,
    skipped: usize,
) {
    info!(
        event = "mutations.applied",
        session = session,
        added = added,
        updated = updated,
        deleted = deleted,
        skipped = skipped,
    );
}

/// Emit event: oracle output could not be decoded (warning level).
pub fn emit_parse_failure(stage: &str, session: u32, raw: &str) {
    warn!(
        event = "oracle.parse_failed",
        stage = %stage,
        session = session,
        raw = %excerpt(raw, RAW_EXCERPT_CHARS),
        "failed to parse oracle response"
    );
}

/// Emit event: an oracle call failed (warning level).
pub fn emit_oracle_failure(stage: &str, session: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "oracle.failed",
        stage = %stage,
        session = session,
        error = %error,
        "oracle call failed; no mutation applied"
    );
}

/// Emit event: consolidation completed.
pub fn emit_consolidation_finished(
    before: usize,
    after: usize,
    merged_groups: usize,
    deleted: usize,
) {
    info!(
        event = "consolidation.finished",
        before = before,
        after = after,
        merged_groups = merged_groups,
        deleted = deleted,
    );
}
