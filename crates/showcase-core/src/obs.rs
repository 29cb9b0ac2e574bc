//! Structured observability hooks for round aggregation, voting and scoring.
//!
//! - `round_span` scoping everything logged for one round; attach it to a
//!   future with `tracing::Instrument`
//! - `emit_*` functions for lifecycle events, logged with an `event` field
//!
//! Filter with `RUST_LOG`; pass `--json` to the CLI for JSON lines.

use tracing::{info, warn};

/// Span carrying `round_id` for every event logged inside it.
///
/// ```ignore
/// engine.aggregate_round(&round).instrument(round_span("semi-final")).await
/// ```
pub fn round_span(round_id: &str) -> tracing::Span {
    tracing::info_span!("showcase.round", round_id = %round_id)
}

pub fn emit_aggregation_started(round_id: &str, performances: usize, policy: &str) {
    info!(
        event = "aggregation.started",
        round_id = %round_id,
        performances = performances,
        policy = %policy,
    );
}

/// Emit event: standings computed and (unless previewing) stored.
pub fn emit_aggregation_finished(
    round_id: &str,
    version: Option<u32>,
    entries: usize,
    duration_ms: u64,
) {
    info!(
        event = "aggregation.finished",
        round_id = %round_id,
        version = ?version,
        entries = entries,
        duration_ms = duration_ms,
    );
}

pub fn emit_aggregation_cancelled(round_id: &str) {
    warn!(event = "aggregation.cancelled", round_id = %round_id);
}

pub fn emit_aggregation_failed(round_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "aggregation.failed", round_id = %round_id, error = %error);
}

pub fn emit_vote_accepted(performance_id: &str, voter_id: &str) {
    info!(event = "vote.accepted", performance_id = %performance_id, voter_id = %voter_id);
}

/// Emit event: vote refused (duplicate, unknown performance, closed window).
pub fn emit_vote_rejected(performance_id: &str, voter_id: &str, reason: &dyn std::fmt::Display) {
    warn!(
        event = "vote.rejected",
        performance_id = %performance_id,
        voter_id = %voter_id,
        reason = %reason,
    );
}

pub fn emit_score_submitted(performance_id: &str, judge_id: &str, overall: f64) {
    info!(
        event = "score.submitted",
        performance_id = %performance_id,
        judge_id = %judge_id,
        overall = overall,
    );
}
