//! Round results aggregation.
//!
//! [`ResultsEngine`] turns a round's performances, judge scores and audience
//! votes into ranked standings and appends them as a new versioned
//! [`RoundResultRecord`].
//!
//! Per-performance reads run concurrently in a `JoinSet`, bounded by a
//! semaphore, and land in per-index slots. Ranking starts only after every
//! read has finished. Any read failure or cancellation aborts the outstanding
//! reads and nothing is written.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use showcase_state::{
    PerformanceRecord, PerformanceRegistry, RankedEntry, RoundId, RoundResultRecord,
    RoundResultStore, ScoreStore, VoteStore,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{Result, ShowcaseError};
use crate::obs;
use crate::ranking::{rank_tallies, PerformanceTally};
use crate::scoring::{self, AdditiveScoring, ScoringPolicy};

/// Computes and stores round standings.
pub struct ResultsEngine {
    performances: Arc<dyn PerformanceRegistry>,
    scores: Arc<dyn ScoreStore>,
    votes: Arc<dyn VoteStore>,
    results: Arc<dyn RoundResultStore>,
    policy: Arc<dyn ScoringPolicy>,
    config: EngineConfig,
}

impl ResultsEngine {
    /// Engine with [`AdditiveScoring`] and the default [`EngineConfig`].
    pub fn new(
        performances: Arc<dyn PerformanceRegistry>,
        scores: Arc<dyn ScoreStore>,
        votes: Arc<dyn VoteStore>,
        results: Arc<dyn RoundResultStore>,
    ) -> Self {
        Self {
            performances,
            scores,
            votes,
            results,
            policy: Arc::new(AdditiveScoring),
            config: EngineConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ScoringPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Aggregate a round and append the standings as a new result version.
    pub async fn aggregate_round(&self, round_id: &RoundId) -> Result<RoundResultRecord> {
        self.aggregate_round_with_cancel(round_id, CancelToken::never())
            .await
    }

    /// Like [`aggregate_round`](Self::aggregate_round), but gives up with
    /// `Cancelled` as soon as `cancel` fires. A cancelled run writes nothing.
    #[instrument(skip(self, cancel), fields(round_id = %round_id))]
    pub async fn aggregate_round_with_cancel(
        &self,
        round_id: &RoundId,
        mut cancel: CancelToken,
    ) -> Result<RoundResultRecord> {
        let started = Instant::now();

        let outcome = async {
            let entries = self.standings(round_id, &mut cancel).await?;
            if cancel.is_cancelled() {
                return Err(cancelled(round_id));
            }
            self.results
                .append(round_id, entries, Utc::now())
                .await
                .map_err(|e| ShowcaseError::from_storage("insert_result", e))
        }
        .await;

        match &outcome {
            Ok(record) => obs::emit_aggregation_finished(
                round_id.as_str(),
                Some(record.version),
                record.results.len(),
                started.elapsed().as_millis() as u64,
            ),
            Err(ShowcaseError::Cancelled { .. }) => {
                obs::emit_aggregation_cancelled(round_id.as_str())
            }
            Err(e) => obs::emit_aggregation_failed(round_id.as_str(), e),
        }
        outcome
    }

    /// Compute standings without storing them.
    #[instrument(skip(self), fields(round_id = %round_id))]
    pub async fn compute_standings(&self, round_id: &RoundId) -> Result<Vec<RankedEntry>> {
        let started = Instant::now();
        let mut cancel = CancelToken::never();
        let entries = self.standings(round_id, &mut cancel).await;
        match &entries {
            Ok(entries) => obs::emit_aggregation_finished(
                round_id.as_str(),
                None,
                entries.len(),
                started.elapsed().as_millis() as u64,
            ),
            Err(e) => obs::emit_aggregation_failed(round_id.as_str(), e),
        }
        entries
    }

    /// Highest stored version for the round, if any.
    pub async fn latest_result(&self, round_id: &RoundId) -> Result<Option<RoundResultRecord>> {
        self.results
            .latest(round_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("latest_result", e))
    }

    /// Every stored version for the round, newest first.
    pub async fn result_history(&self, round_id: &RoundId) -> Result<Vec<RoundResultRecord>> {
        self.results
            .history(round_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("result_history", e))
    }

    async fn standings(
        &self,
        round_id: &RoundId,
        cancel: &mut CancelToken,
    ) -> Result<Vec<RankedEntry>> {
        self.config.validate()?;

        let performances = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(round_id)),
            listed = self.performances.list_by_round(round_id) => {
                listed.map_err(|e| ShowcaseError::from_storage("list_performances", e))?
            }
        };

        if performances.is_empty() {
            return Err(ShowcaseError::NoPerformancesInRound {
                round_id: round_id.to_string(),
            });
        }

        obs::emit_aggregation_started(round_id.as_str(), performances.len(), self.policy.name());

        let tallies = self.tally_all(round_id, performances, cancel).await?;
        Ok(rank_tallies(tallies))
    }

    async fn tally_all(
        &self,
        round_id: &RoundId,
        performances: Vec<PerformanceRecord>,
        cancel: &mut CancelToken,
    ) -> Result<Vec<PerformanceTally>> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_reads));
        let mut join_set = JoinSet::new();
        let total = performances.len();

        for (idx, performance) in performances.into_iter().enumerate() {
            let scores = Arc::clone(&self.scores);
            let votes = Arc::clone(&self.votes);
            let policy = Arc::clone(&self.policy);
            let sem = Arc::clone(&sem);

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let tally = tally_performance(scores, votes, policy, performance).await?;
                Ok::<(usize, PerformanceTally), ShowcaseError>((idx, tally))
            });
        }

        let mut slots: Vec<Option<PerformanceTally>> = vec![None; total];
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(cancelled(round_id));
                }
                joined = join_set.join_next() => joined,
            };

            let Some(joined) = joined else { break };
            let outcome = joined.map_err(|e| ShowcaseError::UpstreamReadFailure {
                operation: "read_task".to_string(),
                detail: format!("performance read task join error: {e}"),
            });
            match outcome.and_then(|r| r) {
                Ok((idx, tally)) => slots[idx] = Some(tally),
                Err(e) => {
                    join_set.abort_all();
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| ShowcaseError::UpstreamReadFailure {
                    operation: "read_task".to_string(),
                    detail: "missing performance tally".to_string(),
                })
            })
            .collect()
    }
}

async fn tally_performance(
    scores: Arc<dyn ScoreStore>,
    votes: Arc<dyn VoteStore>,
    policy: Arc<dyn ScoringPolicy>,
    performance: PerformanceRecord,
) -> Result<PerformanceTally> {
    let (score_records, vote_count) = tokio::try_join!(
        async {
            scores
                .list_by_performance(&performance.id)
                .await
                .map_err(|e| ShowcaseError::from_storage("list_scores", e))
        },
        async {
            votes
                .count_by_performance(&performance.id)
                .await
                .map_err(|e| ShowcaseError::from_storage("count_votes", e))
        },
    )?;

    let judge_score = scoring::judge_score(&score_records);
    let audience_score = scoring::audience_score(vote_count);
    let final_score = policy.final_score(judge_score, audience_score);
    debug!(
        performance_id = %performance.id,
        judges = score_records.len(),
        votes = vote_count,
        final_score,
        "performance tallied"
    );

    Ok(PerformanceTally {
        performance_id: performance.id,
        contestant_id: performance.contestant_id,
        submitted_at: performance.submitted_at,
        judge_score,
        audience_score,
        final_score,
    })
}

fn cancelled(round_id: &RoundId) -> ShowcaseError {
    ShowcaseError::Cancelled {
        round_id: round_id.to_string(),
    }
}
