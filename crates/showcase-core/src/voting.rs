//! Audience vote submission.

use std::sync::Arc;

use chrono::Utc;
use showcase_state::{
    PerformanceId, PerformanceRegistry, RoundRegistry, VoteRecord, VoteStore, VoterId,
};
use tracing::instrument;

use crate::error::{Result, ShowcaseError};
use crate::obs;

/// Accepts at most one vote per (voter, performance).
///
/// Uniqueness is enforced by [`VoteStore::insert_unique`], a single atomic
/// conditional write, so concurrent duplicates still store one vote.
///
/// With a round registry attached, votes for a registered round are only
/// accepted while its voting window is open.
pub struct VotingService {
    performances: Arc<dyn PerformanceRegistry>,
    votes: Arc<dyn VoteStore>,
    rounds: Option<Arc<dyn RoundRegistry>>,
}

impl VotingService {
    pub fn new(performances: Arc<dyn PerformanceRegistry>, votes: Arc<dyn VoteStore>) -> Self {
        Self {
            performances,
            votes,
            rounds: None,
        }
    }

    pub fn with_rounds(mut self, rounds: Arc<dyn RoundRegistry>) -> Self {
        self.rounds = Some(rounds);
        self
    }

    #[instrument(skip(self), fields(voter_id = %voter_id, performance_id = %performance_id))]
    pub async fn submit_vote(
        &self,
        voter_id: &VoterId,
        performance_id: &PerformanceId,
    ) -> Result<VoteRecord> {
        let outcome = self.try_submit(voter_id, performance_id).await;
        match &outcome {
            Ok(_) => obs::emit_vote_accepted(performance_id.as_str(), voter_id.as_str()),
            Err(e) => obs::emit_vote_rejected(performance_id.as_str(), voter_id.as_str(), e),
        }
        outcome
    }

    async fn try_submit(
        &self,
        voter_id: &VoterId,
        performance_id: &PerformanceId,
    ) -> Result<VoteRecord> {
        let performance = self
            .performances
            .get(performance_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("get_performance", e))?
            .ok_or_else(|| ShowcaseError::PerformanceNotFound {
                performance_id: performance_id.to_string(),
            })?;

        if let Some(rounds) = &self.rounds {
            let round = rounds
                .get(&performance.round_id)
                .await
                .map_err(|e| ShowcaseError::from_storage("get_round", e))?;
            if let Some(round) = round {
                if !round.is_voting_open(Utc::now()) {
                    return Err(ShowcaseError::VotingClosed {
                        round_id: round.id.to_string(),
                    });
                }
            }
        }

        self.votes
            .insert_unique(voter_id, performance_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("insert_vote", e))
    }

    pub async fn vote_count(&self, performance_id: &PerformanceId) -> Result<u64> {
        self.votes
            .count_by_performance(performance_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("count_votes", e))
    }
}
