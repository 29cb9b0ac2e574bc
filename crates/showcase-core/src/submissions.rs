//! Performance submission, review and judge scoring.
//!
//! These services feed the results engine: contestants submit performances
//! (media first, record second), reviewers approve or reject them, and judges
//! score them. Scoring a performance moves it to `scored`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use showcase_state::{
    ContentDigest, ContestantId, JudgeId, MediaStore, MediaType, NewPerformance, NewScore,
    PerformanceId, PerformanceRecord, PerformanceRegistry, PerformanceStatus, RoundId,
    ScoreCriteria, ScoreRecord, ScoreStore, StorageError,
};
use tracing::{info, instrument, warn};

use crate::error::{Result, ShowcaseError};
use crate::obs;
use crate::scoring;

/// Everything about a performance except its media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceDraft {
    pub contestant_id: ContestantId,
    pub round_id: RoundId,
    pub slot_id: Option<String>,
    pub media_type: MediaType,
    pub song_title: String,
    pub artist: String,
}

/// Outcome of reviewing a pending performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target_status(self) -> PerformanceStatus {
        match self {
            ReviewDecision::Approve => PerformanceStatus::Approved,
            ReviewDecision::Reject => PerformanceStatus::Rejected,
        }
    }
}

/// Storage key for uploaded media.
pub fn media_path(contestant_id: &ContestantId, unix_millis: i64, file_name: &str) -> String {
    format!("performances/{contestant_id}/{unix_millis}_{file_name}")
}

pub struct PerformanceService {
    performances: Arc<dyn PerformanceRegistry>,
    media: Arc<dyn MediaStore>,
}

impl PerformanceService {
    pub fn new(performances: Arc<dyn PerformanceRegistry>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            performances,
            media,
        }
    }

    /// Upload the media, then record a `pending_review` performance pointing
    /// at it. The upload is removed again when the record cannot be written.
    #[instrument(skip(self, draft, bytes), fields(contestant_id = %draft.contestant_id, round_id = %draft.round_id, size = bytes.len()))]
    pub async fn submit(
        &self,
        draft: PerformanceDraft,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PerformanceRecord> {
        let base_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ShowcaseError::from_storage(
                    "upload_media",
                    StorageError::InvalidMediaPath {
                        path: file_name.to_string(),
                    },
                )
            })?;

        let now = Utc::now();
        let path = media_path(&draft.contestant_id, now.timestamp_millis(), base_name);
        let media_url = self
            .media
            .upload(&path, bytes)
            .await
            .map_err(|e| ShowcaseError::from_storage("upload_media", e))?;

        let inserted = self
            .performances
            .insert(NewPerformance {
                contestant_id: draft.contestant_id,
                round_id: draft.round_id,
                slot_id: draft.slot_id,
                media_url,
                media_digest: ContentDigest::from_bytes(bytes),
                media_type: draft.media_type,
                song_title: draft.song_title,
                artist: draft.artist,
                submitted_at: Some(now),
            })
            .await;

        let record = match inserted {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.media.remove(&path).await {
                    warn!(path = %path, error = %cleanup, "orphaned media left behind");
                }
                return Err(ShowcaseError::from_storage("insert_performance", e));
            }
        };

        info!(performance_id = %record.id, digest = %record.media_digest.short(), "performance submitted");
        Ok(record)
    }

    #[instrument(skip(self, notes), fields(performance_id = %performance_id, decision = ?decision))]
    pub async fn review(
        &self,
        performance_id: &PerformanceId,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<PerformanceRecord> {
        let current = self.get(performance_id).await?;
        let target = decision.target_status();
        if current.status != PerformanceStatus::PendingReview
            || !current.status.can_transition_to(target)
        {
            return Err(ShowcaseError::InvalidTransition {
                performance_id: performance_id.to_string(),
                from: current.status,
                to: target,
            });
        }

        self.performances
            .update_status(performance_id, current.status, target, notes)
            .await
            .map_err(|e| ShowcaseError::from_storage("update_performance", e))
    }

    pub async fn get(&self, performance_id: &PerformanceId) -> Result<PerformanceRecord> {
        get_performance(self.performances.as_ref(), performance_id).await
    }

    /// Performances in the round, oldest submission first.
    pub async fn round_performances(&self, round_id: &RoundId) -> Result<Vec<PerformanceRecord>> {
        let mut performances = self
            .performances
            .list_by_round(round_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("list_performances", e))?;
        performances.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(performances)
    }

    /// Distinct contestants with at least one performance in the round.
    pub async fn contestants_in_round(&self, round_id: &RoundId) -> Result<Vec<ContestantId>> {
        let contestants: BTreeSet<ContestantId> = self
            .round_performances(round_id)
            .await?
            .into_iter()
            .map(|p| p.contestant_id)
            .collect();
        Ok(contestants.into_iter().collect())
    }
}

pub struct ScoringService {
    performances: Arc<dyn PerformanceRegistry>,
    scores: Arc<dyn ScoreStore>,
}

impl ScoringService {
    pub fn new(performances: Arc<dyn PerformanceRegistry>, scores: Arc<dyn ScoreStore>) -> Self {
        Self {
            performances,
            scores,
        }
    }

    /// Record a judge's score and mark the performance `scored`.
    ///
    /// The status moves only from the one read before the insert; if a
    /// review lands in between, the call fails with `InvalidTransition` and
    /// the performance keeps the reviewer's status.
    #[instrument(skip(self, criteria, comments), fields(judge_id = %judge_id, performance_id = %performance_id))]
    pub async fn submit_score(
        &self,
        judge_id: &JudgeId,
        performance_id: &PerformanceId,
        criteria: ScoreCriteria,
        comments: Option<String>,
    ) -> Result<ScoreRecord> {
        scoring::validate_criteria(&criteria)?;

        let performance = get_performance(self.performances.as_ref(), performance_id).await?;
        if performance.status == PerformanceStatus::Rejected {
            return Err(ShowcaseError::InvalidTransition {
                performance_id: performance_id.to_string(),
                from: performance.status,
                to: PerformanceStatus::Scored,
            });
        }

        let score = self
            .scores
            .insert(NewScore {
                performance_id: performance_id.clone(),
                judge_id: judge_id.clone(),
                criteria,
                comments,
            })
            .await
            .map_err(|e| ShowcaseError::from_storage("insert_score", e))?;

        if performance.status != PerformanceStatus::Scored {
            self.performances
                .update_status(
                    performance_id,
                    performance.status,
                    PerformanceStatus::Scored,
                    None,
                )
                .await
                .map_err(|e| ShowcaseError::from_storage("update_performance", e))?;
        }

        obs::emit_score_submitted(
            performance_id.as_str(),
            judge_id.as_str(),
            score.criteria.overall,
        );
        Ok(score)
    }

    pub async fn performance_scores(
        &self,
        performance_id: &PerformanceId,
    ) -> Result<Vec<ScoreRecord>> {
        self.scores
            .list_by_performance(performance_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("list_scores", e))
    }

    /// Mean `overall` mark, `0.0` when unscored.
    pub async fn average_score(&self, performance_id: &PerformanceId) -> Result<f64> {
        let scores = self.performance_scores(performance_id).await?;
        Ok(scoring::judge_score(&scores))
    }
}

async fn get_performance(
    registry: &dyn PerformanceRegistry,
    performance_id: &PerformanceId,
) -> Result<PerformanceRecord> {
    registry
        .get(performance_id)
        .await
        .map_err(|e| ShowcaseError::from_storage("get_performance", e))?
        .ok_or_else(|| ShowcaseError::PerformanceNotFound {
            performance_id: performance_id.to_string(),
        })
}
