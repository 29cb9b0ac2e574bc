//! Error types for the showcase services and results engine.

use showcase_state::{PerformanceStatus, SlotStatus, StorageError};

/// Errors produced by the showcase services and the results engine.
#[derive(Debug, thiserror::Error)]
pub enum ShowcaseError {
    #[error("round {round_id} has no performances")]
    NoPerformancesInRound { round_id: String },

    #[error("voter {voter_id} already voted for performance {performance_id}")]
    DuplicateVote {
        voter_id: String,
        performance_id: String,
    },

    #[error("judge {judge_id} already scored performance {performance_id}")]
    DuplicateScore {
        judge_id: String,
        performance_id: String,
    },

    #[error("upstream read failed during {operation}: {detail}")]
    UpstreamReadFailure { operation: String, detail: String },

    #[error("aggregation of round {round_id} was cancelled")]
    Cancelled { round_id: String },

    #[error("performance not found: {performance_id}")]
    PerformanceNotFound { performance_id: String },

    #[error("performance {performance_id} cannot move from {from} to {to}")]
    InvalidTransition {
        performance_id: String,
        from: PerformanceStatus,
        to: PerformanceStatus,
    },

    #[error("round not found: {round_id}")]
    RoundNotFound { round_id: String },

    #[error("invalid round: {0}")]
    InvalidRound(String),

    #[error("voting is closed for round {round_id}")]
    VotingClosed { round_id: String },

    #[error("contestant not found: {contestant_id}")]
    ContestantNotFound { contestant_id: String },

    #[error("slot not found: {slot_id}")]
    SlotNotFound { slot_id: String },

    #[error("slot {slot_id} is {status}")]
    SlotUnavailable { slot_id: String, status: SlotStatus },

    #[error("invalid score for {criterion}: {value} (expected 0.0..=10.0)")]
    InvalidScore { criterion: String, value: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ShowcaseError {
    /// Wrap a storage error raised by `operation`.
    ///
    /// Uniqueness, not-found and lost status races keep their meaning;
    /// everything else becomes `UpstreamReadFailure`.
    pub fn from_storage(operation: &str, err: StorageError) -> Self {
        match err {
            StorageError::DuplicateVote {
                voter_id,
                performance_id,
            } => ShowcaseError::DuplicateVote {
                voter_id,
                performance_id,
            },
            StorageError::DuplicateScore {
                judge_id,
                performance_id,
            } => ShowcaseError::DuplicateScore {
                judge_id,
                performance_id,
            },
            StorageError::PerformanceNotFound { performance_id } => {
                ShowcaseError::PerformanceNotFound { performance_id }
            }
            StorageError::StatusConflict {
                performance_id,
                found,
                requested,
                ..
            } => ShowcaseError::InvalidTransition {
                performance_id,
                from: found,
                to: requested,
            },
            StorageError::RoundNotFound { round_id } => ShowcaseError::RoundNotFound { round_id },
            StorageError::ContestantNotFound { contestant_id } => {
                ShowcaseError::ContestantNotFound { contestant_id }
            }
            StorageError::SlotNotFound { slot_id } => ShowcaseError::SlotNotFound { slot_id },
            StorageError::SlotUnavailable { slot_id, status } => {
                ShowcaseError::SlotUnavailable { slot_id, status }
            }
            other => ShowcaseError::UpstreamReadFailure {
                operation: operation.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

/// Result type for showcase operations.
pub type Result<T> = std::result::Result<T, ShowcaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_vote_keeps_its_meaning() {
        let err = ShowcaseError::from_storage(
            "insert_vote",
            StorageError::DuplicateVote {
                voter_id: "v1".into(),
                performance_id: "p1".into(),
            },
        );
        assert!(matches!(err, ShowcaseError::DuplicateVote { .. }));
    }

    #[test]
    fn lost_status_race_is_an_invalid_transition() {
        let err = ShowcaseError::from_storage(
            "update_performance",
            StorageError::StatusConflict {
                performance_id: "p1".into(),
                expected: PerformanceStatus::PendingReview,
                found: PerformanceStatus::Rejected,
                requested: PerformanceStatus::Scored,
            },
        );
        assert!(matches!(
            err,
            ShowcaseError::InvalidTransition {
                from: PerformanceStatus::Rejected,
                to: PerformanceStatus::Scored,
                ..
            }
        ));
    }

    #[test]
    fn backend_errors_become_upstream_failures() {
        let err = ShowcaseError::from_storage("list_scores", StorageError::Backend("boom".into()));
        match err {
            ShowcaseError::UpstreamReadFailure { operation, detail } => {
                assert_eq!(operation, "list_scores");
                assert!(detail.contains("boom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn result_version_conflict_is_an_upstream_failure() {
        let err = ShowcaseError::from_storage(
            "insert_result",
            StorageError::ResultVersionConflict {
                round_id: "r1".into(),
                version: 2,
            },
        );
        assert!(matches!(err, ShowcaseError::UpstreamReadFailure { .. }));
    }
}
