//! Error types for showcase-state

use thiserror::Error;

use crate::storage_traits::{PerformanceStatus, SlotStatus};

/// Errors that can occur while connecting to or migrating the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors surfaced through the storage traits.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("performance not found: {performance_id}")]
    PerformanceNotFound { performance_id: String },

    #[error("judge {judge_id} already scored performance {performance_id}")]
    DuplicateScore {
        judge_id: String,
        performance_id: String,
    },

    #[error("voter {voter_id} already voted for performance {performance_id}")]
    DuplicateVote {
        voter_id: String,
        performance_id: String,
    },

    #[error(
        "performance {performance_id} is {found}, expected {expected} before moving to {requested}"
    )]
    StatusConflict {
        performance_id: String,
        expected: PerformanceStatus,
        found: PerformanceStatus,
        requested: PerformanceStatus,
    },

    #[error("round not found: {round_id}")]
    RoundNotFound { round_id: String },

    #[error("contestant not found: {contestant_id}")]
    ContestantNotFound { contestant_id: String },

    #[error("slot not found: {slot_id}")]
    SlotNotFound { slot_id: String },

    #[error("slot {slot_id} is {status}")]
    SlotUnavailable { slot_id: String, status: SlotStatus },

    #[error("round {round_id} already has a result at version {version}")]
    ResultVersionConflict { round_id: String, version: u32 },

    #[error("media not found: {path}")]
    MediaNotFound { path: String },

    #[error("invalid media path: {path}")]
    InvalidMediaPath { path: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for uniqueness and compare-and-set losses a caller must not retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::DuplicateScore { .. }
                | StorageError::DuplicateVote { .. }
                | StorageError::ResultVersionConflict { .. }
                | StorageError::StatusConflict { .. }
                | StorageError::SlotUnavailable { .. }
        )
    }
}
