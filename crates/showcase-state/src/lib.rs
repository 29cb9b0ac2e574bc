//! Showcase-State: persistence for the talent showcase results engine
//!
//! This crate owns the records the engine reads (performances, judge scores,
//! audience votes), the round results it writes, and the round, slot and
//! contestant metadata around them.
//!
//! ## Key Components
//!
//! - `storage_traits`: backend-agnostic async store traits and record types
//! - `fakes`: in-memory implementations for tests and ephemeral runs
//! - `SurrealHandle`: SurrealDB connection implementing every store trait
//! - `FsMediaStore`: filesystem blob storage for performance media

mod error;
pub mod fakes;
mod handle;
pub mod media;
pub mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_stores;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, SurrealHandle};
pub use media::FsMediaStore;
pub use storage_traits::{
    ContentDigest, ContestantId, ContestantProfile, ContestantRecord, ContestantRegistry,
    ContestantUpdate, JudgeId, MediaStore, MediaType, NewContestant, NewPerformance, NewRound,
    NewScore, PerformanceId, PerformanceRecord, PerformanceRegistry, PerformanceStatus,
    RankedEntry, ResultId, RoundId, RoundRecord, RoundRegistry, RoundResultRecord,
    RoundResultStore, RoundStatus, RoundUpdate, ScoreCriteria, ScoreId, ScoreRecord, ScoreStore,
    SlotId, SlotRecord, SlotStatus, SlotStore, SlotWindow, SocialLinks, StorageResult, VoteId,
    VoteRecord, VoteStore, VoterId,
};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
