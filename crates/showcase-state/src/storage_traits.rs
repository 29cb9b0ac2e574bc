//! Storage trait definitions for showcase
//!
//! These traits define the storage seams the results engine reads from and
//! writes to:
//! - `PerformanceRegistry`: submitted performances scoped to a round
//! - `ScoreStore`: one judge score per (judge, performance)
//! - `VoteStore`: one audience vote per (voter, performance), atomically
//! - `RoundResultStore`: append-only, versioned round standings
//! - `MediaStore`: blob upload for performance media
//! - `RoundRegistry`: round metadata, judges and the voting window
//! - `SlotStore`: bookable performance slots per round
//! - `ContestantRegistry`: contestant profiles
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! via the `fakes` module; `SurrealHandle` implements them on SurrealDB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random identifier.
            pub fn generate() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(
    /// Identifier of one submitted performance
    PerformanceId
);
string_id!(
    /// Identifier of one elimination round
    RoundId
);
string_id!(
    /// Identifier of a contestant
    ContestantId
);
string_id!(
    /// Identifier of a judge
    JudgeId
);
string_id!(
    /// Identifier of an audience member
    VoterId
);
string_id!(
    /// Identifier of a stored score
    ScoreId
);
string_id!(
    /// Identifier of a stored vote
    VoteId
);
string_id!(
    /// Identifier of a persisted round result
    ResultId
);
string_id!(
    /// Identifier of a performance slot
    SlotId
);

/// Content digest (SHA-256 hex string) of uploaded media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::Backend(format!("invalid media digest: {s}")));
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PerformanceRegistry
// ---------------------------------------------------------------------------

/// Lifecycle of a performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    PendingReview,
    Approved,
    Rejected,
    Scored,
}

impl PerformanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceStatus::PendingReview => "pending_review",
            PerformanceStatus::Approved => "approved",
            PerformanceStatus::Rejected => "rejected",
            PerformanceStatus::Scored => "scored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(PerformanceStatus::PendingReview),
            "approved" => Some(PerformanceStatus::Approved),
            "rejected" => Some(PerformanceStatus::Rejected),
            "scored" => Some(PerformanceStatus::Scored),
            _ => None,
        }
    }

    /// `pending_review -> approved | rejected`, `pending_review | approved -> scored`.
    pub fn can_transition_to(self, next: PerformanceStatus) -> bool {
        use PerformanceStatus::*;
        matches!(
            (self, next),
            (PendingReview, Approved)
                | (PendingReview, Rejected)
                | (PendingReview, Scored)
                | (Approved, Scored)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PerformanceStatus::Rejected | PerformanceStatus::Scored)
    }
}

impl std::fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of media attached to a performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Audio,
    Video,
}

/// Fields supplied when registering a performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPerformance {
    pub contestant_id: ContestantId,
    pub round_id: RoundId,
    pub slot_id: Option<String>,
    pub media_url: String,
    pub media_digest: ContentDigest,
    pub media_type: MediaType,
    pub song_title: String,
    pub artist: String,
    /// Assigned by the store when `None`; imports keep their original time.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// A stored performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: PerformanceId,
    pub contestant_id: ContestantId,
    pub round_id: RoundId,
    pub slot_id: Option<String>,
    pub media_url: String,
    pub media_digest: ContentDigest,
    pub media_type: MediaType,
    pub song_title: String,
    pub artist: String,
    pub status: PerformanceStatus,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl PerformanceRecord {
    pub fn from_new(id: PerformanceId, new: NewPerformance, now: DateTime<Utc>) -> Self {
        Self {
            id,
            contestant_id: new.contestant_id,
            round_id: new.round_id,
            slot_id: new.slot_id,
            media_url: new.media_url,
            media_digest: new.media_digest,
            media_type: new.media_type,
            song_title: new.song_title,
            artist: new.artist,
            status: PerformanceStatus::PendingReview,
            submitted_at: new.submitted_at.unwrap_or(now),
            notes: None,
        }
    }
}

/// Registry of submitted performances.
///
/// Guarantees:
/// - `insert` always creates a `pending_review` record with a fresh id.
/// - `list_by_round` makes no ordering promise; callers sort.
#[async_trait]
pub trait PerformanceRegistry: Send + Sync {
    async fn insert(&self, performance: NewPerformance) -> StorageResult<PerformanceRecord>;

    async fn get(&self, id: &PerformanceId) -> StorageResult<Option<PerformanceRecord>>;

    async fn list_by_round(&self, round_id: &RoundId) -> StorageResult<Vec<PerformanceRecord>>;

    /// Compare-and-set the status (and notes when given).
    ///
    /// The write only happens while the stored status equals `expected`;
    /// otherwise it fails with `StatusConflict` carrying the status found.
    /// Unknown ids fail with `PerformanceNotFound`.
    async fn update_status(
        &self,
        id: &PerformanceId,
        expected: PerformanceStatus,
        status: PerformanceStatus,
        notes: Option<String>,
    ) -> StorageResult<PerformanceRecord>;
}

// ---------------------------------------------------------------------------
// ScoreStore
// ---------------------------------------------------------------------------

/// Per-criterion judge marks on a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCriteria {
    pub pitch: f64,
    pub tone: f64,
    pub stage_presence: f64,
    pub overall: f64,
}

impl ScoreCriteria {
    /// Build criteria with `overall` derived as the mean of the three marks.
    pub fn from_parts(pitch: f64, tone: f64, stage_presence: f64) -> Self {
        Self {
            pitch,
            tone,
            stage_presence,
            overall: (pitch + tone + stage_presence) / 3.0,
        }
    }

    /// Named marks, in display order.
    pub fn marks(&self) -> [(&'static str, f64); 4] {
        [
            ("pitch", self.pitch),
            ("tone", self.tone),
            ("stage_presence", self.stage_presence),
            ("overall", self.overall),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScore {
    pub performance_id: PerformanceId,
    pub judge_id: JudgeId,
    pub criteria: ScoreCriteria,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: ScoreId,
    pub performance_id: PerformanceId,
    pub judge_id: JudgeId,
    pub criteria: ScoreCriteria,
    pub comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Judge score storage.
///
/// Guarantees:
/// - At most one score per (judge, performance); a second insert fails with
///   `StorageError::DuplicateScore` and writes nothing.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn insert(&self, score: NewScore) -> StorageResult<ScoreRecord>;

    async fn list_by_performance(
        &self,
        performance_id: &PerformanceId,
    ) -> StorageResult<Vec<ScoreRecord>>;
}

// ---------------------------------------------------------------------------
// VoteStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: VoteId,
    pub performance_id: PerformanceId,
    pub voter_id: VoterId,
    pub timestamp: DateTime<Utc>,
}

impl VoteRecord {
    /// Deterministic key for the (voter, performance) identity.
    ///
    /// Each id is hashed behind its byte length, so no two distinct pairs
    /// share a preimage. Backends key the conditional insert on this value.
    pub fn composite_key(voter_id: &VoterId, performance_id: &PerformanceId) -> String {
        let mut hasher = Sha256::new();
        for part in [voter_id.as_str(), performance_id.as_str()] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Audience vote storage.
///
/// Guarantees:
/// - `insert_unique` is a single atomic conditional write keyed by the
///   (voter, performance) pair. Concurrent callers with the same pair see
///   exactly one success; the rest get `StorageError::DuplicateVote`.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn insert_unique(
        &self,
        voter_id: &VoterId,
        performance_id: &PerformanceId,
    ) -> StorageResult<VoteRecord>;

    async fn count_by_performance(&self, performance_id: &PerformanceId) -> StorageResult<u64>;

    async fn list_by_performance(
        &self,
        performance_id: &PerformanceId,
    ) -> StorageResult<Vec<VoteRecord>>;
}

// ---------------------------------------------------------------------------
// RoundResultStore
// ---------------------------------------------------------------------------

/// One performance's outcome inside a round result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub contestant_id: ContestantId,
    pub performance_id: PerformanceId,
    pub final_score: f64,
    pub judge_score: f64,
    pub audience_score: f64,
}

/// A persisted, immutable snapshot of a round's standings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResultRecord {
    pub id: ResultId,
    pub round_id: RoundId,
    pub version: u32,
    pub results: Vec<RankedEntry>,
    pub generated_at: DateTime<Utc>,
}

/// Versioned round result storage.
///
/// Semantics:
/// - `append` stores a new result with version `latest + 1` (1 for the first).
/// - `(round_id, version)` is unique; a concurrent writer that loses the race
///   gets `StorageError::ResultVersionConflict`.
/// - Results are never updated or deleted.
/// - `history` returns newest first.
#[async_trait]
pub trait RoundResultStore: Send + Sync {
    async fn append(
        &self,
        round_id: &RoundId,
        results: Vec<RankedEntry>,
        generated_at: DateTime<Utc>,
    ) -> StorageResult<RoundResultRecord>;

    async fn latest(&self, round_id: &RoundId) -> StorageResult<Option<RoundResultRecord>>;

    async fn history(&self, round_id: &RoundId) -> StorageResult<Vec<RoundResultRecord>>;

    async fn get(&self, id: &ResultId) -> StorageResult<Option<RoundResultRecord>>;
}

// ---------------------------------------------------------------------------
// MediaStore
// ---------------------------------------------------------------------------

/// Blob storage for performance media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `data` at `path`, returning a retrievable URL.
    async fn upload(&self, path: &str, data: &[u8]) -> StorageResult<String>;

    /// Read back the bytes stored at `path`.
    async fn fetch(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Delete the blob at `path`. Fails with `MediaNotFound` when absent.
    async fn remove(&self, path: &str) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// RoundRegistry
// ---------------------------------------------------------------------------

/// Lifecycle of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Upcoming,
    Active,
    Completed,
}

impl RoundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundStatus::Upcoming => "upcoming",
            RoundStatus::Active => "active",
            RoundStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields supplied when creating a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRound {
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: RoundStatus,
    pub max_contestants: u32,
    pub judge_ids: Vec<JudgeId>,
    pub voting_enabled: bool,
    pub voting_start: Option<DateTime<Utc>>,
    pub voting_end: Option<DateTime<Utc>>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: RoundId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: RoundStatus,
    pub max_contestants: u32,
    pub judge_ids: Vec<JudgeId>,
    pub voting_enabled: bool,
    pub voting_start: Option<DateTime<Utc>>,
    pub voting_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl RoundRecord {
    pub fn from_new(id: RoundId, new: NewRound, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            start_date: new.start_date,
            end_date: new.end_date,
            status: new.status,
            max_contestants: new.max_contestants,
            judge_ids: new.judge_ids,
            voting_enabled: new.voting_enabled,
            voting_start: new.voting_start,
            voting_end: new.voting_end,
            created_at: now,
            created_by: new.created_by,
        }
    }

    /// Voting is open when enabled and `now` lies inside the window.
    /// A missing bound leaves that side of the window open.
    pub fn is_voting_open(&self, now: DateTime<Utc>) -> bool {
        self.voting_enabled
            && self.voting_start.map_or(true, |start| start <= now)
            && self.voting_end.map_or(true, |end| now < end)
    }

    pub fn has_judge(&self, judge_id: &JudgeId) -> bool {
        self.judge_ids.iter().any(|j| j == judge_id)
    }
}

/// Partial update of a round; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<RoundStatus>,
    pub max_contestants: Option<u32>,
    pub judge_ids: Option<Vec<JudgeId>>,
    pub voting_enabled: Option<bool>,
    pub voting_start: Option<DateTime<Utc>>,
    pub voting_end: Option<DateTime<Utc>>,
}

impl RoundUpdate {
    /// Copy every set field onto `round`.
    pub fn apply_to(self, round: &mut RoundRecord) {
        if let Some(name) = self.name {
            round.name = name;
        }
        if let Some(description) = self.description {
            round.description = Some(description);
        }
        if let Some(start_date) = self.start_date {
            round.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            round.end_date = end_date;
        }
        if let Some(status) = self.status {
            round.status = status;
        }
        if let Some(max_contestants) = self.max_contestants {
            round.max_contestants = max_contestants;
        }
        if let Some(judge_ids) = self.judge_ids {
            round.judge_ids = judge_ids;
        }
        if let Some(voting_enabled) = self.voting_enabled {
            round.voting_enabled = voting_enabled;
        }
        if let Some(voting_start) = self.voting_start {
            round.voting_start = Some(voting_start);
        }
        if let Some(voting_end) = self.voting_end {
            round.voting_end = Some(voting_end);
        }
    }
}

/// Round metadata storage.
///
/// Guarantees:
/// - `create` assigns a fresh id and `created_at`.
/// - `update` is a single partial write; unknown ids fail with `RoundNotFound`.
#[async_trait]
pub trait RoundRegistry: Send + Sync {
    async fn create(&self, round: NewRound) -> StorageResult<RoundRecord>;

    async fn get(&self, id: &RoundId) -> StorageResult<Option<RoundRecord>>;

    async fn update(&self, id: &RoundId, update: RoundUpdate) -> StorageResult<RoundRecord>;
}

// ---------------------------------------------------------------------------
// SlotStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Completed,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window of a slot to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: SlotId,
    pub round_id: RoundId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub contestant_id: Option<ContestantId>,
}

/// Performance slot storage.
///
/// Guarantees:
/// - `create_slots` stores every window as an `available` slot of the round.
/// - `available` returns the round's available slots, earliest start first.
/// - `book` is a single conditional write: only an `available` slot moves to
///   `booked`. Losers get `SlotUnavailable`; unknown ids `SlotNotFound`.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn create_slots(
        &self,
        round_id: &RoundId,
        windows: Vec<SlotWindow>,
    ) -> StorageResult<Vec<SlotRecord>>;

    async fn available(&self, round_id: &RoundId) -> StorageResult<Vec<SlotRecord>>;

    async fn book(&self, slot_id: &SlotId, contestant_id: &ContestantId)
        -> StorageResult<SlotRecord>;
}

// ---------------------------------------------------------------------------
// ContestantRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub youtube: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantProfile {
    pub bio: Option<String>,
    pub social_links: SocialLinks,
}

/// Fields supplied when registering a contestant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContestant {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub song_preferences: Vec<String>,
    pub profile: ContestantProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantRecord {
    pub id: ContestantId,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub song_preferences: Vec<String>,
    pub profile: ContestantProfile,
    pub created_at: DateTime<Utc>,
}

impl ContestantRecord {
    pub fn from_new(id: ContestantId, new: NewContestant, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            name: new.name,
            email: new.email,
            song_preferences: new.song_preferences,
            profile: new.profile,
            created_at: now,
        }
    }
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContestantUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub song_preferences: Option<Vec<String>>,
    pub profile: Option<ContestantProfile>,
}

impl ContestantUpdate {
    pub fn apply_to(self, contestant: &mut ContestantRecord) {
        if let Some(name) = self.name {
            contestant.name = name;
        }
        if let Some(email) = self.email {
            contestant.email = email;
        }
        if let Some(song_preferences) = self.song_preferences {
            contestant.song_preferences = song_preferences;
        }
        if let Some(profile) = self.profile {
            contestant.profile = profile;
        }
    }
}

/// Contestant profile storage.
#[async_trait]
pub trait ContestantRegistry: Send + Sync {
    async fn register(&self, contestant: NewContestant) -> StorageResult<ContestantRecord>;

    async fn get(&self, id: &ContestantId) -> StorageResult<Option<ContestantRecord>>;

    /// Unknown ids fail with `ContestantNotFound`.
    async fn update_profile(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
    ) -> StorageResult<ContestantRecord>;
}
