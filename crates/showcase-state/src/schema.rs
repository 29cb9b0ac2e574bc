//! Row shapes for the showcase SurrealDB tables
//!
//! Tables:
//! - performances: submitted entries, keyed by `performance_id`
//! - scores: judge scores, unique on (judge_id, performance_id)
//! - votes: audience votes, record id derived from (voter, performance)
//! - round_results: versioned standings, unique on (round_id, version)
//! - rounds: round metadata, keyed by `round_id`
//! - performance_slots: bookable slots, keyed by `slot_id`
//! - contestants: contestant profiles, keyed by `contestant_id`
//!
//! Rows carry their own string id field; the SurrealDB record id is never
//! read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use surrealdb::sql::Datetime as SurrealDatetime;

use crate::storage_traits::{
    ContentDigest, ContestantId, ContestantProfile, ContestantRecord, ContestantUpdate, JudgeId,
    MediaType, PerformanceId, PerformanceRecord, PerformanceStatus, RankedEntry, ResultId,
    RoundId, RoundRecord, RoundResultRecord, RoundStatus, RoundUpdate, ScoreCriteria, ScoreId,
    ScoreRecord, SlotId, SlotRecord, SlotStatus, VoteId, VoteRecord, VoterId,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Same as `surreal_datetime` for optional fields.
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = date.map(SurrealDatetime::from);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

// ---------------------------------------------------------------------------
// performances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub performance_id: String,
    pub contestant_id: String,
    pub round_id: String,
    pub slot_id: Option<String>,
    pub media_url: String,
    pub media_digest: String,
    pub media_type: MediaType,
    pub song_title: String,
    pub artist: String,
    pub status: PerformanceStatus,
    #[serde(with = "surreal_datetime")]
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl From<&PerformanceRecord> for PerformanceRow {
    fn from(p: &PerformanceRecord) -> Self {
        Self {
            performance_id: p.id.0.clone(),
            contestant_id: p.contestant_id.0.clone(),
            round_id: p.round_id.0.clone(),
            slot_id: p.slot_id.clone(),
            media_url: p.media_url.clone(),
            media_digest: p.media_digest.as_str().to_string(),
            media_type: p.media_type,
            song_title: p.song_title.clone(),
            artist: p.artist.clone(),
            status: p.status,
            submitted_at: p.submitted_at,
            notes: p.notes.clone(),
        }
    }
}

impl PerformanceRow {
    pub fn into_record(self) -> crate::StorageResult<PerformanceRecord> {
        Ok(PerformanceRecord {
            id: PerformanceId(self.performance_id),
            contestant_id: ContestantId(self.contestant_id),
            round_id: RoundId(self.round_id),
            slot_id: self.slot_id,
            media_url: self.media_url,
            media_digest: ContentDigest::try_from(self.media_digest)?,
            media_type: self.media_type,
            song_title: self.song_title,
            artist: self.artist,
            status: self.status,
            submitted_at: self.submitted_at,
            notes: self.notes,
        })
    }
}

// ---------------------------------------------------------------------------
// scores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRow {
    pub score_id: String,
    pub performance_id: String,
    pub judge_id: String,
    pub pitch: f64,
    pub tone: f64,
    pub stage_presence: f64,
    pub overall: f64,
    pub comments: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub submitted_at: DateTime<Utc>,
}

impl From<&ScoreRecord> for ScoreRow {
    fn from(s: &ScoreRecord) -> Self {
        Self {
            score_id: s.id.0.clone(),
            performance_id: s.performance_id.0.clone(),
            judge_id: s.judge_id.0.clone(),
            pitch: s.criteria.pitch,
            tone: s.criteria.tone,
            stage_presence: s.criteria.stage_presence,
            overall: s.criteria.overall,
            comments: s.comments.clone(),
            submitted_at: s.submitted_at,
        }
    }
}

impl From<ScoreRow> for ScoreRecord {
    fn from(row: ScoreRow) -> Self {
        ScoreRecord {
            id: ScoreId(row.score_id),
            performance_id: PerformanceId(row.performance_id),
            judge_id: JudgeId(row.judge_id),
            criteria: ScoreCriteria {
                pitch: row.pitch,
                tone: row.tone,
                stage_presence: row.stage_presence,
                overall: row.overall,
            },
            comments: row.comments,
            submitted_at: row.submitted_at,
        }
    }
}

// ---------------------------------------------------------------------------
// votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRow {
    pub vote_id: String,
    pub vote_key: String,
    pub performance_id: String,
    pub voter_id: String,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl From<&VoteRecord> for VoteRow {
    fn from(v: &VoteRecord) -> Self {
        Self {
            vote_id: v.id.0.clone(),
            vote_key: VoteRecord::composite_key(&v.voter_id, &v.performance_id),
            performance_id: v.performance_id.0.clone(),
            voter_id: v.voter_id.0.clone(),
            timestamp: v.timestamp,
        }
    }
}

impl From<VoteRow> for VoteRecord {
    fn from(row: VoteRow) -> Self {
        VoteRecord {
            id: VoteId(row.vote_id),
            performance_id: PerformanceId(row.performance_id),
            voter_id: VoterId(row.voter_id),
            timestamp: row.timestamp,
        }
    }
}

/// Row shape of `SELECT count() ... GROUP ALL`.
#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub count: u64,
}

// ---------------------------------------------------------------------------
// round_results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResultRow {
    pub result_id: String,
    pub round_id: String,
    pub version: u32,
    pub results: Vec<RankedEntry>,
    #[serde(with = "surreal_datetime")]
    pub generated_at: DateTime<Utc>,
}

impl From<&RoundResultRecord> for RoundResultRow {
    fn from(r: &RoundResultRecord) -> Self {
        Self {
            result_id: r.id.0.clone(),
            round_id: r.round_id.0.clone(),
            version: r.version,
            results: r.results.clone(),
            generated_at: r.generated_at,
        }
    }
}

impl From<RoundResultRow> for RoundResultRecord {
    fn from(row: RoundResultRow) -> Self {
        RoundResultRecord {
            id: ResultId(row.result_id),
            round_id: RoundId(row.round_id),
            version: row.version,
            results: row.results,
            generated_at: row.generated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// rounds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRow {
    pub round_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub end_date: DateTime<Utc>,
    pub status: RoundStatus,
    pub max_contestants: u32,
    pub judge_ids: Vec<String>,
    pub voting_enabled: bool,
    #[serde(default, with = "surreal_datetime_opt")]
    pub voting_start: Option<DateTime<Utc>>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub voting_end: Option<DateTime<Utc>>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl From<&RoundRecord> for RoundRow {
    fn from(r: &RoundRecord) -> Self {
        Self {
            round_id: r.id.0.clone(),
            name: r.name.clone(),
            description: r.description.clone(),
            start_date: r.start_date,
            end_date: r.end_date,
            status: r.status,
            max_contestants: r.max_contestants,
            judge_ids: r.judge_ids.iter().map(|j| j.0.clone()).collect(),
            voting_enabled: r.voting_enabled,
            voting_start: r.voting_start,
            voting_end: r.voting_end,
            created_at: r.created_at,
            created_by: r.created_by.clone(),
        }
    }
}

impl From<RoundRow> for RoundRecord {
    fn from(row: RoundRow) -> Self {
        RoundRecord {
            id: RoundId(row.round_id),
            name: row.name,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status,
            max_contestants: row.max_contestants,
            judge_ids: row.judge_ids.into_iter().map(JudgeId).collect(),
            voting_enabled: row.voting_enabled,
            voting_start: row.voting_start,
            voting_end: row.voting_end,
            created_at: row.created_at,
            created_by: row.created_by,
        }
    }
}

/// `MERGE` payload for a partial round update; unset fields are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct RoundPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<SurrealDatetime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<SurrealDatetime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RoundStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_contestants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting_start: Option<SurrealDatetime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting_end: Option<SurrealDatetime>,
}

impl From<RoundUpdate> for RoundPatch {
    fn from(u: RoundUpdate) -> Self {
        Self {
            name: u.name,
            description: u.description,
            start_date: u.start_date.map(SurrealDatetime::from),
            end_date: u.end_date.map(SurrealDatetime::from),
            status: u.status,
            max_contestants: u.max_contestants,
            judge_ids: u
                .judge_ids
                .map(|ids| ids.into_iter().map(|j| j.0).collect()),
            voting_enabled: u.voting_enabled,
            voting_start: u.voting_start.map(SurrealDatetime::from),
            voting_end: u.voting_end.map(SurrealDatetime::from),
        }
    }
}

// ---------------------------------------------------------------------------
// performance_slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRow {
    pub slot_id: String,
    pub round_id: String,
    #[serde(with = "surreal_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub contestant_id: Option<String>,
}

impl From<&SlotRecord> for SlotRow {
    fn from(s: &SlotRecord) -> Self {
        Self {
            slot_id: s.id.0.clone(),
            round_id: s.round_id.0.clone(),
            start_time: s.start_time,
            end_time: s.end_time,
            status: s.status,
            contestant_id: s.contestant_id.as_ref().map(|c| c.0.clone()),
        }
    }
}

impl From<SlotRow> for SlotRecord {
    fn from(row: SlotRow) -> Self {
        SlotRecord {
            id: SlotId(row.slot_id),
            round_id: RoundId(row.round_id),
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
            contestant_id: row.contestant_id.map(ContestantId),
        }
    }
}

// ---------------------------------------------------------------------------
// contestants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestantRow {
    pub contestant_id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub song_preferences: Vec<String>,
    pub profile: ContestantProfile,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<&ContestantRecord> for ContestantRow {
    fn from(c: &ContestantRecord) -> Self {
        Self {
            contestant_id: c.id.0.clone(),
            user_id: c.user_id.clone(),
            name: c.name.clone(),
            email: c.email.clone(),
            song_preferences: c.song_preferences.clone(),
            profile: c.profile.clone(),
            created_at: c.created_at,
        }
    }
}

impl From<ContestantRow> for ContestantRecord {
    fn from(row: ContestantRow) -> Self {
        ContestantRecord {
            id: ContestantId(row.contestant_id),
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            song_preferences: row.song_preferences,
            profile: row.profile,
            created_at: row.created_at,
        }
    }
}

/// `MERGE` payload for a partial profile update.
#[derive(Debug, Clone, Serialize)]
pub struct ContestantPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_preferences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ContestantProfile>,
}

impl From<ContestantUpdate> for ContestantPatch {
    fn from(u: ContestantUpdate) -> Self {
        Self {
            name: u.name,
            email: u.email,
            song_preferences: u.song_preferences,
            profile: u.profile,
        }
    }
}
