//! In-memory fakes for storage traits
//!
//! Provides `MemoryPerformanceRegistry`, `MemoryScoreStore`,
//! `MemoryVoteStore`, `MemoryRoundResultStore`, `MemoryMediaStore`,
//! `MemoryRoundRegistry`, `MemorySlotStore` and `MemoryContestantRegistry`
//! that satisfy the trait contracts without any external dependencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

fn lock<T>(m: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| StorageError::Backend("in-memory store lock poisoned".to_string()))
}

// ---------------------------------------------------------------------------
// MemoryPerformanceRegistry
// ---------------------------------------------------------------------------

/// In-memory performance registry backed by a `HashMap<id, record>`.
#[derive(Debug, Default)]
pub struct MemoryPerformanceRegistry {
    performances: Mutex<HashMap<PerformanceId, PerformanceRecord>>,
}

impl MemoryPerformanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PerformanceRegistry for MemoryPerformanceRegistry {
    async fn insert(&self, performance: NewPerformance) -> StorageResult<PerformanceRecord> {
        let record = PerformanceRecord::from_new(PerformanceId::generate(), performance, Utc::now());
        lock(&self.performances)?.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &PerformanceId) -> StorageResult<Option<PerformanceRecord>> {
        Ok(lock(&self.performances)?.get(id).cloned())
    }

    async fn list_by_round(&self, round_id: &RoundId) -> StorageResult<Vec<PerformanceRecord>> {
        Ok(lock(&self.performances)?
            .values()
            .filter(|p| &p.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: &PerformanceId,
        expected: PerformanceStatus,
        status: PerformanceStatus,
        notes: Option<String>,
    ) -> StorageResult<PerformanceRecord> {
        let mut performances = lock(&self.performances)?;
        let record = performances
            .get_mut(id)
            .ok_or_else(|| StorageError::PerformanceNotFound {
                performance_id: id.to_string(),
            })?;
        if record.status != expected {
            return Err(StorageError::StatusConflict {
                performance_id: id.to_string(),
                expected,
                found: record.status,
                requested: status,
            });
        }
        record.status = status;
        if notes.is_some() {
            record.notes = notes;
        }
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryScoreStore
// ---------------------------------------------------------------------------

/// In-memory score store keyed by `(judge, performance)`.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    scores: Mutex<HashMap<(JudgeId, PerformanceId), ScoreRecord>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn insert(&self, score: NewScore) -> StorageResult<ScoreRecord> {
        let mut scores = lock(&self.scores)?;
        let key = (score.judge_id.clone(), score.performance_id.clone());
        if scores.contains_key(&key) {
            return Err(StorageError::DuplicateScore {
                judge_id: score.judge_id.to_string(),
                performance_id: score.performance_id.to_string(),
            });
        }
        let record = ScoreRecord {
            id: ScoreId::generate(),
            performance_id: score.performance_id,
            judge_id: score.judge_id,
            criteria: score.criteria,
            comments: score.comments,
            submitted_at: Utc::now(),
        };
        scores.insert(key, record.clone());
        Ok(record)
    }

    async fn list_by_performance(
        &self,
        performance_id: &PerformanceId,
    ) -> StorageResult<Vec<ScoreRecord>> {
        Ok(lock(&self.scores)?
            .values()
            .filter(|s| &s.performance_id == performance_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryVoteStore
// ---------------------------------------------------------------------------

/// In-memory vote store keyed by the vote's composite identity.
///
/// The check and the insert happen under one lock through the map's entry
/// API, so concurrent duplicates cannot both succeed.
#[derive(Debug, Default)]
pub struct MemoryVoteStore {
    votes: Mutex<HashMap<String, VoteRecord>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn insert_unique(
        &self,
        voter_id: &VoterId,
        performance_id: &PerformanceId,
    ) -> StorageResult<VoteRecord> {
        use std::collections::hash_map::Entry;

        let key = VoteRecord::composite_key(voter_id, performance_id);
        let mut votes = lock(&self.votes)?;
        match votes.entry(key) {
            Entry::Occupied(_) => Err(StorageError::DuplicateVote {
                voter_id: voter_id.to_string(),
                performance_id: performance_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                let record = VoteRecord {
                    id: VoteId::generate(),
                    performance_id: performance_id.clone(),
                    voter_id: voter_id.clone(),
                    timestamp: Utc::now(),
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn count_by_performance(&self, performance_id: &PerformanceId) -> StorageResult<u64> {
        Ok(lock(&self.votes)?
            .values()
            .filter(|v| &v.performance_id == performance_id)
            .count() as u64)
    }

    async fn list_by_performance(
        &self,
        performance_id: &PerformanceId,
    ) -> StorageResult<Vec<VoteRecord>> {
        let mut votes: Vec<VoteRecord> = lock(&self.votes)?
            .values()
            .filter(|v| &v.performance_id == performance_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(votes)
    }
}

// ---------------------------------------------------------------------------
// MemoryRoundResultStore
// ---------------------------------------------------------------------------

/// In-memory round result store backed by `HashMap<round, Vec<result>>`.
///
/// Each round maps to its full history (oldest first internally).
#[derive(Debug, Default)]
pub struct MemoryRoundResultStore {
    results: Mutex<HashMap<RoundId, Vec<RoundResultRecord>>>,
}

impl MemoryRoundResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoundResultStore for MemoryRoundResultStore {
    async fn append(
        &self,
        round_id: &RoundId,
        results: Vec<RankedEntry>,
        generated_at: DateTime<Utc>,
    ) -> StorageResult<RoundResultRecord> {
        let mut all = lock(&self.results)?;
        let history = all.entry(round_id.clone()).or_default();
        let version = history.last().map(|r| r.version + 1).unwrap_or(1);
        let record = RoundResultRecord {
            id: ResultId::generate(),
            round_id: round_id.clone(),
            version,
            results,
            generated_at,
        };
        history.push(record.clone());
        Ok(record)
    }

    async fn latest(&self, round_id: &RoundId) -> StorageResult<Option<RoundResultRecord>> {
        Ok(lock(&self.results)?
            .get(round_id)
            .and_then(|h| h.last().cloned()))
    }

    async fn history(&self, round_id: &RoundId) -> StorageResult<Vec<RoundResultRecord>> {
        let mut history = lock(&self.results)?
            .get(round_id)
            .cloned()
            .unwrap_or_default();
        history.reverse(); // newest first
        Ok(history)
    }

    async fn get(&self, id: &ResultId) -> StorageResult<Option<RoundResultRecord>> {
        Ok(lock(&self.results)?
            .values()
            .flatten()
            .find(|r| &r.id == id)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryMediaStore
// ---------------------------------------------------------------------------

/// In-memory media store; URLs use the `memory://` scheme.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently stored, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.blobs
            .lock()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, path: &str, data: &[u8]) -> StorageResult<String> {
        lock(&self.blobs)?.insert(path.to_string(), data.to_vec());
        Ok(format!("memory://{path}"))
    }

    async fn fetch(&self, path: &str) -> StorageResult<Vec<u8>> {
        lock(&self.blobs)?
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::MediaNotFound {
                path: path.to_string(),
            })
    }

    async fn remove(&self, path: &str) -> StorageResult<()> {
        lock(&self.blobs)?
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::MediaNotFound {
                path: path.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryRoundRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryRoundRegistry {
    rounds: Mutex<HashMap<RoundId, RoundRecord>>,
}

impl MemoryRoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoundRegistry for MemoryRoundRegistry {
    async fn create(&self, round: NewRound) -> StorageResult<RoundRecord> {
        let record = RoundRecord::from_new(RoundId::generate(), round, Utc::now());
        lock(&self.rounds)?.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &RoundId) -> StorageResult<Option<RoundRecord>> {
        Ok(lock(&self.rounds)?.get(id).cloned())
    }

    async fn update(&self, id: &RoundId, update: RoundUpdate) -> StorageResult<RoundRecord> {
        let mut rounds = lock(&self.rounds)?;
        let record = rounds.get_mut(id).ok_or_else(|| StorageError::RoundNotFound {
            round_id: id.to_string(),
        })?;
        update.apply_to(record);
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// MemorySlotStore
// ---------------------------------------------------------------------------

/// In-memory slot store; booking checks and flips status under one lock.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<SlotId, SlotRecord>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn create_slots(
        &self,
        round_id: &RoundId,
        windows: Vec<SlotWindow>,
    ) -> StorageResult<Vec<SlotRecord>> {
        let created: Vec<SlotRecord> = windows
            .into_iter()
            .map(|w| SlotRecord {
                id: SlotId::generate(),
                round_id: round_id.clone(),
                start_time: w.start_time,
                end_time: w.end_time,
                status: SlotStatus::Available,
                contestant_id: None,
            })
            .collect();
        let mut slots = lock(&self.slots)?;
        for slot in &created {
            slots.insert(slot.id.clone(), slot.clone());
        }
        Ok(created)
    }

    async fn available(&self, round_id: &RoundId) -> StorageResult<Vec<SlotRecord>> {
        let mut open: Vec<SlotRecord> = lock(&self.slots)?
            .values()
            .filter(|s| &s.round_id == round_id && s.status == SlotStatus::Available)
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(open)
    }

    async fn book(
        &self,
        slot_id: &SlotId,
        contestant_id: &ContestantId,
    ) -> StorageResult<SlotRecord> {
        let mut slots = lock(&self.slots)?;
        let slot = slots
            .get_mut(slot_id)
            .ok_or_else(|| StorageError::SlotNotFound {
                slot_id: slot_id.to_string(),
            })?;
        if slot.status != SlotStatus::Available {
            return Err(StorageError::SlotUnavailable {
                slot_id: slot_id.to_string(),
                status: slot.status,
            });
        }
        slot.status = SlotStatus::Booked;
        slot.contestant_id = Some(contestant_id.clone());
        Ok(slot.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryContestantRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryContestantRegistry {
    contestants: Mutex<HashMap<ContestantId, ContestantRecord>>,
}

impl MemoryContestantRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContestantRegistry for MemoryContestantRegistry {
    async fn register(&self, contestant: NewContestant) -> StorageResult<ContestantRecord> {
        let record = ContestantRecord::from_new(ContestantId::generate(), contestant, Utc::now());
        lock(&self.contestants)?.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &ContestantId) -> StorageResult<Option<ContestantRecord>> {
        Ok(lock(&self.contestants)?.get(id).cloned())
    }

    async fn update_profile(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
    ) -> StorageResult<ContestantRecord> {
        let mut contestants = lock(&self.contestants)?;
        let record = contestants
            .get_mut(id)
            .ok_or_else(|| StorageError::ContestantNotFound {
                contestant_id: id.to_string(),
            })?;
        update.apply_to(record);
        Ok(record.clone())
    }
}
