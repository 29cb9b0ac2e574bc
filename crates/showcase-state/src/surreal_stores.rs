//! SurrealDB-backed implementations of the storage traits
//!
//! Uses the row shapes in `schema`, converting to/from `storage_traits`
//! types at the boundary. Uniqueness is enforced by the database: votes are
//! created under a record id derived from (voter, performance), and the
//! UNIQUE indexes defined in `migrations` reject duplicate scores and result
//! versions. Status changes and slot bookings are conditional UPDATEs that
//! only match rows still in the expected state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::schema::{
    ContestantPatch, ContestantRow, CountRow, PerformanceRow, RoundPatch, RoundResultRow, RoundRow,
    ScoreRow, SlotRow, VoteRow,
};
use crate::storage_traits::*;
use crate::SurrealHandle;

fn backend(err: surrealdb::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Record-id collisions report "already exists"; UNIQUE index hits report
/// "already contains".
fn is_unique_violation(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("already exists") || msg.contains("already contains")
}

/// Optimistic transactions that lose a race on the same key report a
/// read or write conflict.
fn is_write_conflict(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("conflict") && msg.contains("retried")
}

/// Attempts at a vote create before giving up on repeated write conflicts.
const VOTE_WRITE_ATTEMPTS: usize = 3;

#[async_trait]
impl PerformanceRegistry for SurrealHandle {
    #[instrument(skip_all, fields(round_id = %performance.round_id))]
    async fn insert(&self, performance: NewPerformance) -> StorageResult<PerformanceRecord> {
        let record = PerformanceRecord::from_new(PerformanceId::generate(), performance, Utc::now());
        debug!(performance_id = %record.id, "creating performance");

        let _created: Option<PerformanceRow> = self
            .db
            .create("performances")
            .content(PerformanceRow::from(&record))
            .await
            .map_err(backend)?;

        Ok(record)
    }

    async fn get(&self, id: &PerformanceId) -> StorageResult<Option<PerformanceRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM performances WHERE performance_id = $pid")
            .bind(("pid", id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<PerformanceRow> = res.take(0).map_err(backend)?;
        rows.into_iter().next().map(PerformanceRow::into_record).transpose()
    }

    async fn list_by_round(&self, round_id: &RoundId) -> StorageResult<Vec<PerformanceRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM performances WHERE round_id = $rid")
            .bind(("rid", round_id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<PerformanceRow> = res.take(0).map_err(backend)?;
        rows.into_iter().map(PerformanceRow::into_record).collect()
    }

    #[instrument(skip(self, notes), fields(performance_id = %id, expected = %expected, status = %status))]
    async fn update_status(
        &self,
        id: &PerformanceId,
        expected: PerformanceStatus,
        status: PerformanceStatus,
        notes: Option<String>,
    ) -> StorageResult<PerformanceRecord> {
        let pid = id.0.clone();
        let updated = match notes {
            Some(notes) => {
                self.db
                    .query(
                        "UPDATE performances SET status = $status, notes = $notes \
                         WHERE performance_id = $pid AND status = $expected RETURN AFTER",
                    )
                    .bind(("status", status))
                    .bind(("notes", notes))
                    .bind(("pid", pid))
                    .bind(("expected", expected))
                    .await
            }
            None => {
                self.db
                    .query(
                        "UPDATE performances SET status = $status \
                         WHERE performance_id = $pid AND status = $expected RETURN AFTER",
                    )
                    .bind(("status", status))
                    .bind(("pid", pid))
                    .bind(("expected", expected))
                    .await
            }
        };

        let rows: Vec<PerformanceRow> = match updated.and_then(|mut res| res.take(0)) {
            Ok(rows) => rows,
            Err(e) if is_write_conflict(&e) => Vec::new(),
            Err(e) => return Err(backend(e)),
        };

        match rows.into_iter().next() {
            Some(row) => row.into_record(),
            None => {
                // Nothing matched: either the id is unknown or another writer
                // moved the status first.
                let current = PerformanceRegistry::get(self, id).await?.ok_or_else(|| {
                    StorageError::PerformanceNotFound {
                        performance_id: id.to_string(),
                    }
                })?;
                if current.status == expected {
                    return Err(StorageError::Backend(format!(
                        "status update of {id} conflicted without a competing change"
                    )));
                }
                Err(StorageError::StatusConflict {
                    performance_id: id.to_string(),
                    expected,
                    found: current.status,
                    requested: status,
                })
            }
        }
    }
}

#[async_trait]
impl ScoreStore for SurrealHandle {
    #[instrument(skip_all, fields(judge_id = %score.judge_id, performance_id = %score.performance_id))]
    async fn insert(&self, score: NewScore) -> StorageResult<ScoreRecord> {
        let record = ScoreRecord {
            id: ScoreId::generate(),
            performance_id: score.performance_id,
            judge_id: score.judge_id,
            criteria: score.criteria,
            comments: score.comments,
            submitted_at: Utc::now(),
        };

        let created: Result<Option<ScoreRow>, surrealdb::Error> = self
            .db
            .create("scores")
            .content(ScoreRow::from(&record))
            .await;

        match created {
            Ok(_) => Ok(record),
            Err(e) if is_unique_violation(&e) => Err(StorageError::DuplicateScore {
                judge_id: record.judge_id.to_string(),
                performance_id: record.performance_id.to_string(),
            }),
            Err(e) => Err(backend(e)),
        }
    }

    async fn list_by_performance(
        &self,
        performance_id: &PerformanceId,
    ) -> StorageResult<Vec<ScoreRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM scores WHERE performance_id = $pid")
            .bind(("pid", performance_id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<ScoreRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(ScoreRecord::from).collect())
    }
}

#[async_trait]
impl VoteStore for SurrealHandle {
    #[instrument(skip_all, fields(voter_id = %voter_id, performance_id = %performance_id))]
    async fn insert_unique(
        &self,
        voter_id: &VoterId,
        performance_id: &PerformanceId,
    ) -> StorageResult<VoteRecord> {
        let record = VoteRecord {
            id: VoteId::generate(),
            performance_id: performance_id.clone(),
            voter_id: voter_id.clone(),
            timestamp: Utc::now(),
        };
        let row = VoteRow::from(&record);
        let duplicate = || StorageError::DuplicateVote {
            voter_id: voter_id.to_string(),
            performance_id: performance_id.to_string(),
        };

        // Single conditional write: creating an existing record id fails.
        // Concurrent creates of the same id may instead surface as a
        // transaction conflict; the record then exists once the winner
        // commits.
        for attempt in 1..=VOTE_WRITE_ATTEMPTS {
            let created: Result<Option<VoteRow>, surrealdb::Error> = self
                .db
                .create(("votes", row.vote_key.clone()))
                .content(row.clone())
                .await;

            match created {
                Ok(_) => return Ok(record),
                Err(e) if is_unique_violation(&e) => return Err(duplicate()),
                Err(e) if is_write_conflict(&e) => {
                    let existing: Option<VoteRow> = self
                        .db
                        .select(("votes", row.vote_key.clone()))
                        .await
                        .map_err(backend)?;
                    if existing.is_some() {
                        return Err(duplicate());
                    }
                    debug!(attempt, "vote write conflicted before any vote landed");
                }
                Err(e) => return Err(backend(e)),
            }
        }

        Err(StorageError::Backend(format!(
            "vote by {voter_id} for {performance_id} kept conflicting after {VOTE_WRITE_ATTEMPTS} attempts"
        )))
    }

    async fn count_by_performance(&self, performance_id: &PerformanceId) -> StorageResult<u64> {
        let mut res = self
            .db
            .query("SELECT count() AS count FROM votes WHERE performance_id = $pid GROUP ALL")
            .bind(("pid", performance_id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<CountRow> = res.take(0).map_err(backend)?;
        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }

    async fn list_by_performance(
        &self,
        performance_id: &PerformanceId,
    ) -> StorageResult<Vec<VoteRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM votes WHERE performance_id = $pid ORDER BY timestamp ASC")
            .bind(("pid", performance_id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<VoteRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(VoteRecord::from).collect())
    }
}

#[async_trait]
impl RoundResultStore for SurrealHandle {
    #[instrument(skip(self, results), fields(round_id = %round_id, entries = results.len()))]
    async fn append(
        &self,
        round_id: &RoundId,
        results: Vec<RankedEntry>,
        generated_at: DateTime<Utc>,
    ) -> StorageResult<RoundResultRecord> {
        let version = self
            .latest(round_id)
            .await?
            .map(|r| r.version + 1)
            .unwrap_or(1);

        let record = RoundResultRecord {
            id: ResultId::generate(),
            round_id: round_id.clone(),
            version,
            results,
            generated_at,
        };

        let created: Result<Option<RoundResultRow>, surrealdb::Error> = self
            .db
            .create("round_results")
            .content(RoundResultRow::from(&record))
            .await;

        match created {
            Ok(_) => {
                debug!(result_id = %record.id, version, "round result stored");
                Ok(record)
            }
            Err(e) if is_unique_violation(&e) => Err(StorageError::ResultVersionConflict {
                round_id: round_id.to_string(),
                version,
            }),
            Err(e) => Err(backend(e)),
        }
    }

    async fn latest(&self, round_id: &RoundId) -> StorageResult<Option<RoundResultRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM round_results WHERE round_id = $rid ORDER BY version DESC LIMIT 1")
            .bind(("rid", round_id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<RoundResultRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(RoundResultRecord::from))
    }

    async fn history(&self, round_id: &RoundId) -> StorageResult<Vec<RoundResultRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM round_results WHERE round_id = $rid ORDER BY version DESC")
            .bind(("rid", round_id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<RoundResultRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(RoundResultRecord::from).collect())
    }

    async fn get(&self, id: &ResultId) -> StorageResult<Option<RoundResultRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM round_results WHERE result_id = $id")
            .bind(("id", id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<RoundResultRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(RoundResultRecord::from))
    }
}

#[async_trait]
impl RoundRegistry for SurrealHandle {
    #[instrument(skip_all, fields(name = %round.name))]
    async fn create(&self, round: NewRound) -> StorageResult<RoundRecord> {
        let record = RoundRecord::from_new(RoundId::generate(), round, Utc::now());
        debug!(round_id = %record.id, "creating round");

        let _created: Option<RoundRow> = self
            .db
            .create("rounds")
            .content(RoundRow::from(&record))
            .await
            .map_err(backend)?;

        Ok(record)
    }

    async fn get(&self, id: &RoundId) -> StorageResult<Option<RoundRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM rounds WHERE round_id = $rid")
            .bind(("rid", id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<RoundRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(RoundRecord::from))
    }

    #[instrument(skip(self, update), fields(round_id = %id))]
    async fn update(&self, id: &RoundId, update: RoundUpdate) -> StorageResult<RoundRecord> {
        let mut res = self
            .db
            .query("UPDATE rounds MERGE $patch WHERE round_id = $rid RETURN AFTER")
            .bind(("patch", RoundPatch::from(update)))
            .bind(("rid", id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<RoundRow> = res.take(0).map_err(backend)?;
        rows.into_iter()
            .next()
            .map(RoundRecord::from)
            .ok_or_else(|| StorageError::RoundNotFound {
                round_id: id.to_string(),
            })
    }
}

#[async_trait]
impl SlotStore for SurrealHandle {
    #[instrument(skip(self, windows), fields(round_id = %round_id, slots = windows.len()))]
    async fn create_slots(
        &self,
        round_id: &RoundId,
        windows: Vec<SlotWindow>,
    ) -> StorageResult<Vec<SlotRecord>> {
        let mut created = Vec::with_capacity(windows.len());
        for window in windows {
            let record = SlotRecord {
                id: SlotId::generate(),
                round_id: round_id.clone(),
                start_time: window.start_time,
                end_time: window.end_time,
                status: SlotStatus::Available,
                contestant_id: None,
            };
            let _row: Option<SlotRow> = self
                .db
                .create("performance_slots")
                .content(SlotRow::from(&record))
                .await
                .map_err(backend)?;
            created.push(record);
        }
        Ok(created)
    }

    async fn available(&self, round_id: &RoundId) -> StorageResult<Vec<SlotRecord>> {
        let mut res = self
            .db
            .query(
                "SELECT * FROM performance_slots WHERE round_id = $rid AND status = $status \
                 ORDER BY start_time ASC, slot_id ASC",
            )
            .bind(("rid", round_id.0.clone()))
            .bind(("status", SlotStatus::Available))
            .await
            .map_err(backend)?;

        let rows: Vec<SlotRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(SlotRecord::from).collect())
    }

    #[instrument(skip(self), fields(slot_id = %slot_id, contestant_id = %contestant_id))]
    async fn book(
        &self,
        slot_id: &SlotId,
        contestant_id: &ContestantId,
    ) -> StorageResult<SlotRecord> {
        let updated = self
            .db
            .query(
                "UPDATE performance_slots SET status = $booked, contestant_id = $cid \
                 WHERE slot_id = $sid AND status = $available RETURN AFTER",
            )
            .bind(("booked", SlotStatus::Booked))
            .bind(("available", SlotStatus::Available))
            .bind(("cid", contestant_id.0.clone()))
            .bind(("sid", slot_id.0.clone()))
            .await;

        let rows: Vec<SlotRow> = match updated.and_then(|mut res| res.take(0)) {
            Ok(rows) => rows,
            Err(e) if is_write_conflict(&e) => Vec::new(),
            Err(e) => return Err(backend(e)),
        };
        if let Some(row) = rows.into_iter().next() {
            return Ok(SlotRecord::from(row));
        }

        let mut res = self
            .db
            .query("SELECT * FROM performance_slots WHERE slot_id = $sid")
            .bind(("sid", slot_id.0.clone()))
            .await
            .map_err(backend)?;
        let current: Vec<SlotRow> = res.take(0).map_err(backend)?;
        match current.into_iter().next() {
            Some(row) => Err(StorageError::SlotUnavailable {
                slot_id: slot_id.to_string(),
                status: row.status,
            }),
            None => Err(StorageError::SlotNotFound {
                slot_id: slot_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ContestantRegistry for SurrealHandle {
    #[instrument(skip_all, fields(user_id = %contestant.user_id))]
    async fn register(&self, contestant: NewContestant) -> StorageResult<ContestantRecord> {
        let record = ContestantRecord::from_new(ContestantId::generate(), contestant, Utc::now());
        debug!(contestant_id = %record.id, "registering contestant");

        let _created: Option<ContestantRow> = self
            .db
            .create("contestants")
            .content(ContestantRow::from(&record))
            .await
            .map_err(backend)?;

        Ok(record)
    }

    async fn get(&self, id: &ContestantId) -> StorageResult<Option<ContestantRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM contestants WHERE contestant_id = $cid")
            .bind(("cid", id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<ContestantRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(ContestantRecord::from))
    }

    #[instrument(skip(self, update), fields(contestant_id = %id))]
    async fn update_profile(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
    ) -> StorageResult<ContestantRecord> {
        let mut res = self
            .db
            .query("UPDATE contestants MERGE $patch WHERE contestant_id = $cid RETURN AFTER")
            .bind(("patch", ContestantPatch::from(update)))
            .bind(("cid", id.0.clone()))
            .await
            .map_err(backend)?;

        let rows: Vec<ContestantRow> = res.take(0).map_err(backend)?;
        rows.into_iter()
            .next()
            .map(ContestantRecord::from)
            .ok_or_else(|| StorageError::ContestantNotFound {
                contestant_id: id.to_string(),
            })
    }
}
