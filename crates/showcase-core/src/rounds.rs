//! Round setup: metadata, judge panel, voting window and performance slots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use showcase_state::{
    ContestantId, NewRound, RoundId, RoundRecord, RoundRegistry, RoundUpdate, SlotId, SlotRecord,
    SlotStore, SlotWindow,
};
use tracing::{info, instrument};

use crate::error::{Result, ShowcaseError};

pub struct RoundService {
    rounds: Arc<dyn RoundRegistry>,
    slots: Arc<dyn SlotStore>,
}

impl RoundService {
    pub fn new(rounds: Arc<dyn RoundRegistry>, slots: Arc<dyn SlotStore>) -> Self {
        Self { rounds, slots }
    }

    #[instrument(skip(self, round), fields(name = %round.name))]
    pub async fn create_round(&self, round: NewRound) -> Result<RoundRecord> {
        if round.name.trim().is_empty() {
            return Err(ShowcaseError::InvalidRound("round name is empty".to_string()));
        }
        check_windows(
            round.start_date,
            round.end_date,
            round.voting_start,
            round.voting_end,
        )?;

        let record = self
            .rounds
            .create(round)
            .await
            .map_err(|e| ShowcaseError::from_storage("create_round", e))?;
        info!(round_id = %record.id, status = %record.status, "round created");
        Ok(record)
    }

    pub async fn get_round(&self, round_id: &RoundId) -> Result<RoundRecord> {
        self.rounds
            .get(round_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("get_round", e))?
            .ok_or_else(|| ShowcaseError::RoundNotFound {
                round_id: round_id.to_string(),
            })
    }

    /// Apply a partial update, refusing one that would leave the round's
    /// schedule or voting window inverted.
    #[instrument(skip(self, update), fields(round_id = %round_id))]
    pub async fn update_round(&self, round_id: &RoundId, update: RoundUpdate) -> Result<RoundRecord> {
        let mut preview = self.get_round(round_id).await?;
        update.clone().apply_to(&mut preview);
        if preview.name.trim().is_empty() {
            return Err(ShowcaseError::InvalidRound("round name is empty".to_string()));
        }
        check_windows(
            preview.start_date,
            preview.end_date,
            preview.voting_start,
            preview.voting_end,
        )?;

        self.rounds
            .update(round_id, update)
            .await
            .map_err(|e| ShowcaseError::from_storage("update_round", e))
    }

    /// Whether the round accepts audience votes at `now`.
    pub async fn is_voting_open(&self, round_id: &RoundId, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.get_round(round_id).await?.is_voting_open(now))
    }

    /// Open every window as an `available` slot of an existing round.
    #[instrument(skip(self, windows), fields(round_id = %round_id, slots = windows.len()))]
    pub async fn create_performance_slots(
        &self,
        round_id: &RoundId,
        windows: Vec<SlotWindow>,
    ) -> Result<Vec<SlotRecord>> {
        self.get_round(round_id).await?;
        if let Some(bad) = windows.iter().find(|w| w.end_time <= w.start_time) {
            return Err(ShowcaseError::InvalidRound(format!(
                "slot starting {} does not end after it starts",
                bad.start_time.to_rfc3339()
            )));
        }

        self.slots
            .create_slots(round_id, windows)
            .await
            .map_err(|e| ShowcaseError::from_storage("create_slots", e))
    }

    /// Available slots of the round, earliest first.
    pub async fn available_slots(&self, round_id: &RoundId) -> Result<Vec<SlotRecord>> {
        self.slots
            .available(round_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("list_slots", e))
    }

    /// Claim an available slot for a contestant; a taken slot fails with
    /// `SlotUnavailable`.
    #[instrument(skip(self), fields(slot_id = %slot_id, contestant_id = %contestant_id))]
    pub async fn book_slot(
        &self,
        slot_id: &SlotId,
        contestant_id: &ContestantId,
    ) -> Result<SlotRecord> {
        let slot = self
            .slots
            .book(slot_id, contestant_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("book_slot", e))?;
        info!(round_id = %slot.round_id, "slot booked");
        Ok(slot)
    }
}

fn check_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    voting_start: Option<DateTime<Utc>>,
    voting_end: Option<DateTime<Utc>>,
) -> Result<()> {
    if end <= start {
        return Err(ShowcaseError::InvalidRound(
            "round ends before it starts".to_string(),
        ));
    }
    if let (Some(opens), Some(closes)) = (voting_start, voting_end) {
        if closes <= opens {
            return Err(ShowcaseError::InvalidRound(
                "voting closes before it opens".to_string(),
            ));
        }
    }
    Ok(())
}
