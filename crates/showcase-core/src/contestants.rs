//! Contestant registration and profiles.

use std::collections::BTreeSet;
use std::sync::Arc;

use showcase_state::{
    ContestantId, ContestantRecord, ContestantRegistry, ContestantUpdate, NewContestant,
    PerformanceRegistry, RoundId,
};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::error::{Result, ShowcaseError};

pub struct ContestantService {
    contestants: Arc<dyn ContestantRegistry>,
    performances: Arc<dyn PerformanceRegistry>,
}

impl ContestantService {
    pub fn new(
        contestants: Arc<dyn ContestantRegistry>,
        performances: Arc<dyn PerformanceRegistry>,
    ) -> Self {
        Self {
            contestants,
            performances,
        }
    }

    #[instrument(skip_all, fields(user_id = %contestant.user_id))]
    pub async fn register(&self, contestant: NewContestant) -> Result<ContestantRecord> {
        let record = self
            .contestants
            .register(contestant)
            .await
            .map_err(|e| ShowcaseError::from_storage("register_contestant", e))?;
        info!(contestant_id = %record.id, "contestant registered");
        Ok(record)
    }

    pub async fn get_contestant(&self, contestant_id: &ContestantId) -> Result<ContestantRecord> {
        self.contestants
            .get(contestant_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("get_contestant", e))?
            .ok_or_else(|| ShowcaseError::ContestantNotFound {
                contestant_id: contestant_id.to_string(),
            })
    }

    pub async fn update_profile(
        &self,
        contestant_id: &ContestantId,
        update: ContestantUpdate,
    ) -> Result<ContestantRecord> {
        self.contestants
            .update_profile(contestant_id, update)
            .await
            .map_err(|e| ShowcaseError::from_storage("update_contestant", e))
    }

    /// Profiles of everyone with a performance in the round, ordered by id.
    ///
    /// Performances whose contestant has no profile are skipped.
    #[instrument(skip(self), fields(round_id = %round_id))]
    pub async fn contestants_by_round(&self, round_id: &RoundId) -> Result<Vec<ContestantRecord>> {
        let ids: BTreeSet<ContestantId> = self
            .performances
            .list_by_round(round_id)
            .await
            .map_err(|e| ShowcaseError::from_storage("list_performances", e))?
            .into_iter()
            .map(|p| p.contestant_id)
            .collect();

        let mut lookups = JoinSet::new();
        for id in ids {
            let contestants = Arc::clone(&self.contestants);
            lookups.spawn(async move { contestants.get(&id).await });
        }

        let mut found = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            let lookup = joined.map_err(|e| ShowcaseError::UpstreamReadFailure {
                operation: "get_contestant".to_string(),
                detail: e.to_string(),
            })?;
            match lookup.map_err(|e| ShowcaseError::from_storage("get_contestant", e))? {
                Some(contestant) => found.push(contestant),
                None => debug!("performance without a contestant profile"),
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}
