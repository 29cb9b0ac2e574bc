//! Round setup, performance slots and the audience voting window.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use showcase_core::showcase_state::fakes::{
    MemoryPerformanceRegistry, MemoryRoundRegistry, MemorySlotStore, MemoryVoteStore,
};
use showcase_core::showcase_state::storage_traits::*;
use showcase_core::showcase_state::SurrealHandle;
use showcase_core::{RoundService, ShowcaseError, VotingService};

fn auditions() -> NewRound {
    NewRound {
        name: "Auditions".to_string(),
        description: None,
        start_date: Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap(),
        status: RoundStatus::Upcoming,
        max_contestants: 12,
        judge_ids: vec!["judge-a".into()],
        voting_enabled: false,
        voting_start: None,
        voting_end: None,
        created_by: "host".to_string(),
    }
}

fn window(hour: u32) -> SlotWindow {
    SlotWindow {
        start_time: Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 6, 1, hour, 15, 0).unwrap(),
    }
}

fn memory_rounds() -> RoundService {
    RoundService::new(
        Arc::new(MemoryRoundRegistry::new()),
        Arc::new(MemorySlotStore::new()),
    )
}

#[tokio::test]
async fn create_get_and_update_round() {
    let service = memory_rounds();
    let round = service.create_round(auditions()).await.unwrap();
    assert_eq!(service.get_round(&round.id).await.unwrap(), round);

    let updated = service
        .update_round(
            &round.id,
            RoundUpdate {
                status: Some(RoundStatus::Active),
                voting_enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, RoundStatus::Active);
    assert!(service.is_voting_open(&round.id, Utc::now()).await.unwrap());
}

#[tokio::test]
async fn inverted_schedules_are_refused() {
    let service = memory_rounds();
    let mut backwards = auditions();
    backwards.end_date = backwards.start_date - Duration::hours(1);
    assert!(matches!(
        service.create_round(backwards).await,
        Err(ShowcaseError::InvalidRound(_))
    ));

    let round = service.create_round(auditions()).await.unwrap();
    let err = service
        .update_round(
            &round.id,
            RoundUpdate {
                voting_start: Some(round.end_date),
                voting_end: Some(round.start_date),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ShowcaseError::InvalidRound(_)));
    assert_eq!(service.get_round(&round.id).await.unwrap().voting_start, None);
}

#[tokio::test]
async fn unknown_round_is_not_found() {
    let service = memory_rounds();
    assert!(matches!(
        service.get_round(&"nope".into()).await,
        Err(ShowcaseError::RoundNotFound { .. })
    ));
    assert!(matches!(
        service
            .update_round(&"nope".into(), RoundUpdate::default())
            .await,
        Err(ShowcaseError::RoundNotFound { .. })
    ));
    assert!(matches!(
        service
            .create_performance_slots(&"nope".into(), vec![window(18)])
            .await,
        Err(ShowcaseError::RoundNotFound { .. })
    ));
}

#[tokio::test]
async fn slots_are_listed_earliest_first_and_booked_once() {
    let service = memory_rounds();
    let round = service.create_round(auditions()).await.unwrap();
    service
        .create_performance_slots(&round.id, vec![window(20), window(18), window(19)])
        .await
        .unwrap();

    let open = service.available_slots(&round.id).await.unwrap();
    assert_eq!(open.len(), 3);
    assert_eq!(open[0].start_time, window(18).start_time);

    let booked = service.book_slot(&open[0].id, &"alice".into()).await.unwrap();
    assert_eq!(booked.status, SlotStatus::Booked);

    let err = service.book_slot(&open[0].id, &"bob".into()).await.unwrap_err();
    assert!(matches!(err, ShowcaseError::SlotUnavailable { .. }));
    assert_eq!(service.available_slots(&round.id).await.unwrap().len(), 2);

    assert!(matches!(
        service.book_slot(&"ghost".into(), &"bob".into()).await,
        Err(ShowcaseError::SlotNotFound { .. })
    ));
}

#[tokio::test]
async fn zero_length_slot_is_refused() {
    let service = memory_rounds();
    let round = service.create_round(auditions()).await.unwrap();
    let mut empty = window(18);
    empty.end_time = empty.start_time;

    let err = service
        .create_performance_slots(&round.id, vec![window(19), empty])
        .await
        .unwrap_err();
    assert!(matches!(err, ShowcaseError::InvalidRound(_)));
    assert!(service.available_slots(&round.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn surreal_backed_rounds_and_slots() {
    let handle = SurrealHandle::setup_db().await.unwrap();
    let service = RoundService::new(Arc::new(handle.clone()), Arc::new(handle));

    let round = service.create_round(auditions()).await.unwrap();
    let slots = service
        .create_performance_slots(&round.id, vec![window(18), window(19)])
        .await
        .unwrap();
    service.book_slot(&slots[1].id, &"alice".into()).await.unwrap();

    let open = service.available_slots(&round.id).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, slots[0].id);
}

// ---------------------------------------------------------------------------
// Voting window
// ---------------------------------------------------------------------------

async fn performance_in(registry: &dyn PerformanceRegistry, round_id: &RoundId) -> PerformanceId {
    registry
        .insert(NewPerformance {
            contestant_id: "alice".into(),
            round_id: round_id.clone(),
            slot_id: None,
            media_url: "memory://performances/alice/take.mp3".to_string(),
            media_digest: ContentDigest::from_bytes(b"take"),
            media_type: MediaType::Audio,
            song_title: "Crazy".to_string(),
            artist: "Gnarls Barkley".to_string(),
            submitted_at: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn votes_follow_the_round_voting_window() {
    let rounds = Arc::new(MemoryRoundRegistry::new());
    let performances = Arc::new(MemoryPerformanceRegistry::new());
    let voting = VotingService::new(performances.clone(), Arc::new(MemoryVoteStore::new()))
        .with_rounds(rounds.clone());

    let mut closed = auditions();
    closed.voting_enabled = true;
    closed.voting_end = Some(Utc::now() - Duration::minutes(5));
    let closed = rounds.create(closed).await.unwrap();
    let late = performance_in(&*performances, &closed.id).await;

    let err = voting.submit_vote(&"fan".into(), &late).await.unwrap_err();
    assert!(matches!(err, ShowcaseError::VotingClosed { .. }));
    assert_eq!(voting.vote_count(&late).await.unwrap(), 0);

    let mut open = auditions();
    open.voting_enabled = true;
    open.voting_start = Some(Utc::now() - Duration::hours(1));
    open.voting_end = Some(Utc::now() + Duration::hours(1));
    let open = rounds.create(open).await.unwrap();
    let on_time = performance_in(&*performances, &open.id).await;
    voting.submit_vote(&"fan".into(), &on_time).await.unwrap();

    // Rounds without metadata keep accepting votes.
    let loose = performance_in(&*performances, &"unregistered".into()).await;
    voting.submit_vote(&"fan".into(), &loose).await.unwrap();
}

#[tokio::test]
async fn disabled_voting_refuses_votes() {
    let rounds = Arc::new(MemoryRoundRegistry::new());
    let performances = Arc::new(MemoryPerformanceRegistry::new());
    let voting = VotingService::new(performances.clone(), Arc::new(MemoryVoteStore::new()))
        .with_rounds(rounds.clone());

    let round = rounds.create(auditions()).await.unwrap();
    let perf = performance_in(&*performances, &round.id).await;
    assert!(matches!(
        voting.submit_vote(&"fan".into(), &perf).await,
        Err(ShowcaseError::VotingClosed { .. })
    ));
}
