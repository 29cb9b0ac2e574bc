//! Trait contract tests for PerformanceRegistry, ScoreStore, VoteStore,
//! RoundResultStore, RoundRegistry, SlotStore and ContestantRegistry.
//!
//! Each contract runs against the in-memory fakes and against SurrealDB
//! (in-memory engine). Any conforming implementation must pass these.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use showcase_state::fakes::{
    MemoryContestantRegistry, MemoryMediaStore, MemoryPerformanceRegistry, MemoryRoundRegistry,
    MemoryRoundResultStore, MemoryScoreStore, MemorySlotStore, MemoryVoteStore,
};
use showcase_state::storage_traits::*;
use showcase_state::{StorageError, SurrealHandle};

fn new_performance(round: &str, contestant: &str) -> NewPerformance {
    NewPerformance {
        contestant_id: contestant.into(),
        round_id: round.into(),
        slot_id: None,
        media_url: format!("memory://performances/{contestant}/take.mp3"),
        media_digest: ContentDigest::from_bytes(contestant.as_bytes()),
        media_type: MediaType::Audio,
        song_title: "Hallelujah".to_string(),
        artist: "Leonard Cohen".to_string(),
        submitted_at: None,
    }
}

fn new_score(judge: &str, performance: &PerformanceId, overall: f64) -> NewScore {
    NewScore {
        performance_id: performance.clone(),
        judge_id: judge.into(),
        criteria: ScoreCriteria {
            pitch: overall,
            tone: overall,
            stage_presence: overall,
            overall,
        },
        comments: None,
    }
}

fn entry(rank: u32, performance: &str, final_score: f64) -> RankedEntry {
    RankedEntry {
        rank,
        contestant_id: format!("c-{performance}").into(),
        performance_id: performance.into(),
        final_score,
        judge_score: final_score,
        audience_score: 0.0,
    }
}

// ===========================================================================
// PerformanceRegistry
// ===========================================================================

async fn performance_contract(registry: Arc<dyn PerformanceRegistry>) {
    let p1 = registry.insert(new_performance("r1", "alice")).await.unwrap();
    let p2 = registry.insert(new_performance("r1", "bob")).await.unwrap();
    registry.insert(new_performance("r2", "carol")).await.unwrap();

    assert_eq!(p1.status, PerformanceStatus::PendingReview);
    assert_ne!(p1.id, p2.id);

    let fetched = registry.get(&p1.id).await.unwrap().expect("inserted");
    assert_eq!(fetched.contestant_id, ContestantId::from("alice"));
    assert_eq!(fetched.media_digest, p1.media_digest);

    let mut in_round = registry.list_by_round(&"r1".into()).await.unwrap();
    in_round.sort_by(|a, b| a.contestant_id.cmp(&b.contestant_id));
    let names: Vec<&str> = in_round.iter().map(|p| p.contestant_id.as_str()).collect();
    assert_eq!(names, ["alice", "bob"]);

    assert!(registry.list_by_round(&"r9".into()).await.unwrap().is_empty());
    assert!(registry.get(&"missing".into()).await.unwrap().is_none());

    let updated = registry
        .update_status(
            &p1.id,
            PerformanceStatus::PendingReview,
            PerformanceStatus::Approved,
            Some("clean take".into()),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, PerformanceStatus::Approved);
    assert_eq!(updated.notes.as_deref(), Some("clean take"));

    // Notes survive a status-only update.
    let scored = registry
        .update_status(
            &p1.id,
            PerformanceStatus::Approved,
            PerformanceStatus::Scored,
            None,
        )
        .await
        .unwrap();
    assert_eq!(scored.notes.as_deref(), Some("clean take"));

    let err = registry
        .update_status(
            &"missing".into(),
            PerformanceStatus::PendingReview,
            PerformanceStatus::Approved,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::PerformanceNotFound { .. }));
}

async fn stale_status_update_is_refused(registry: Arc<dyn PerformanceRegistry>) {
    let p = registry.insert(new_performance("r1", "erin")).await.unwrap();
    registry
        .update_status(
            &p.id,
            PerformanceStatus::PendingReview,
            PerformanceStatus::Rejected,
            Some("clipping".into()),
        )
        .await
        .unwrap();

    // A writer that still believes the performance is pending loses.
    let err = registry
        .update_status(
            &p.id,
            PerformanceStatus::PendingReview,
            PerformanceStatus::Scored,
            None,
        )
        .await
        .unwrap_err();
    match err {
        StorageError::StatusConflict {
            expected,
            found,
            requested,
            ..
        } => {
            assert_eq!(expected, PerformanceStatus::PendingReview);
            assert_eq!(found, PerformanceStatus::Rejected);
            assert_eq!(requested, PerformanceStatus::Scored);
        }
        other => panic!("expected StatusConflict, got {other:?}"),
    }

    let stored = registry.get(&p.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PerformanceStatus::Rejected);
    assert_eq!(stored.notes.as_deref(), Some("clipping"));
}

async fn performance_keeps_import_timestamp(registry: Arc<dyn PerformanceRegistry>) {
    let when = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
    let mut new = new_performance("r1", "dave");
    new.submitted_at = Some(when);
    let p = registry.insert(new).await.unwrap();
    assert_eq!(p.submitted_at, when);
    assert_eq!(registry.get(&p.id).await.unwrap().unwrap().submitted_at, when);
}

#[tokio::test]
async fn memory_performance_registry_contract() {
    performance_contract(Arc::new(MemoryPerformanceRegistry::new())).await;
    performance_keeps_import_timestamp(Arc::new(MemoryPerformanceRegistry::new())).await;
    stale_status_update_is_refused(Arc::new(MemoryPerformanceRegistry::new())).await;
}

#[tokio::test]
async fn surreal_performance_registry_contract() {
    let handle = SurrealHandle::setup_db().await.unwrap();
    performance_contract(Arc::new(handle.clone())).await;
    performance_keeps_import_timestamp(Arc::new(handle.clone())).await;
    stale_status_update_is_refused(Arc::new(handle)).await;
}

// ===========================================================================
// ScoreStore
// ===========================================================================

async fn score_contract(store: Arc<dyn ScoreStore>) {
    let perf: PerformanceId = "p1".into();
    store.insert(new_score("judge-a", &perf, 8.0)).await.unwrap();
    store.insert(new_score("judge-b", &perf, 6.0)).await.unwrap();
    store
        .insert(new_score("judge-a", &"p2".into(), 9.0))
        .await
        .unwrap();

    let err = store
        .insert(new_score("judge-a", &perf, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateScore { .. }));

    let mut overall: Vec<f64> = store
        .list_by_performance(&perf)
        .await
        .unwrap()
        .iter()
        .map(|s| s.criteria.overall)
        .collect();
    overall.sort_by(f64::total_cmp);
    assert_eq!(overall, [6.0, 8.0]);

    assert!(store
        .list_by_performance(&"nobody".into())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn memory_score_store_contract() {
    score_contract(Arc::new(MemoryScoreStore::new())).await;
}

#[tokio::test]
async fn surreal_score_store_contract() {
    score_contract(Arc::new(SurrealHandle::setup_db().await.unwrap())).await;
}

// ===========================================================================
// VoteStore
// ===========================================================================

async fn vote_contract(store: Arc<dyn VoteStore>) {
    let perf: PerformanceId = "p1".into();
    let first = store.insert_unique(&"v1".into(), &perf).await.unwrap();
    assert_eq!(first.voter_id, VoterId::from("v1"));

    let err = store.insert_unique(&"v1".into(), &perf).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateVote { .. }));

    store.insert_unique(&"v2".into(), &perf).await.unwrap();
    store.insert_unique(&"v1".into(), &"p2".into()).await.unwrap();

    assert_eq!(store.count_by_performance(&perf).await.unwrap(), 2);
    assert_eq!(store.count_by_performance(&"p2".into()).await.unwrap(), 1);
    assert_eq!(store.count_by_performance(&"p3".into()).await.unwrap(), 0);

    let listed = store.list_by_performance(&perf).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().any(|v| v.id == first.id));
}

async fn concurrent_duplicate_votes_store_once(store: Arc<dyn VoteStore>, voters: usize) {
    let mut tasks = Vec::new();
    for _ in 0..voters {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.insert_unique(&"eager".into(), &"p-race".into()).await
        }));
    }

    let mut ok = 0;
    let mut duplicate = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(StorageError::DuplicateVote { .. }) => duplicate += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(duplicate, voters - 1);
    assert_eq!(store.count_by_performance(&"p-race".into()).await.unwrap(), 1);
}

#[tokio::test]
async fn memory_vote_store_contract() {
    vote_contract(Arc::new(MemoryVoteStore::new())).await;
}

#[tokio::test]
async fn surreal_vote_store_contract() {
    vote_contract(Arc::new(SurrealHandle::setup_db().await.unwrap())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_vote_store_concurrent_duplicates() {
    concurrent_duplicate_votes_store_once(Arc::new(MemoryVoteStore::new()), 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surreal_vote_store_concurrent_duplicates() {
    let handle = SurrealHandle::setup_db().await.unwrap();
    concurrent_duplicate_votes_store_once(Arc::new(handle), 32).await;
}

// ===========================================================================
// RoundResultStore
// ===========================================================================

async fn round_result_contract(store: Arc<dyn RoundResultStore>) {
    let round: RoundId = "r1".into();
    assert!(store.latest(&round).await.unwrap().is_none());
    assert!(store.history(&round).await.unwrap().is_empty());

    let v1 = store
        .append(&round, vec![entry(1, "p1", 17.0), entry(2, "p2", 12.0)], Utc::now())
        .await
        .unwrap();
    let v2 = store
        .append(&round, vec![entry(1, "p2", 20.0), entry(2, "p1", 17.0)], Utc::now())
        .await
        .unwrap();
    store
        .append(&"r2".into(), vec![entry(1, "p9", 1.0)], Utc::now())
        .await
        .unwrap();

    assert_eq!(v1.version, 1);
    assert_eq!(v2.version, 2);
    assert_ne!(v1.id, v2.id);

    let latest = store.latest(&round).await.unwrap().unwrap();
    assert_eq!(latest.id, v2.id);
    assert_eq!(latest.results[0].performance_id, PerformanceId::from("p2"));

    let history = store.history(&round).await.unwrap();
    let versions: Vec<u32> = history.iter().map(|r| r.version).collect();
    assert_eq!(versions, [2, 1]);
    assert_eq!(history[1].results, v1.results);

    let fetched = store.get(&v1.id).await.unwrap().unwrap();
    assert_eq!(fetched.round_id, round);
    assert_eq!(fetched.results.len(), 2);
    assert!(store.get(&"nope".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn memory_round_result_store_contract() {
    round_result_contract(Arc::new(MemoryRoundResultStore::new())).await;
}

#[tokio::test]
async fn surreal_round_result_store_contract() {
    round_result_contract(Arc::new(SurrealHandle::setup_db().await.unwrap())).await;
}

// ===========================================================================
// MediaStore (memory)
// ===========================================================================

#[tokio::test]
async fn memory_media_store_round_trip() {
    let store = MemoryMediaStore::new();
    let url = store.upload("performances/a/1_take.mp3", b"ooh").await.unwrap();
    assert_eq!(url, "memory://performances/a/1_take.mp3");
    assert_eq!(store.fetch("performances/a/1_take.mp3").await.unwrap(), b"ooh");
    assert_eq!(store.paths(), ["performances/a/1_take.mp3"]);

    let err = store.fetch("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::MediaNotFound { .. }));

    store.remove("performances/a/1_take.mp3").await.unwrap();
    assert!(store.paths().is_empty());
    let err = store.remove("performances/a/1_take.mp3").await.unwrap_err();
    assert!(matches!(err, StorageError::MediaNotFound { .. }));
}

// ===========================================================================
// RoundRegistry
// ===========================================================================

fn new_round(name: &str) -> NewRound {
    NewRound {
        name: name.to_string(),
        description: Some("Open auditions".to_string()),
        start_date: Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2024, 5, 8, 18, 0, 0).unwrap(),
        status: RoundStatus::Upcoming,
        max_contestants: 24,
        judge_ids: vec!["judge-a".into(), "judge-b".into()],
        voting_enabled: false,
        voting_start: None,
        voting_end: None,
        created_by: "admin".to_string(),
    }
}

async fn round_registry_contract(registry: Arc<dyn RoundRegistry>) {
    let created = registry.create(new_round("Auditions")).await.unwrap();
    assert_eq!(created.status, RoundStatus::Upcoming);

    let fetched = registry.get(&created.id).await.unwrap().expect("created");
    assert_eq!(fetched, created);
    assert!(registry.get(&"missing".into()).await.unwrap().is_none());

    let opens = Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap();
    let closes = Utc.with_ymd_and_hms(2024, 5, 3, 18, 0, 0).unwrap();
    let updated = registry
        .update(
            &created.id,
            RoundUpdate {
                status: Some(RoundStatus::Active),
                voting_enabled: Some(true),
                voting_start: Some(opens),
                voting_end: Some(closes),
                judge_ids: Some(vec!["judge-c".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, RoundStatus::Active);
    assert_eq!(updated.voting_start, Some(opens));
    assert_eq!(updated.judge_ids, [JudgeId::from("judge-c")]);
    // Untouched fields keep their values.
    assert_eq!(updated.name, "Auditions");
    assert_eq!(updated.max_contestants, 24);
    assert_eq!(updated.created_at, created.created_at);

    assert_eq!(registry.get(&created.id).await.unwrap().unwrap(), updated);

    let err = registry
        .update(&"missing".into(), RoundUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::RoundNotFound { .. }));
}

#[tokio::test]
async fn memory_round_registry_contract() {
    round_registry_contract(Arc::new(MemoryRoundRegistry::new())).await;
}

#[tokio::test]
async fn surreal_round_registry_contract() {
    round_registry_contract(Arc::new(SurrealHandle::setup_db().await.unwrap())).await;
}

// ===========================================================================
// SlotStore
// ===========================================================================

fn window(hour: u32) -> SlotWindow {
    SlotWindow {
        start_time: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 5, 1, hour, 30, 0).unwrap(),
    }
}

async fn slot_contract(store: Arc<dyn SlotStore>) {
    let round: RoundId = "r1".into();
    let created = store
        .create_slots(&round, vec![window(20), window(18), window(19)])
        .await
        .unwrap();
    assert_eq!(created.len(), 3);
    assert!(created.iter().all(|s| s.status == SlotStatus::Available));
    store.create_slots(&"r2".into(), vec![window(18)]).await.unwrap();

    let open = store.available(&round).await.unwrap();
    let hours: Vec<_> = open.iter().map(|s| s.start_time).collect();
    assert_eq!(
        hours,
        [window(18).start_time, window(19).start_time, window(20).start_time]
    );

    let booked = store.book(&open[0].id, &"alice".into()).await.unwrap();
    assert_eq!(booked.status, SlotStatus::Booked);
    assert_eq!(booked.contestant_id, Some(ContestantId::from("alice")));
    assert_eq!(store.available(&round).await.unwrap().len(), 2);

    let err = store.book(&open[0].id, &"bob".into()).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::SlotUnavailable {
            status: SlotStatus::Booked,
            ..
        }
    ));

    let err = store.book(&"missing".into(), &"bob".into()).await.unwrap_err();
    assert!(matches!(err, StorageError::SlotNotFound { .. }));
}

async fn concurrent_bookings_claim_slot_once(store: Arc<dyn SlotStore>) {
    let slot = store
        .create_slots(&"r-race".into(), vec![window(21)])
        .await
        .unwrap()
        .remove(0);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let slot_id = slot.id.clone();
        tasks.push(tokio::spawn(async move {
            store.book(&slot_id, &format!("c-{i}").into()).await
        }));
    }

    let mut booked = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => booked += 1,
            Err(StorageError::SlotUnavailable { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(booked, 1);
    assert!(store.available(&"r-race".into()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_slot_store_contract() {
    slot_contract(Arc::new(MemorySlotStore::new())).await;
    concurrent_bookings_claim_slot_once(Arc::new(MemorySlotStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surreal_slot_store_contract() {
    let handle = SurrealHandle::setup_db().await.unwrap();
    slot_contract(Arc::new(handle.clone())).await;
    concurrent_bookings_claim_slot_once(Arc::new(handle)).await;
}

// ===========================================================================
// ContestantRegistry
// ===========================================================================

fn new_contestant(name: &str) -> NewContestant {
    NewContestant {
        user_id: format!("user-{name}"),
        name: name.to_string(),
        email: format!("{name}@example.com"),
        song_preferences: vec!["soul".to_string(), "jazz".to_string()],
        profile: ContestantProfile {
            bio: Some("Sings in the shower".to_string()),
            social_links: SocialLinks {
                youtube: Some(format!("https://youtube.com/@{name}")),
                ..Default::default()
            },
        },
    }
}

async fn contestant_contract(registry: Arc<dyn ContestantRegistry>) {
    let alice = registry.register(new_contestant("alice")).await.unwrap();
    let bob = registry.register(new_contestant("bob")).await.unwrap();
    assert_ne!(alice.id, bob.id);

    assert_eq!(registry.get(&alice.id).await.unwrap().unwrap(), alice);
    assert!(registry.get(&"missing".into()).await.unwrap().is_none());

    let updated = registry
        .update_profile(
            &alice.id,
            ContestantUpdate {
                song_preferences: Some(vec!["rock".to_string()]),
                profile: Some(ContestantProfile {
                    bio: Some("Now with a band".to_string()),
                    social_links: SocialLinks::default(),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.song_preferences, ["rock"]);
    assert_eq!(updated.profile.bio.as_deref(), Some("Now with a band"));
    assert_eq!(updated.profile.social_links, SocialLinks::default());
    assert_eq!(updated.email, "alice@example.com");
    assert_eq!(registry.get(&alice.id).await.unwrap().unwrap(), updated);

    let err = registry
        .update_profile(&"missing".into(), ContestantUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ContestantNotFound { .. }));
}

#[tokio::test]
async fn memory_contestant_registry_contract() {
    contestant_contract(Arc::new(MemoryContestantRegistry::new())).await;
}

#[tokio::test]
async fn surreal_contestant_registry_contract() {
    contestant_contract(Arc::new(SurrealHandle::setup_db().await.unwrap())).await;
}
