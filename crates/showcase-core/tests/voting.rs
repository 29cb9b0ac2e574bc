use std::sync::Arc;

use showcase_core::showcase_state::fakes::{MemoryPerformanceRegistry, MemoryVoteStore};
use showcase_core::showcase_state::storage_traits::*;
use showcase_core::showcase_state::SurrealHandle;
use showcase_core::{ShowcaseError, VotingService};

async fn seed(registry: &dyn PerformanceRegistry) -> PerformanceId {
    registry
        .insert(NewPerformance {
            contestant_id: "alice".into(),
            round_id: "R1".into(),
            slot_id: Some("slot-3".to_string()),
            media_url: "memory://performances/alice/take.mp3".to_string(),
            media_digest: ContentDigest::from_bytes(b"take"),
            media_type: MediaType::Audio,
            song_title: "Valerie".to_string(),
            artist: "Amy Winehouse".to_string(),
            submitted_at: None,
        })
        .await
        .unwrap()
        .id
}

fn memory_service() -> (Arc<MemoryPerformanceRegistry>, VotingService) {
    let registry = Arc::new(MemoryPerformanceRegistry::new());
    let service = VotingService::new(registry.clone(), Arc::new(MemoryVoteStore::new()));
    (registry, service)
}

#[tokio::test]
async fn second_vote_from_same_voter_is_rejected() {
    let (registry, service) = memory_service();
    let perf = seed(&*registry).await;

    let vote = service.submit_vote(&"fan".into(), &perf).await.unwrap();
    assert_eq!(vote.performance_id, perf);

    let err = service.submit_vote(&"fan".into(), &perf).await.unwrap_err();
    assert!(matches!(err, ShowcaseError::DuplicateVote { .. }));
    assert_eq!(service.vote_count(&perf).await.unwrap(), 1);
}

#[tokio::test]
async fn distinct_voters_all_count() {
    let (registry, service) = memory_service();
    let perf = seed(&*registry).await;

    for voter in ["a", "b", "c"] {
        service.submit_vote(&voter.into(), &perf).await.unwrap();
    }
    assert_eq!(service.vote_count(&perf).await.unwrap(), 3);
}

#[tokio::test]
async fn vote_for_unknown_performance_is_rejected() {
    let (_registry, service) = memory_service();

    let err = service
        .submit_vote(&"fan".into(), &"nope".into())
        .await
        .unwrap_err();
    assert!(matches!(err, ShowcaseError::PerformanceNotFound { .. }));
    assert_eq!(service.vote_count(&"nope".into()).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_votes_store_exactly_one() {
    let (registry, service) = memory_service();
    let perf = seed(&*registry).await;
    let service = Arc::new(service);

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let service = Arc::clone(&service);
        let perf = perf.clone();
        tasks.push(tokio::spawn(async move {
            service.submit_vote(&"double-tapper".into(), &perf).await
        }));
    }

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(ShowcaseError::DuplicateVote { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(service.vote_count(&perf).await.unwrap(), 1);
}

#[tokio::test]
async fn surreal_backed_votes_are_unique() {
    let handle = SurrealHandle::setup_db().await.unwrap();
    let perf = seed(&handle).await;
    let service = VotingService::new(Arc::new(handle.clone()), Arc::new(handle));

    service.submit_vote(&"fan".into(), &perf).await.unwrap();
    let err = service.submit_vote(&"fan".into(), &perf).await.unwrap_err();

    assert!(matches!(err, ShowcaseError::DuplicateVote { .. }));
    assert_eq!(service.vote_count(&perf).await.unwrap(), 1);
}
