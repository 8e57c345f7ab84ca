//! Concurrency tests
//!
//! Many commands in flight at once must never overfill the queue, double
//! queue a player or rebuild the ladder more than needed.

mod fixtures;

use fixtures::{create_test_system, player, queue_settings, TestStore};
use futures::future::join_all;
use ladder_room::types::{JoinOutcome, MatchOutcome, Standing};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_concurrent_joins_respect_capacity() {
    let system = create_test_system(queue_settings(10, 1), Arc::new(TestStore::new()));
    let lifecycle = system.lifecycle.clone();

    let start = Instant::now();
    let joins = (0..50).map(|i| {
        let lifecycle = lifecycle.clone();
        async move {
            lifecycle
                .join(player(i), Some(format!("ign{}", i)))
                .await
                .unwrap()
        }
    });
    let outcomes = join_all(joins).await;
    println!("50 concurrent joins took {:?}", start.elapsed());

    let joined = outcomes
        .iter()
        .filter(|o| matches!(o, JoinOutcome::Joined { .. }))
        .count();
    let full = outcomes
        .iter()
        .filter(|o| matches!(o, JoinOutcome::QueueFull))
        .count();

    // Ten form the match, ten more wait in a full queue
    assert_eq!(joined, 20);
    assert_eq!(full, 30);

    let outstanding = lifecycle.outstanding_matches().unwrap();
    assert_eq!(outstanding.len(), 1);
    let participants: HashSet<_> = outstanding[0].participant_ids().into_iter().collect();
    assert_eq!(participants.len(), 10);

    let queued = lifecycle.queue_snapshot().unwrap();
    assert_eq!(queued.len(), 10);
    assert!(queued.iter().all(|p| !participants.contains(&p.id)));

    assert_eq!(system.publisher.count_events_of_type("MatchStarted"), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_joins_queue_once() {
    let system = create_test_system(queue_settings(10, 1), Arc::new(TestStore::new()));
    let lifecycle = system.lifecycle.clone();

    let joins = (0..10).map(|_| {
        let lifecycle = lifecycle.clone();
        async move { lifecycle.join(player(7), Some("Seven".to_string())).await.unwrap() }
    });
    let outcomes = join_all(joins).await;

    let joined: Vec<_> = outcomes
        .iter()
        .filter(|o| matches!(o, JoinOutcome::Joined { .. }))
        .collect();
    assert_eq!(joined.len(), 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, JoinOutcome::Joined { .. } | JoinOutcome::AlreadyQueued)));

    assert_eq!(lifecycle.queue_snapshot().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_ladder_reads_share_one_rebuild() {
    let store = Arc::new(TestStore::new());
    let system = create_test_system(queue_settings(30, 1), store.clone());
    for i in 0..20 {
        system
            .lifecycle
            .join(player(i), Some(format!("ign{}", i)))
            .await
            .unwrap();
    }

    store.set_delay(Duration::from_millis(30));
    let reads = (0..20).map(|_| {
        let ladder = system.ladder.clone();
        async move { ladder.get().await.unwrap().len() }
    });
    let sizes = join_all(reads).await;

    assert!(sizes.iter().all(|&size| size == 20));
    assert_eq!(store.all_records_calls(), 1);
}

#[tokio::test]
async fn test_results_and_joins_interleave() {
    let system = create_test_system(queue_settings(2, 1), Arc::new(TestStore::new()));
    let lifecycle = system.lifecycle.clone();

    lifecycle.join(player(1), Some("a".into())).await.unwrap();
    lifecycle.join(player(2), Some("b".into())).await.unwrap();

    let result = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            lifecycle
                .handle_result(MatchOutcome {
                    match_id: None,
                    standings: vec![
                        Standing {
                            player_id: "player-1".to_string(),
                            rank: 1,
                        },
                        Standing {
                            player_id: "player-2".to_string(),
                            rank: 2,
                        },
                    ],
                })
                .await
        })
    };
    let joins = (3..7).map(|i| {
        let lifecycle = lifecycle.clone();
        async move { lifecycle.join(player(i), Some(format!("ign{}", i))).await }
    });
    let join_results = join_all(joins).await;

    assert!(result.await.unwrap().unwrap().is_some());
    assert!(join_results.iter().all(|r| r.is_ok()));

    // At most one match outstanding and the queue never above capacity
    let outstanding = lifecycle.outstanding_matches().unwrap();
    assert!(outstanding.len() <= 1);
    assert!(lifecycle.queue_snapshot().unwrap().len() <= 2);
    assert_eq!(lifecycle.stats().unwrap().matches_resolved, 1);
}
