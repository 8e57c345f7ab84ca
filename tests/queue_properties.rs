//! Property tests for the match queue

use ladder_room::queue::{MatchQueue, QueueAdd};
use ladder_room::types::{LeaveOutcome, PlayerIdentity};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Join(u8),
    Leave(u8),
    TakeFull,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16).prop_map(Op::Join),
        2 => (0u8..16).prop_map(Op::Leave),
        1 => Just(Op::TakeFull),
    ]
}

fn identity(id: u8) -> PlayerIdentity {
    PlayerIdentity::new(format!("p{}", id), format!("Player {}", id))
}

proptest! {
    #[test]
    fn queue_never_exceeds_capacity(capacity in 1usize..8, ops in prop::collection::vec(op(), 0..200)) {
        let mut queue = MatchQueue::new(capacity);

        for op in ops {
            match op {
                Op::Join(id) => {
                    let was_queued = queue.contains(&format!("p{}", id));
                    let was_full = queue.is_full();
                    match queue.add(identity(id)) {
                        QueueAdd::Added(position) => {
                            prop_assert!(!was_queued && !was_full);
                            prop_assert_eq!(position, queue.len());
                        }
                        QueueAdd::AlreadyQueued => prop_assert!(was_queued),
                        QueueAdd::Full => prop_assert!(was_full && !was_queued),
                    }
                }
                Op::Leave(id) => {
                    let was_queued = queue.contains(&format!("p{}", id));
                    let outcome = queue.remove(&format!("p{}", id));
                    prop_assert_eq!(outcome == LeaveOutcome::Left, was_queued);
                }
                Op::TakeFull => {
                    let was_full = queue.is_full();
                    let before = queue.snapshot();
                    match queue.take_full().unwrap() {
                        Some(participants) => {
                            prop_assert!(was_full);
                            prop_assert_eq!(participants.len(), capacity);
                            prop_assert_eq!(&participants[..], &before[..capacity]);
                        }
                        None => prop_assert!(!was_full),
                    }
                }
            }

            prop_assert!(queue.len() <= capacity);
            let ids: HashSet<_> = queue.snapshot().into_iter().map(|p| p.id).collect();
            prop_assert_eq!(ids.len(), queue.len());
            prop_assert!(queue.check_invariant().is_ok());
        }
    }
}
