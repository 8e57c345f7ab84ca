//! Match queue
//!
//! Ordered set of players waiting for a match. The queue itself holds no
//! lock; `MatchLifecycle` owns it behind a mutex so that the capacity check
//! and the drain into a match happen in one critical section.

use crate::error::{LadderError, Result};
use crate::types::{LeaveOutcome, PlayerIdentity};
use std::collections::VecDeque;

/// Result of adding a player to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAdd {
    /// Added at this 1-based position
    Added(usize),
    AlreadyQueued,
    /// Queue already holds `capacity` players
    Full,
}

/// Players waiting for a match, in join order
#[derive(Debug, Clone)]
pub struct MatchQueue {
    capacity: usize,
    entries: VecDeque<PlayerIdentity>,
}

impl MatchQueue {
    /// Create an empty queue that forms matches of `capacity` players
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the queue holds exactly enough players for a match
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == player_id)
    }

    /// Add a player at the back of the queue
    pub fn add(&mut self, identity: PlayerIdentity) -> QueueAdd {
        if self.contains(&identity.id) {
            return QueueAdd::AlreadyQueued;
        }
        if self.is_full() {
            return QueueAdd::Full;
        }

        self.entries.push_back(identity);
        QueueAdd::Added(self.entries.len())
    }

    /// Remove a player, keeping the order of everyone else
    pub fn remove(&mut self, player_id: &str) -> LeaveOutcome {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != player_id);

        if self.entries.len() < before {
            LeaveOutcome::Left
        } else {
            LeaveOutcome::NotQueued
        }
    }

    /// Identities in join order
    pub fn snapshot(&self) -> Vec<PlayerIdentity> {
        self.entries.iter().cloned().collect()
    }

    /// When the queue is at capacity, remove and return exactly `capacity`
    /// players in join order
    pub fn take_full(&mut self) -> Result<Option<Vec<PlayerIdentity>>> {
        self.check_invariant()?;

        if !self.is_full() {
            return Ok(None);
        }

        let participants = self.entries.drain(..self.capacity).collect();
        Ok(Some(participants))
    }

    /// Length never exceeds capacity and no identity appears twice
    pub fn check_invariant(&self) -> Result<()> {
        if self.entries.len() > self.capacity {
            return Err(LadderError::ConcurrencyViolation {
                reason: format!(
                    "queue holds {} players, capacity is {}",
                    self.entries.len(),
                    self.capacity
                ),
            }
            .into());
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if self
                .entries
                .iter()
                .skip(i + 1)
                .any(|other| other.id == entry.id)
            {
                return Err(LadderError::ConcurrencyViolation {
                    reason: format!("player {} queued twice", entry.id),
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> PlayerIdentity {
        PlayerIdentity::new(id, format!("{}_name", id))
    }

    #[test]
    fn test_add_preserves_join_order() {
        let mut queue = MatchQueue::new(4);

        assert_eq!(queue.add(player("p1")), QueueAdd::Added(1));
        assert_eq!(queue.add(player("p2")), QueueAdd::Added(2));
        assert_eq!(queue.add(player("p3")), QueueAdd::Added(3));

        let ids: Vec<_> = queue.snapshot().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let mut queue = MatchQueue::new(4);
        queue.add(player("p1"));

        assert_eq!(queue.add(player("p1")), QueueAdd::AlreadyQueued);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_add_beyond_capacity_rejected() {
        let mut queue = MatchQueue::new(2);
        queue.add(player("p1"));
        queue.add(player("p2"));

        assert!(queue.is_full());
        assert_eq!(queue.add(player("p3")), QueueAdd::Full);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut queue = MatchQueue::new(4);
        queue.add(player("p1"));
        queue.add(player("p2"));

        assert_eq!(queue.remove("p1"), LeaveOutcome::Left);
        assert_eq!(queue.remove("p1"), LeaveOutcome::NotQueued);
        assert_eq!(queue.snapshot(), vec![player("p2")]);
    }

    #[test]
    fn test_take_full_drains_exactly_capacity() {
        let mut queue = MatchQueue::new(3);
        queue.add(player("p1"));
        queue.add(player("p2"));
        assert!(queue.take_full().unwrap().is_none());

        queue.add(player("p3"));
        let participants = queue.take_full().unwrap().unwrap();

        assert_eq!(participants, vec![player("p1"), player("p2"), player("p3")]);
        assert!(queue.is_empty());
        assert!(queue.take_full().unwrap().is_none());
    }

    #[test]
    fn test_invariant_reports_violation() {
        let mut queue = MatchQueue::new(1);
        queue.entries.push_back(player("p1"));
        queue.entries.push_back(player("p2"));

        let err = queue.check_invariant().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::ConcurrencyViolation { .. })
        ));
    }
}
