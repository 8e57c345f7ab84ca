//! In-memory player store

use crate::error::{LadderError, Result};
use crate::store::PlayerStore;
use crate::types::{PlayerId, PlayerRating, PlayerRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory player store implementation
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    records: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl InMemoryPlayerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: Vec<PlayerRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.player_id.clone(), record))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    fn read_lock(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<PlayerId, PlayerRecord>>> {
        self.records.read().map_err(|_| {
            LadderError::Internal {
                message: "Failed to acquire player records read lock".to_string(),
            }
            .into()
        })
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PlayerId, PlayerRecord>>> {
        self.records.write().map_err(|_| {
            LadderError::Internal {
                message: "Failed to acquire player records write lock".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn find_by_identity(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        let records = self.read_lock()?;
        Ok(records.get(player_id).cloned())
    }

    async fn insert_if_absent(&self, record: PlayerRecord) -> Result<bool> {
        let mut records = self.write_lock()?;
        if records.contains_key(&record.player_id) {
            return Ok(false);
        }
        records.insert(record.player_id.clone(), record);
        Ok(true)
    }

    async fn update_rating(&self, player_id: &PlayerId, rating: PlayerRating) -> Result<()> {
        let mut records = self.write_lock()?;
        match records.get_mut(player_id) {
            Some(record) => {
                record.apply_rating(rating);
                Ok(())
            }
            None => Err(LadderError::store(
                "update_rating",
                format!("no record for player {}", player_id),
            )
            .into()),
        }
    }

    async fn update_ratings(&self, updates: &[(PlayerId, PlayerRating)]) -> Result<()> {
        let mut records = self.write_lock()?;

        // Check everything first so a missing player leaves the store untouched
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !records.contains_key(id)) {
            return Err(LadderError::store(
                "update_ratings",
                format!("no record for player {}", missing),
            )
            .into());
        }

        for (player_id, rating) in updates {
            if let Some(record) = records.get_mut(player_id) {
                record.apply_rating(*rating);
            }
        }
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<PlayerRecord>> {
        let records = self.read_lock()?;
        Ok(records.values().cloned().collect())
    }

    async fn player_count(&self) -> Result<usize> {
        let records = self.read_lock()?;
        Ok(records.len())
    }
}
