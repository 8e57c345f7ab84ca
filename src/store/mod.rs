//! Player persistence interface and implementations
//!
//! The coordinator treats the player store as an external collaborator: it
//! only relies on the `PlayerStore` contract below. Operations are keyed by
//! player identity and independent of each other, so concurrent calls for
//! different players never interfere.

pub mod memory;
pub mod sql;

pub use memory::InMemoryPlayerStore;
pub use sql::SqlPlayerStore;

use crate::error::Result;
use crate::types::{PlayerId, PlayerRating, PlayerRecord};
use async_trait::async_trait;

/// Trait for player record persistence
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Look up a player's record
    async fn find_by_identity(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>>;

    /// Insert a record unless one already exists for the player.
    ///
    /// Returns `true` when a new record was written.
    async fn insert_if_absent(&self, record: PlayerRecord) -> Result<bool>;

    /// Replace a player's rating and count the game
    async fn update_rating(&self, player_id: &PlayerId, rating: PlayerRating) -> Result<()>;

    /// Apply several rating updates; implementations make this atomic
    async fn update_ratings(&self, updates: &[(PlayerId, PlayerRating)]) -> Result<()>;

    /// Read every player record
    async fn all_records(&self) -> Result<Vec<PlayerRecord>>;

    /// Get total number of players
    async fn player_count(&self) -> Result<usize>;
}
