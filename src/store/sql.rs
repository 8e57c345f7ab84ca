//! SQLite-backed player store
//!
//! Every statement binds its values as parameters; player identities and
//! names are never spliced into query text. The `players` table is expected
//! to exist:
//!
//! ```sql
//! CREATE TABLE players (
//!     player_id    TEXT PRIMARY KEY,
//!     display_name TEXT NOT NULL,
//!     in_game_name TEXT,
//!     rating       REAL NOT NULL,
//!     uncertainty  REAL NOT NULL,
//!     decaying     INTEGER NOT NULL DEFAULT 0,
//!     games_played INTEGER NOT NULL DEFAULT 0
//! );
//! ```

use crate::error::{LadderError, Result};
use crate::store::PlayerStore;
use crate::types::{PlayerId, PlayerRating, PlayerRecord};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

const SELECT_COLUMNS: &str =
    "SELECT player_id, display_name, in_game_name, rating, uncertainty, decaying, games_played FROM players";

/// Row shape of the `players` table
#[derive(Debug, sqlx::FromRow)]
struct PlayerRow {
    player_id: String,
    display_name: String,
    in_game_name: Option<String>,
    rating: f64,
    uncertainty: f64,
    decaying: bool,
    games_played: i64,
}

impl From<PlayerRow> for PlayerRecord {
    fn from(row: PlayerRow) -> Self {
        Self {
            player_id: row.player_id,
            display_name: row.display_name,
            in_game_name: row.in_game_name,
            rating: PlayerRating {
                rating: row.rating,
                uncertainty: row.uncertainty,
            },
            decaying: row.decaying,
            games_played: row.games_played.max(0) as u64,
        }
    }
}

/// Player store backed by a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqlPlayerStore {
    pool: SqlitePool,
}

impl SqlPlayerStore {
    /// Connect to the database at `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| LadderError::store("connect", e))?;

        info!("Connected to player database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerStore for SqlPlayerStore {
    async fn find_by_identity(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        let query = format!("{} WHERE player_id = ?", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, PlayerRow>(&query)
            .bind(player_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LadderError::store("find_by_identity", e))?;

        Ok(row.map(PlayerRecord::from))
    }

    async fn insert_if_absent(&self, record: PlayerRecord) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO players \
             (player_id, display_name, in_game_name, rating, uncertainty, decaying, games_played) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.player_id)
        .bind(&record.display_name)
        .bind(&record.in_game_name)
        .bind(record.rating.rating)
        .bind(record.rating.uncertainty)
        .bind(record.decaying)
        .bind(record.games_played as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| LadderError::store("insert_if_absent", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_rating(&self, player_id: &PlayerId, rating: PlayerRating) -> Result<()> {
        self.update_ratings(&[(player_id.clone(), rating)]).await
    }

    async fn update_ratings(&self, updates: &[(PlayerId, PlayerRating)]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LadderError::store("update_ratings", e))?;

        for (player_id, rating) in updates {
            let result = sqlx::query(
                "UPDATE players SET rating = ?, uncertainty = ?, games_played = games_played + 1 \
                 WHERE player_id = ?",
            )
            .bind(rating.rating)
            .bind(rating.uncertainty)
            .bind(player_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| LadderError::store("update_ratings", e))?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back earlier updates
                return Err(LadderError::store(
                    "update_ratings",
                    format!("no record for player {}", player_id),
                )
                .into());
            }
        }

        tx.commit()
            .await
            .map_err(|e| LadderError::store("update_ratings", e))?;
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<PlayerRecord>> {
        let rows = sqlx::query_as::<_, PlayerRow>(SELECT_COLUMNS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LadderError::store("all_records", e))?;

        Ok(rows.into_iter().map(PlayerRecord::from).collect())
    }

    async fn player_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LadderError::store("player_count", e))?;

        Ok(count.max(0) as usize)
    }
}
