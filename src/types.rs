//! Common types used throughout the ladder coordinator

use crate::config::rating::{DEFAULT_RATING, DEFAULT_UNCERTAINTY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillratings::elo::EloRating;
use skillratings::trueskill::TrueSkillRating;
use uuid::Uuid;

/// Platform-assigned identifier for a chat participant
pub type PlayerId = String;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// A chat participant as observed by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub display_name: String,
}

impl PlayerIdentity {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl std::fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

/// Skill estimate for a player: mean and uncertainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub rating: f64,
    pub uncertainty: f64,
}

impl Default for PlayerRating {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            uncertainty: DEFAULT_UNCERTAINTY,
        }
    }
}

impl From<TrueSkillRating> for PlayerRating {
    fn from(rating: TrueSkillRating) -> Self {
        Self {
            rating: rating.rating,
            uncertainty: rating.uncertainty,
        }
    }
}

impl From<PlayerRating> for TrueSkillRating {
    fn from(rating: PlayerRating) -> Self {
        Self {
            rating: rating.rating,
            uncertainty: rating.uncertainty,
        }
    }
}

impl From<PlayerRating> for EloRating {
    fn from(rating: PlayerRating) -> Self {
        Self {
            rating: rating.rating,
        }
    }
}

/// Authoritative per-player record held by the player store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub display_name: String,
    pub in_game_name: Option<String>,
    pub rating: PlayerRating,
    pub decaying: bool,
    pub games_played: u64,
}

impl PlayerRecord {
    /// Create a record for a newly observed player
    pub fn new(identity: &PlayerIdentity, in_game_name: Option<String>, rating: PlayerRating) -> Self {
        Self {
            player_id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            in_game_name,
            rating,
            decaying: false,
            games_played: 0,
        }
    }

    /// Apply a rating produced by the rating engine
    pub fn apply_rating(&mut self, new_rating: PlayerRating) {
        self.rating = new_rating;
        self.games_played += 1;
    }
}

/// Read-optimized projection of a player's rating for the ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: f64,
}

impl From<&PlayerRecord> for LadderEntry {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            player_id: record.player_id.clone(),
            display_name: record.display_name.clone(),
            rating: record.rating.rating,
        }
    }
}

/// State of a single match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    /// Participants captured, start information being published
    Forming,
    /// Waiting for the external result artifact
    AwaitingResult,
    /// Result received, ratings being computed and persisted
    Resolving,
    /// Ratings applied (terminal)
    Resolved,
    /// No result arrived before the timeout (terminal)
    Expired,
}

/// Observable state of the coordinator as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Empty,
    Queuing,
    Forming,
    AwaitingResult,
    Resolving,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Empty => write!(f, "Empty"),
            LifecycleState::Queuing => write!(f, "Queuing"),
            LifecycleState::Forming => write!(f, "Forming"),
            LifecycleState::AwaitingResult => write!(f, "AwaitingResult"),
            LifecycleState::Resolving => write!(f, "Resolving"),
        }
    }
}

/// A fixed-size group of queued players formed for one game session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub participants: Vec<PlayerIdentity>,
    pub formed_at: DateTime<Utc>,
    pub state: MatchState,
}

impl Match {
    pub fn has_participant(&self, player_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == player_id)
    }

    pub fn participant_ids(&self) -> Vec<PlayerId> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }
}

/// Outcome of a join request
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// Player added to the queue; `formed_match` is set when this join filled it
    Joined {
        position: usize,
        created_record: bool,
        formed_match: Option<Match>,
    },
    AlreadyQueued,
    /// Queue is at capacity while the match limit is reached
    QueueFull,
    /// Player is a participant of an outstanding match
    InMatch,
}

/// Outcome of a leave request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotQueued,
}

/// Final placing of one participant (1 = first; equal ranks are ties)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub rank: u32,
}

/// Parsed, validated result of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: Option<MatchId>,
    pub standings: Vec<Standing>,
}

impl MatchOutcome {
    pub fn rank_of(&self, player_id: &str) -> Option<u32> {
        self.standings
            .iter()
            .find(|s| s.player_id == player_id)
            .map(|s| s.rank)
    }
}

/// Rating change information for a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub old_rating: PlayerRating,
    pub new_rating: PlayerRating,
    pub rank: u32,
}

impl RatingChange {
    pub fn delta(&self) -> f64 {
        self.new_rating.rating - self.old_rating.rating
    }
}

/// Event emitted when a match has been formed from a full queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStarted {
    pub match_id: MatchId,
    pub participants: Vec<PlayerIdentity>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match result has been applied to the ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResolved {
    pub match_id: MatchId,
    pub rating_changes: Vec<RatingChange>,
    pub match_quality: f64,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match timed out without a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchExpired {
    pub match_id: MatchId,
    pub participants: Vec<PlayerIdentity>,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LadderEvent {
    MatchStarted(MatchStarted),
    MatchResolved(MatchResolved),
    MatchExpired(MatchExpired),
}
