//! Rating calculator trait and shared outcome validation
//!
//! A calculator is a pure function of the participants' current ratings and
//! the match outcome. Persisting the result is the caller's job.

use crate::error::{LadderError, Result};
use crate::types::{MatchOutcome, PlayerId, PlayerRating, RatingChange};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Result of a rating calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingCalculationResult {
    /// Rating changes in participant order
    pub rating_changes: Vec<RatingChange>,
    /// Quality score of the match (0.0 to 1.0, higher is better)
    pub match_quality: f64,
}

/// Trait for calculating rating changes after matches
pub trait RatingCalculator: Send + Sync {
    /// Calculate rating changes for participants based on the outcome
    ///
    /// # Arguments
    /// * `participants` - (player_id, current_rating) pairs in match order
    /// * `outcome` - one standing per participant, 1 = first place
    fn calculate_rating_changes(
        &self,
        participants: &[(PlayerId, PlayerRating)],
        outcome: &MatchOutcome,
    ) -> Result<RatingCalculationResult>;

    /// Get the initial rating for new players
    fn initial_rating(&self) -> PlayerRating;

    /// Short name of the algorithm, for logs
    fn name(&self) -> &'static str;
}

/// Resolve each participant's rank, in participant order.
///
/// Every participant needs exactly one standing and the outcome may not name
/// anyone else.
pub fn participant_ranks(
    participants: &[(PlayerId, PlayerRating)],
    outcome: &MatchOutcome,
) -> Result<Vec<u32>> {
    if participants.is_empty() {
        return Err(LadderError::Rating {
            reason: "No participants provided for rating calculation".to_string(),
        }
        .into());
    }

    let mut ranks: HashMap<&str, u32> = HashMap::new();
    for standing in &outcome.standings {
        if standing.rank == 0 {
            return Err(LadderError::Rating {
                reason: format!("Rank 0 given for player {}", standing.player_id),
            }
            .into());
        }
        if ranks.insert(standing.player_id.as_str(), standing.rank).is_some() {
            return Err(LadderError::Rating {
                reason: format!("Duplicate standing for player {}", standing.player_id),
            }
            .into());
        }
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(participants.len());
    for (player_id, _) in participants {
        if !seen.insert(player_id.as_str()) {
            return Err(LadderError::Rating {
                reason: format!("Player {} listed twice as participant", player_id),
            }
            .into());
        }
        match ranks.get(player_id.as_str()) {
            Some(rank) => resolved.push(*rank),
            None => {
                return Err(LadderError::Rating {
                    reason: format!("No standing provided for player {}", player_id),
                }
                .into())
            }
        }
    }

    if ranks.len() != participants.len() {
        return Err(LadderError::Rating {
            reason: "Outcome names players who did not take part".to_string(),
        }
        .into());
    }

    Ok(resolved)
}
