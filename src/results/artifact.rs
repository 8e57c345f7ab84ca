//! Match result artifacts
//!
//! The game server writes one JSON document per finished match:
//!
//! ```json
//! {"match_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
//!  "players": [{"player_id": "p1", "rounds_won": 9}, {"player_id": "p2", "rounds_won": 7}]}
//! ```
//!
//! `match_id` is optional. Standings use competition ranking on
//! `rounds_won`: equal counts share a rank and the next rank is skipped.

use crate::error::{LadderError, Result};
use crate::types::{MatchId, MatchOutcome, PlayerId, Standing};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPlayer {
    pub player_id: PlayerId,
    pub rounds_won: u32,
}

/// Raw result document as written by the game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultArtifact {
    #[serde(default)]
    pub match_id: Option<MatchId>,
    pub players: Vec<ArtifactPlayer>,
}

impl ResultArtifact {
    /// Validate and rank the artifact
    pub fn into_outcome(self, number_of_rounds: u32) -> Result<MatchOutcome> {
        if self.players.is_empty() {
            return Err(LadderError::InvalidResult {
                reason: "result lists no players".to_string(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if !seen.insert(player.player_id.as_str()) {
                return Err(LadderError::InvalidResult {
                    reason: format!("player {} listed twice", player.player_id),
                }
                .into());
            }
            if player.rounds_won > number_of_rounds {
                return Err(LadderError::InvalidResult {
                    reason: format!(
                        "player {} won {} rounds, match has {}",
                        player.player_id, player.rounds_won, number_of_rounds
                    ),
                }
                .into());
            }
        }

        let standings = self
            .players
            .iter()
            .map(|player| Standing {
                player_id: player.player_id.clone(),
                rank: 1 + self
                    .players
                    .iter()
                    .filter(|other| other.rounds_won > player.rounds_won)
                    .count() as u32,
            })
            .collect();

        Ok(MatchOutcome {
            match_id: self.match_id,
            standings,
        })
    }
}

/// Parse and rank a JSON result document
pub fn parse_outcome(json: &str, number_of_rounds: u32) -> Result<MatchOutcome> {
    let artifact: ResultArtifact =
        serde_json::from_str(json).map_err(|e| LadderError::InvalidResult {
            reason: format!("malformed result document: {}", e),
        })?;
    artifact.into_outcome(number_of_rounds)
}
