//! TrueSkill rating system implementation
//!
//! This module provides the default rating calculator using the TrueSkill
//! algorithm from the skillratings crate. Each participant is treated as a
//! one-player team; equal ranks are ties.

use crate::config::RatingSettings;
use crate::error::{LadderError, Result};
use crate::rating::calculator::{participant_ranks, RatingCalculationResult, RatingCalculator};
use crate::types::{MatchOutcome, PlayerId, PlayerRating, RatingChange};
use serde::{Deserialize, Serialize};
use skillratings::trueskill::{match_quality, trueskill_multi_team, TrueSkillConfig, TrueSkillRating};
use skillratings::MultiTeamOutcome;

/// Configuration for the TrueSkill calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedTrueSkillConfig {
    /// Core TrueSkill parameters
    pub trueskill_config: TrueSkillConfig,
    /// Initial rating for new players
    pub initial_rating: f64,
    /// Initial uncertainty for new players
    pub initial_uncertainty: f64,
}

impl Default for ExtendedTrueSkillConfig {
    fn default() -> Self {
        Self::from_settings(&RatingSettings::default())
    }
}

impl ExtendedTrueSkillConfig {
    /// Build from the application's rating settings
    pub fn from_settings(settings: &RatingSettings) -> Self {
        Self {
            trueskill_config: TrueSkillConfig {
                draw_probability: settings.draw_probability,
                beta: settings.effective_beta(),
                default_dynamics: settings.dynamics,
            },
            initial_rating: settings.default_rating,
            initial_uncertainty: settings.default_uncertainty,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.trueskill_config.beta <= 0.0 {
            return Err(LadderError::Configuration {
                message: "Beta must be positive".to_string(),
            }
            .into());
        }

        if !(0.0..1.0).contains(&self.trueskill_config.draw_probability) {
            return Err(LadderError::Configuration {
                message: "Draw probability must be in [0, 1)".to_string(),
            }
            .into());
        }

        if self.trueskill_config.default_dynamics < 0.0 {
            return Err(LadderError::Configuration {
                message: "Dynamics must be non-negative".to_string(),
            }
            .into());
        }

        if self.initial_uncertainty <= 0.0 {
            return Err(LadderError::Configuration {
                message: "Initial uncertainty must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// TrueSkill rating calculator implementation
#[derive(Debug)]
pub struct TrueSkillRatingCalculator {
    config: ExtendedTrueSkillConfig,
}

impl TrueSkillRatingCalculator {
    /// Create a new TrueSkill rating calculator
    pub fn new(config: ExtendedTrueSkillConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Draw-likelihood based quality of a pairing (0.0 to 1.0)
    ///
    /// The mean of the pairwise qualities. The multi-team quality of
    /// skillratings cannot handle a match made only of one-player teams.
    pub fn calculate_match_quality(&self, ratings: &[PlayerRating]) -> f64 {
        if ratings.len() < 2 {
            return 0.0;
        }

        let ratings: Vec<TrueSkillRating> = ratings.iter().map(|r| (*r).into()).collect();
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, first) in ratings.iter().enumerate() {
            for second in &ratings[i + 1..] {
                total += match_quality(first, second, &self.config.trueskill_config);
                pairs += 1;
            }
        }

        (total / pairs as f64).clamp(0.0, 1.0)
    }
}

impl RatingCalculator for TrueSkillRatingCalculator {
    fn calculate_rating_changes(
        &self,
        participants: &[(PlayerId, PlayerRating)],
        outcome: &MatchOutcome,
    ) -> Result<RatingCalculationResult> {
        let ranks = participant_ranks(participants, outcome)?;

        let teams: Vec<Vec<TrueSkillRating>> = participants
            .iter()
            .map(|(_, rating)| vec![(*rating).into()])
            .collect();

        let teams_and_ranks: Vec<(&[TrueSkillRating], MultiTeamOutcome)> = teams
            .iter()
            .zip(&ranks)
            .map(|(team, rank)| (team.as_slice(), MultiTeamOutcome::new(*rank as usize)))
            .collect();

        let new_ratings = trueskill_multi_team(&teams_and_ranks, &self.config.trueskill_config);

        if new_ratings.len() != participants.len() {
            return Err(LadderError::Rating {
                reason: format!(
                    "Expected {} updated ratings, got {}",
                    participants.len(),
                    new_ratings.len()
                ),
            }
            .into());
        }

        let mut rating_changes = Vec::with_capacity(participants.len());
        for (((player_id, old_rating), team), rank) in
            participants.iter().zip(&new_ratings).zip(&ranks)
        {
            let new_rating: PlayerRating = team
                .first()
                .copied()
                .ok_or_else(|| LadderError::Rating {
                    reason: format!("Missing rating result for player {}", player_id),
                })?
                .into();

            rating_changes.push(RatingChange {
                player_id: player_id.clone(),
                old_rating: *old_rating,
                new_rating,
                rank: *rank,
            });
        }

        let old_ratings: Vec<PlayerRating> = participants.iter().map(|(_, r)| *r).collect();

        Ok(RatingCalculationResult {
            rating_changes,
            match_quality: self.calculate_match_quality(&old_ratings),
        })
    }

    fn initial_rating(&self) -> PlayerRating {
        PlayerRating {
            rating: self.config.initial_rating,
            uncertainty: self.config.initial_uncertainty,
        }
    }

    fn name(&self) -> &'static str {
        "trueskill"
    }
}
