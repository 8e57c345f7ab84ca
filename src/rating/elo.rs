//! Elo rating calculator
//!
//! Lower-complexity alternative to TrueSkill: each participant plays a
//! virtual game against every other participant and the K-scaled score
//! differences are averaged. Uncertainty is left unchanged.

use crate::config::RatingSettings;
use crate::error::{LadderError, Result};
use crate::rating::calculator::{participant_ranks, RatingCalculationResult, RatingCalculator};
use crate::types::{MatchOutcome, PlayerId, PlayerRating, RatingChange};
use skillratings::elo::{expected_score, EloRating};

/// Elo calculator with a fixed K factor
#[derive(Debug, Clone)]
pub struct EloRatingCalculator {
    k: f64,
    initial_rating: PlayerRating,
}

impl EloRatingCalculator {
    pub fn new(k: f64, initial_rating: PlayerRating) -> Result<Self> {
        if k <= 0.0 {
            return Err(LadderError::Configuration {
                message: "Elo K factor must be positive".to_string(),
            }
            .into());
        }
        Ok(Self { k, initial_rating })
    }

    pub fn from_settings(settings: &RatingSettings) -> Result<Self> {
        Self::new(
            settings.elo_k,
            PlayerRating {
                rating: settings.default_rating,
                uncertainty: settings.default_uncertainty,
            },
        )
    }
}

/// Score of a against b from their ranks: win 1, tie 0.5, loss 0
fn actual_score(rank_a: u32, rank_b: u32) -> f64 {
    match rank_a.cmp(&rank_b) {
        std::cmp::Ordering::Less => 1.0,
        std::cmp::Ordering::Equal => 0.5,
        std::cmp::Ordering::Greater => 0.0,
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn calculate_rating_changes(
        &self,
        participants: &[(PlayerId, PlayerRating)],
        outcome: &MatchOutcome,
    ) -> Result<RatingCalculationResult> {
        let ranks = participant_ranks(participants, outcome)?;
        let elo_ratings: Vec<EloRating> = participants.iter().map(|(_, r)| (*r).into()).collect();
        let opponents = participants.len().saturating_sub(1).max(1) as f64;

        let mut rating_changes = Vec::with_capacity(participants.len());
        let mut expected_spread = 0.0;

        for (i, (player_id, old_rating)) in participants.iter().enumerate() {
            let mut delta = 0.0;
            for j in 0..participants.len() {
                if i == j {
                    continue;
                }
                let (expected, _) = expected_score(&elo_ratings[i], &elo_ratings[j]);
                delta += self.k * (actual_score(ranks[i], ranks[j]) - expected);
                expected_spread += (expected - 0.5).abs();
            }

            rating_changes.push(RatingChange {
                player_id: player_id.clone(),
                old_rating: *old_rating,
                new_rating: PlayerRating {
                    rating: old_rating.rating + delta / opponents,
                    uncertainty: old_rating.uncertainty,
                },
                rank: ranks[i],
            });
        }

        let pairs = (participants.len() * participants.len().saturating_sub(1)).max(1) as f64;

        Ok(RatingCalculationResult {
            rating_changes,
            // 1.0 when every pairing is a coin flip
            match_quality: (1.0 - 2.0 * expected_spread / pairs).clamp(0.0, 1.0),
        })
    }

    fn initial_rating(&self) -> PlayerRating {
        self.initial_rating
    }

    fn name(&self) -> &'static str {
        "elo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Standing;

    fn outcome(standings: &[(&str, u32)]) -> MatchOutcome {
        MatchOutcome {
            match_id: None,
            standings: standings
                .iter()
                .map(|(id, rank)| Standing {
                    player_id: id.to_string(),
                    rank: *rank,
                })
                .collect(),
        }
    }

    fn rating(value: f64) -> PlayerRating {
        PlayerRating {
            rating: value,
            uncertainty: 100.0,
        }
    }

    #[test]
    fn test_equal_players_move_by_half_k() {
        let calculator = EloRatingCalculator::new(32.0, rating(1000.0)).unwrap();
        let players = vec![("a".to_string(), rating(1000.0)), ("b".to_string(), rating(1000.0))];

        let result = calculator
            .calculate_rating_changes(&players, &outcome(&[("a", 1), ("b", 2)]))
            .unwrap();

        assert!((result.rating_changes[0].new_rating.rating - 1016.0).abs() < 1e-9);
        assert!((result.rating_changes[1].new_rating.rating - 984.0).abs() < 1e-9);
        assert_eq!(result.rating_changes[0].new_rating.uncertainty, 100.0);
        assert!((result.match_quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_score_formula() {
        let calculator = EloRatingCalculator::new(32.0, rating(1000.0)).unwrap();
        let players = vec![("a".to_string(), rating(1400.0)), ("b".to_string(), rating(1000.0))];

        let result = calculator
            .calculate_rating_changes(&players, &outcome(&[("a", 1), ("b", 2)]))
            .unwrap();

        // expected = 1 / (1 + 10^(-400/400)) = 10/11
        let expected = 1.0 / (1.0 + 10f64.powf(-1.0));
        let gain = 32.0 * (1.0 - expected);
        assert!((result.rating_changes[0].delta() - gain).abs() < 1e-9);
        assert!((result.rating_changes[1].delta() + gain).abs() < 1e-9);
    }

    #[test]
    fn test_tie_between_equals_changes_nothing() {
        let calculator = EloRatingCalculator::new(32.0, rating(1000.0)).unwrap();
        let players = vec![("a".to_string(), rating(1000.0)), ("b".to_string(), rating(1000.0))];

        let result = calculator
            .calculate_rating_changes(&players, &outcome(&[("a", 1), ("b", 1)]))
            .unwrap();
        assert_eq!(result.rating_changes[0].delta(), 0.0);
        assert_eq!(result.rating_changes[1].delta(), 0.0);
    }

    #[test]
    fn test_invalid_k_rejected() {
        assert!(EloRatingCalculator::new(0.0, rating(1000.0)).is_err());
    }
}
