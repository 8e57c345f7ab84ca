//! Rating engine
//!
//! Pure rating calculations over finished matches. TrueSkill is the default
//! algorithm; an Elo variant is available for deployments that prefer it.

pub mod calculator;
pub mod elo;
pub mod trueskill;

use crate::config::{RatingAlgorithm, RatingSettings};
use crate::error::Result;
use std::sync::Arc;

// Re-export commonly used types
pub use calculator::{participant_ranks, RatingCalculationResult, RatingCalculator};
pub use elo::EloRatingCalculator;
pub use trueskill::{ExtendedTrueSkillConfig, TrueSkillRatingCalculator};

/// Build the calculator selected by `settings.algorithm`
pub fn create_calculator(settings: &RatingSettings) -> Result<Arc<dyn RatingCalculator>> {
    let calculator: Arc<dyn RatingCalculator> = match settings.algorithm {
        RatingAlgorithm::TrueSkill => Arc::new(TrueSkillRatingCalculator::new(
            ExtendedTrueSkillConfig::from_settings(settings),
        )?),
        RatingAlgorithm::Elo => Arc::new(EloRatingCalculator::from_settings(settings)?),
    };
    Ok(calculator)
}
