//! Rating system configuration

use serde::{Deserialize, Serialize};

/// Rating assigned to players on their first `joinqueue`
pub const DEFAULT_RATING: f64 = 1000.0;

/// Uncertainty assigned to players on their first `joinqueue`
pub const DEFAULT_UNCERTAINTY: f64 = 1000.0 / 3.0;

/// Which rating update is applied to match results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingAlgorithm {
    /// Bayesian pairwise update over adjacent ranks
    TrueSkill,
    /// Expected-score update, uncertainty untouched
    Elo,
}

impl std::str::FromStr for RatingAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trueskill" => Ok(RatingAlgorithm::TrueSkill),
            "elo" => Ok(RatingAlgorithm::Elo),
            other => Err(format!("unknown rating algorithm '{}'", other)),
        }
    }
}

/// Rating settings shared by the rating engine and player creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    pub algorithm: RatingAlgorithm,
    pub default_rating: f64,
    pub default_uncertainty: f64,
    /// Upper bound on rounds a participant can win in one match
    pub number_of_rounds: u32,
    /// Performance variance constant; half of `default_uncertainty` when unset
    pub beta: Option<f64>,
    pub draw_probability: f64,
    /// Uncertainty added before each update; 0 keeps uncertainty non-increasing
    pub dynamics: f64,
    pub elo_k: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            algorithm: RatingAlgorithm::TrueSkill,
            default_rating: DEFAULT_RATING,
            default_uncertainty: DEFAULT_UNCERTAINTY,
            number_of_rounds: 16,
            beta: None,
            draw_probability: 0.1,
            dynamics: 0.0,
            elo_k: 32.0,
        }
    }
}

impl RatingSettings {
    /// Performance variance in effect
    pub fn effective_beta(&self) -> f64 {
        self.beta.unwrap_or(self.default_uncertainty / 2.0)
    }
}
