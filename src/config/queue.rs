//! Queue and match lifecycle configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue capacity and match bookkeeping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Players per match; reaching it forms a match
    pub max_queue_size: usize,
    /// Matches that may await a result at the same time
    pub max_concurrent_matches: usize,
    /// How long a match may wait for its result before it is expired
    pub result_timeout_seconds: u64,
    pub expiry_check_interval_seconds: u64,
    /// Finished matches kept for inspection
    pub match_history_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 10,
            max_concurrent_matches: 1,
            result_timeout_seconds: 3600,
            expiry_check_interval_seconds: 30,
            match_history_size: 20,
        }
    }
}

impl QueueSettings {
    pub fn result_timeout(&self) -> Duration {
        Duration::from_secs(self.result_timeout_seconds)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_seconds)
    }
}

/// Ladder presentation settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LadderSettings {
    pub order: LadderOrder,
}

/// Sort direction of the ladder by rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LadderOrder {
    /// Best player ranked #1
    #[default]
    Descending,
    /// Lowest rating first
    Ascending,
}

impl std::str::FromStr for LadderOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "descending" | "desc" => Ok(LadderOrder::Descending),
            "ascending" | "asc" => Ok(LadderOrder::Ascending),
            other => Err(format!("unknown ladder order '{}'", other)),
        }
    }
}
