//! Ladder Room - chat-driven matchmaking for a skill-ranked player ladder
//!
//! Players queue with chat commands; a full queue forms a match, match
//! results update persistent skill ratings, and a cached ladder serves
//! rankings until the next rating change.

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod ladder;
pub mod lifecycle;
pub mod metrics;
pub mod queue;
pub mod rating;
pub mod results;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use commands::CommandDispatcher;
pub use events::EventPublisher;
pub use ladder::LadderCache;
pub use lifecycle::MatchLifecycle;
pub use queue::MatchQueue;
pub use rating::RatingCalculator;
pub use store::PlayerStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
