//! Configuration management for the ladder-room service
//!
//! This module handles all configuration loading from files and environment
//! variables, validation, and default values for the coordinator.

pub mod app;
pub mod queue;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ResultSettings, ServiceSettings, StoreSettings};
pub use queue::{LadderOrder, LadderSettings, QueueSettings};
pub use rating::{RatingAlgorithm, RatingSettings};
