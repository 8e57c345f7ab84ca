//! Match lifecycle
//!
//! Coordinates queue -> match -> result -> ladder update. The queue and the
//! set of outstanding matches share one mutex; store calls, rating
//! calculation and event publishing all run outside it.

pub mod manager;

pub use manager::{LifecycleStats, MatchLifecycle};
