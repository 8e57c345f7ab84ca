//! Match result intake
//!
//! Result events reach the lifecycle through the `ResultListener` observer.
//! `DirectoryResultWatcher` is the adapter that turns result files dropped
//! into a directory into those events.

pub mod artifact;
pub mod watcher;

use crate::error::Result;
use crate::types::MatchOutcome;
use async_trait::async_trait;

pub use artifact::{parse_outcome, ArtifactPlayer, ResultArtifact};
pub use watcher::DirectoryResultWatcher;

/// Receiver of "match result available" events
#[async_trait]
pub trait ResultListener: Send + Sync {
    /// Handle a parsed, validated match outcome
    async fn on_result(&self, outcome: MatchOutcome) -> Result<()>;
}
