//! Outbound match notifications
//!
//! The lifecycle announces formed, resolved and expired matches through an
//! `EventPublisher`. Publishing happens after the queue lock is released and
//! a failed publish never undoes the state change it reports.

pub mod publisher;

use crate::error::Result;
use crate::types::{MatchExpired, MatchResolved, MatchStarted};
use async_trait::async_trait;

pub use publisher::{
    BroadcastEventPublisher, FanoutEventPublisher, MockEventPublisher, TracingEventPublisher,
};

/// Trait for publishing match events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a MatchStarted event
    async fn publish_match_started(&self, event: MatchStarted) -> Result<()>;

    /// Publish a MatchResolved event
    async fn publish_match_resolved(&self, event: MatchResolved) -> Result<()>;

    /// Publish a MatchExpired event
    async fn publish_match_expired(&self, event: MatchExpired) -> Result<()>;
}
