//! Event publisher implementations

use crate::error::{LadderError, Result};
use crate::events::EventPublisher;
use crate::types::{LadderEvent, MatchExpired, MatchResolved, MatchStarted};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Publisher that only writes events to the log
#[derive(Debug, Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish_match_started(&self, event: MatchStarted) -> Result<()> {
        let names: Vec<&str> = event
            .participants
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        info!("Match {} started: {}", event.match_id, names.join(", "));
        Ok(())
    }

    async fn publish_match_resolved(&self, event: MatchResolved) -> Result<()> {
        for change in &event.rating_changes {
            info!(
                "Match {}: {} placed {} ({:.1} -> {:.1})",
                event.match_id,
                change.player_id,
                change.rank,
                change.old_rating.rating,
                change.new_rating.rating
            );
        }
        Ok(())
    }

    async fn publish_match_expired(&self, event: MatchExpired) -> Result<()> {
        info!(
            "Match {} expired without a result ({} participants released)",
            event.match_id,
            event.participants.len()
        );
        Ok(())
    }
}

/// Publisher that fans events out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<LadderEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LadderEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: LadderEvent) -> Result<()> {
        // Events are fire-and-forget; having no subscribers is not a failure
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!("No event subscribers, dropping {}", event_name(&event));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish_match_started(&self, event: MatchStarted) -> Result<()> {
        self.send(LadderEvent::MatchStarted(event))
    }

    async fn publish_match_resolved(&self, event: MatchResolved) -> Result<()> {
        self.send(LadderEvent::MatchResolved(event))
    }

    async fn publish_match_expired(&self, event: MatchExpired) -> Result<()> {
        self.send(LadderEvent::MatchExpired(event))
    }
}

/// Publisher that forwards every event to several publishers.
///
/// Every publisher is tried; the first failure is returned afterwards.
#[derive(Default)]
pub struct FanoutEventPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    async fn forward(&self, event: LadderEvent) -> Result<()> {
        let mut first_error = None;

        for publisher in &self.publishers {
            let published = match event.clone() {
                LadderEvent::MatchStarted(e) => publisher.publish_match_started(e).await,
                LadderEvent::MatchResolved(e) => publisher.publish_match_resolved(e).await,
                LadderEvent::MatchExpired(e) => publisher.publish_match_expired(e).await,
            };
            if let Err(e) = published {
                warn!("Publisher failed for {}: {}", event_name(&event), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventPublisher for FanoutEventPublisher {
    async fn publish_match_started(&self, event: MatchStarted) -> Result<()> {
        self.forward(LadderEvent::MatchStarted(event)).await
    }

    async fn publish_match_resolved(&self, event: MatchResolved) -> Result<()> {
        self.forward(LadderEvent::MatchResolved(event)).await
    }

    async fn publish_match_expired(&self, event: MatchExpired) -> Result<()> {
        self.forward(LadderEvent::MatchExpired(event)).await
    }
}

pub(crate) fn event_name(event: &LadderEvent) -> &'static str {
    match event {
        LadderEvent::MatchStarted(_) => "MatchStarted",
        LadderEvent::MatchResolved(_) => "MatchResolved",
        LadderEvent::MatchExpired(_) => "MatchExpired",
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<LadderEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail
    pub fn set_failing(&self, fail: bool) {
        self.fail
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<LadderEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| event_name(event) == event_type)
            .count()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: LadderEvent) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LadderError::Internal {
                message: "publisher unavailable".to_string(),
            }
            .into());
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_match_started(&self, event: MatchStarted) -> Result<()> {
        self.record(LadderEvent::MatchStarted(event))
    }

    async fn publish_match_resolved(&self, event: MatchResolved) -> Result<()> {
        self.record(LadderEvent::MatchResolved(event))
    }

    async fn publish_match_expired(&self, event: MatchExpired) -> Result<()> {
        self.record(LadderEvent::MatchExpired(event))
    }
}
