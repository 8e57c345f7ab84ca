//! Command dispatcher
//!
//! Each handler returns `Result<CommandReply>`; `handle` converts failures
//! into user-safe replies at this boundary and logs the full error.

use crate::commands::{ChannelKind, ChatMessage, Command, CommandReply};
use crate::error::{user_message, LadderError, Result};
use crate::ladder::LadderCache;
use crate::lifecycle::MatchLifecycle;
use crate::metrics::MetricsCollector;
use crate::types::{JoinOutcome, LeaveOutcome, PlayerIdentity};
use crate::utils::with_store_timeout;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const HELP_TEXT: &str = "====== Commands ======
!joinqueue <in-game name> : Join the queue if it is not full. New players are added to the ladder.
!leavequeue : Leave the queue.
!queue : Show the queue and its members.
!rating : Show your rating and ladder position.
!ladder : Show the whole ladder.
!commands, !help : Show this message.";

/// Routes parsed chat commands to the coordinator
pub struct CommandDispatcher {
    lifecycle: Arc<MatchLifecycle>,
    metrics_collector: Arc<MetricsCollector>,
}

impl CommandDispatcher {
    pub fn new(lifecycle: Arc<MatchLifecycle>, metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            lifecycle,
            metrics_collector,
        }
    }

    fn ladder(&self) -> &Arc<LadderCache> {
        self.lifecycle.ladder()
    }

    /// Handle one inbound chat message.
    ///
    /// Returns `None` when the message is not for us: bot authors,
    /// unprefixed text and unknown commands.
    pub async fn handle(&self, message: &ChatMessage) -> Option<CommandReply> {
        if message.author_is_bot {
            return None;
        }

        let command = Command::parse(&message.content)?;
        if let Command::Unknown(name) = &command {
            debug!("Ignoring unknown command !{} from {}", name, message.author);
            return None;
        }

        info!("{} issued !{}", message.author, command.name());
        let start = Instant::now();

        let reply = match self.execute(&command, message).await {
            Ok(reply) => reply,
            Err(e) => self.failure_reply(&command, &message.author, e),
        };

        self.metrics_collector
            .record_command(command.name(), start.elapsed());
        Some(reply)
    }

    async fn execute(&self, command: &Command, message: &ChatMessage) -> Result<CommandReply> {
        let author = &message.author;
        match command {
            Command::JoinQueue { in_game_name } => self.join_queue(author, in_game_name.clone()).await,
            Command::LeaveQueue => self.leave_queue(author),
            Command::Queue => self.queue(message.channel),
            Command::Rating => self.rating(author, message.channel).await,
            Command::Ladder => self.ladder_listing(message.channel).await,
            Command::Help => Ok(CommandReply::direct(HELP_TEXT)),
            Command::Unknown(name) => Err(LadderError::Validation {
                reason: format!("Unknown command !{}", name),
            }
            .into()),
        }
    }

    fn failure_reply(
        &self,
        command: &Command,
        author: &PlayerIdentity,
        error: anyhow::Error,
    ) -> CommandReply {
        match error.downcast_ref::<LadderError>() {
            Some(LadderError::Validation { .. }) => {
                debug!("!{} from {} rejected: {}", command.name(), author, error);
            }
            Some(LadderError::ConcurrencyViolation { .. }) => {
                error!(
                    "Invariant violated while handling !{} from {}: {}",
                    command.name(),
                    author,
                    error
                );
            }
            _ => {
                error!(
                    "!{} from {} failed: {:#}",
                    command.name(),
                    author,
                    error
                );
            }
        }
        CommandReply::channel(user_message(&error))
    }

    async fn join_queue(
        &self,
        author: &PlayerIdentity,
        in_game_name: Option<String>,
    ) -> Result<CommandReply> {
        let outcome = self.lifecycle.join(author.clone(), in_game_name).await?;
        let name = &author.display_name;

        let text = match outcome {
            JoinOutcome::Joined {
                position,
                created_record,
                ..
            } => {
                let joined = format!(
                    "{} has joined the queue. ({}/{})",
                    name,
                    position,
                    self.lifecycle.settings().max_queue_size
                );
                if created_record {
                    format!("{} has been added to the ladder!\n{}", name, joined)
                } else {
                    joined
                }
            }
            JoinOutcome::AlreadyQueued => format!("{} is already in the queue.", name),
            JoinOutcome::QueueFull => {
                "The queue is full. Wait for the running match to finish.".to_string()
            }
            JoinOutcome::InMatch => format!(
                "{} is still playing a match that has not reported a result.",
                name
            ),
        };
        Ok(CommandReply::channel(text))
    }

    fn leave_queue(&self, author: &PlayerIdentity) -> Result<CommandReply> {
        let text = match self.lifecycle.leave(&author.id)? {
            LeaveOutcome::Left => format!("{} has left the queue.", author.display_name),
            LeaveOutcome::NotQueued => format!("{} is not in the queue.", author.display_name),
        };
        Ok(CommandReply::channel(text))
    }

    fn queue(&self, channel: ChannelKind) -> Result<CommandReply> {
        let queued = self.lifecycle.queue_snapshot()?;

        let text = if queued.is_empty() {
            "Queue is empty.".to_string()
        } else {
            let mut text = format!(
                "Queue: {}/{}",
                queued.len(),
                self.lifecycle.settings().max_queue_size
            );
            for identity in &queued {
                text.push_str("\n ");
                text.push_str(&identity.display_name);
            }
            text
        };
        Ok(reply_for(channel, text))
    }

    async fn rating(&self, author: &PlayerIdentity, channel: ChannelKind) -> Result<CommandReply> {
        let record = with_store_timeout(
            "find_by_identity",
            self.lifecycle.store_timeout(),
            self.lifecycle.store().find_by_identity(&author.id),
        )
        .await
        .map_err(|e| {
            self.metrics_collector.record_store_error("find_by_identity");
            e
        })?;

        let text = match record {
            None => format!("{} doesn't have a rating yet.", author.display_name),
            Some(record) => match self.ladder().position_of(&author.id).await? {
                Some((position, total)) => {
                    format!(
                        "{}'s rating is: {:.0} (#{} of {})",
                        author.display_name, record.rating.rating, position, total
                    )
                }
                None => {
                    warn!("{} has a record but is missing from the ladder", author);
                    format!(
                        "{}'s rating is: {:.0}",
                        author.display_name, record.rating.rating
                    )
                }
            },
        };
        Ok(reply_for(channel, text))
    }

    async fn ladder_listing(&self, channel: ChannelKind) -> Result<CommandReply> {
        let entries = self.ladder().get().await?;

        let text = if entries.is_empty() {
            "Ladder has no players. Be the first one to join by typing '!joinqueue <in-game name>'!"
                .to_string()
        } else {
            let mut text = "====== Ladder ======\nRank | Name | Rating".to_string();
            for (index, entry) in entries.iter().enumerate() {
                text.push_str(&format!(
                    "\n{}. {} : {:.0}",
                    index + 1,
                    entry.display_name,
                    entry.rating
                ));
            }
            text
        };
        Ok(reply_for(channel, text))
    }
}

/// Informational replies stay in group channels and go direct otherwise
fn reply_for(channel: ChannelKind, text: String) -> CommandReply {
    match channel {
        ChannelKind::Group => CommandReply::channel(text),
        ChannelKind::Direct => CommandReply::direct(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Delivery;
    use crate::config::{LadderOrder, QueueSettings, RatingSettings};
    use crate::error::STORE_FAILURE_REPLY;
    use crate::events::MockEventPublisher;
    use crate::rating::create_calculator;
    use crate::store::{InMemoryPlayerStore, PlayerStore};
    use crate::types::{PlayerRating, PlayerRecord};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl PlayerStore for BrokenStore {
        async fn find_by_identity(
            &self,
            _player_id: &crate::types::PlayerId,
        ) -> Result<Option<PlayerRecord>> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn insert_if_absent(&self, _record: PlayerRecord) -> Result<bool> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn update_rating(
            &self,
            _player_id: &crate::types::PlayerId,
            _rating: PlayerRating,
        ) -> Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn update_ratings(
            &self,
            _updates: &[(crate::types::PlayerId, PlayerRating)],
        ) -> Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn all_records(&self) -> Result<Vec<PlayerRecord>> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn player_count(&self) -> Result<usize> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    fn create_dispatcher(store: Arc<dyn PlayerStore>, max_queue_size: usize) -> CommandDispatcher {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let ladder = Arc::new(LadderCache::new(
            store.clone(),
            LadderOrder::Descending,
            Duration::from_secs(1),
        ));
        let lifecycle = Arc::new(MatchLifecycle::new(
            QueueSettings {
                max_queue_size,
                ..QueueSettings::default()
            },
            Duration::from_secs(1),
            store,
            create_calculator(&RatingSettings::default()).unwrap(),
            ladder,
            Arc::new(MockEventPublisher::new()),
            metrics.clone(),
        ));
        CommandDispatcher::new(lifecycle, metrics)
    }

    fn alice() -> PlayerIdentity {
        PlayerIdentity::new("u1", "alice")
    }

    async fn send(dispatcher: &CommandDispatcher, content: &str) -> CommandReply {
        dispatcher
            .handle(&ChatMessage::group(alice(), content))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ignores_bots_and_chatter() {
        let dispatcher = create_dispatcher(Arc::new(InMemoryPlayerStore::new()), 10);

        assert!(dispatcher
            .handle(&ChatMessage::group(alice(), "gg"))
            .await
            .is_none());
        assert!(dispatcher
            .handle(&ChatMessage::group(alice(), "!dance"))
            .await
            .is_none());

        let mut from_bot = ChatMessage::group(alice(), "!joinqueue Foo");
        from_bot.author_is_bot = true;
        assert!(dispatcher.handle(&from_bot).await.is_none());
    }

    #[tokio::test]
    async fn test_join_leave_and_queue_listing() {
        let dispatcher = create_dispatcher(Arc::new(InMemoryPlayerStore::new()), 10);

        let reply = send(&dispatcher, "!joinqueue AliceIGN").await;
        assert_eq!(
            reply.text,
            "alice has been added to the ladder!\nalice has joined the queue. (1/10)"
        );
        assert_eq!(reply.delivery, Delivery::Channel);

        let reply = send(&dispatcher, "!JOINQUEUE").await;
        assert_eq!(reply.text, "alice is already in the queue.");

        let reply = send(&dispatcher, "!queue").await;
        assert_eq!(reply.text, "Queue: 1/10\n alice");

        let reply = send(&dispatcher, "!leavequeue").await;
        assert_eq!(reply.text, "alice has left the queue.");
        let reply = send(&dispatcher, "!leavequeue").await;
        assert_eq!(reply.text, "alice is not in the queue.");

        let reply = send(&dispatcher, "!queue").await;
        assert_eq!(reply.text, "Queue is empty.");
    }

    #[tokio::test]
    async fn test_missing_ign_reported_inline() {
        let dispatcher = create_dispatcher(Arc::new(InMemoryPlayerStore::new()), 10);

        let reply = send(&dispatcher, "!joinqueue").await;
        assert!(reply.text.contains("in-game name"));
        assert_eq!(send(&dispatcher, "!queue").await.text, "Queue is empty.");
    }

    #[tokio::test]
    async fn test_store_failure_replies_generically() {
        let dispatcher = create_dispatcher(Arc::new(BrokenStore), 10);

        let reply = send(&dispatcher, "!joinqueue Foo").await;
        assert_eq!(reply.text, STORE_FAILURE_REPLY);
        assert!(!reply.text.contains("connection refused"));

        assert_eq!(send(&dispatcher, "!ladder").await.text, STORE_FAILURE_REPLY);
        assert_eq!(send(&dispatcher, "!rating").await.text, STORE_FAILURE_REPLY);
        assert_eq!(send(&dispatcher, "!queue").await.text, "Queue is empty.");
    }

    #[tokio::test]
    async fn test_rating_and_ladder() {
        let store = Arc::new(InMemoryPlayerStore::new());
        store
            .insert_if_absent(PlayerRecord::new(
                &PlayerIdentity::new("u2", "bob"),
                Some("Bob".to_string()),
                PlayerRating {
                    rating: 1200.0,
                    uncertainty: 300.0,
                },
            ))
            .await
            .unwrap();
        let dispatcher = create_dispatcher(store, 10);

        assert_eq!(
            send(&dispatcher, "!rating").await.text,
            "alice doesn't have a rating yet."
        );

        send(&dispatcher, "!joinqueue Ali").await;
        let rebuilds = dispatcher.ladder().rebuild_count();
        assert_eq!(
            send(&dispatcher, "!rating").await.text,
            "alice's rating is: 1000 (#2 of 2)"
        );
        // Position and total come from one ladder read
        assert_eq!(dispatcher.ladder().rebuild_count(), rebuilds + 1);

        let reply = send(&dispatcher, "!ladder").await;
        assert_eq!(
            reply.text,
            "====== Ladder ======\nRank | Name | Rating\n1. bob : 1200\n2. alice : 1000"
        );

        let direct = dispatcher
            .handle(&ChatMessage::direct(alice(), "!ladder"))
            .await
            .unwrap();
        assert_eq!(direct.delivery, Delivery::Direct);
    }

    #[tokio::test]
    async fn test_empty_ladder_and_help() {
        let dispatcher = create_dispatcher(Arc::new(InMemoryPlayerStore::new()), 10);

        assert!(send(&dispatcher, "!ladder")
            .await
            .text
            .starts_with("Ladder has no players."));

        let help = send(&dispatcher, "!commands").await;
        assert_eq!(help.delivery, Delivery::Direct);
        assert!(help.text.contains("!joinqueue"));
    }
}
