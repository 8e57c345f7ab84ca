//! Console chat adapter
//!
//! Drives the coordinator from a terminal. Each input line is
//! `<display name>: <message>` for the group channel or
//! `@<display name>: <message>` for a direct message. The display name
//! doubles as the player id. Replies and match announcements are written
//! as lines to the output.

use crate::commands::{ChatMessage, CommandDispatcher, CommandReply, Delivery};
use crate::error::Result;
use crate::types::{LadderEvent, PlayerIdentity};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// stdin/stdout chat transport
pub struct ConsoleTransport {
    dispatcher: Arc<CommandDispatcher>,
}

impl ConsoleTransport {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Process input lines until EOF. Returns how many lines got a reply.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut replied = 0;

        while let Some(line) = lines.next_line().await? {
            let message = match parse_line(&line) {
                Some(message) => message,
                None => {
                    if !line.trim().is_empty() {
                        debug!("Ignoring console line without author: {}", line);
                    }
                    continue;
                }
            };

            if let Some(reply) = self.dispatcher.handle(&message).await {
                output
                    .write_all(render_reply(&message.author, &reply).as_bytes())
                    .await?;
                output.flush().await?;
                replied += 1;
            }
        }

        Ok(replied)
    }

    /// Write every published match event to `output` until the channel closes
    pub fn spawn_announcer<W>(receiver: broadcast::Receiver<LadderEvent>, mut output: W) -> JoinHandle<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut events = BroadcastStream::new(receiver);

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Console announcer fell behind: {}", e);
                        continue;
                    }
                };

                let text = render_event(&event);
                if let Err(e) = output.write_all(text.as_bytes()).await {
                    warn!("Console announcer stopped: {}", e);
                    break;
                }
                if let Err(e) = output.flush().await {
                    warn!("Console announcer stopped: {}", e);
                    break;
                }
            }
        })
    }
}

/// Parse `name: message` (group) or `@name: message` (direct)
pub fn parse_line(line: &str) -> Option<ChatMessage> {
    let (author, content) = line.split_once(':')?;
    let content = content.trim();

    let (name, direct) = match author.trim().strip_prefix('@') {
        Some(name) => (name.trim(), true),
        None => (author.trim(), false),
    };
    if name.is_empty() {
        return None;
    }

    let author = PlayerIdentity::new(name, name);
    Some(if direct {
        ChatMessage::direct(author, content)
    } else {
        ChatMessage::group(author, content)
    })
}

/// One reply as console output lines
pub fn render_reply(author: &PlayerIdentity, reply: &CommandReply) -> String {
    let prefix = match reply.delivery {
        Delivery::Channel => "[channel]".to_string(),
        Delivery::Direct => format!("[to {}]", author.display_name),
    };

    let mut out = String::new();
    for line in reply.text.lines() {
        out.push_str(&prefix);
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// One match event as a console announcement
pub fn render_event(event: &LadderEvent) -> String {
    match event {
        LadderEvent::MatchStarted(started) => {
            let names: Vec<&str> = started
                .participants
                .iter()
                .map(|p| p.display_name.as_str())
                .collect();
            format!("[channel] Match starting: {}\n", names.join(", "))
        }
        LadderEvent::MatchResolved(resolved) => {
            let mut changes = resolved.rating_changes.clone();
            changes.sort_by_key(|change| change.rank);

            let mut out = "[channel] Match finished:\n".to_string();
            for change in &changes {
                out.push_str(&format!(
                    "[channel]  {}. {} {:.0} ({:+.0})\n",
                    change.rank,
                    change.player_id,
                    change.new_rating.rating,
                    change.delta()
                ));
            }
            out
        }
        LadderEvent::MatchExpired(expired) => format!(
            "[channel] Match {} got no result and was cancelled. Queue up again with !joinqueue.\n",
            expired.match_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LadderOrder, QueueSettings, RatingSettings};
    use crate::events::BroadcastEventPublisher;
    use crate::ladder::LadderCache;
    use crate::lifecycle::MatchLifecycle;
    use crate::metrics::MetricsCollector;
    use crate::rating::create_calculator;
    use crate::store::InMemoryPlayerStore;
    use std::time::Duration;

    fn create_transport(publisher: Arc<BroadcastEventPublisher>) -> ConsoleTransport {
        let store = Arc::new(InMemoryPlayerStore::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let ladder = Arc::new(LadderCache::new(
            store.clone(),
            LadderOrder::Descending,
            Duration::from_secs(1),
        ));
        let lifecycle = Arc::new(MatchLifecycle::new(
            QueueSettings {
                max_queue_size: 2,
                ..QueueSettings::default()
            },
            Duration::from_secs(1),
            store,
            create_calculator(&RatingSettings::default()).unwrap(),
            ladder,
            publisher,
            metrics.clone(),
        ));
        ConsoleTransport::new(Arc::new(CommandDispatcher::new(lifecycle, metrics)))
    }

    #[test]
    fn test_parse_line() {
        let message = parse_line("alice: !joinqueue Ali").unwrap();
        assert_eq!(message.author.id, "alice");
        assert_eq!(message.content, "!joinqueue Ali");
        assert_eq!(message.channel, crate::commands::ChannelKind::Group);

        let message = parse_line("@bob: !rating").unwrap();
        assert_eq!(message.author.display_name, "bob");
        assert_eq!(message.channel, crate::commands::ChannelKind::Direct);

        assert!(parse_line("no author here").is_none());
        assert!(parse_line(": !queue").is_none());
    }

    #[tokio::test]
    async fn test_console_session() {
        let publisher = Arc::new(BroadcastEventPublisher::new(8));
        let mut events = publisher.subscribe();
        let transport = create_transport(publisher);

        let input: &[u8] = b"alice: !joinqueue Ali\n\nalice: hello\n@alice: !queue\nbob: !joinqueue Bobby\n";
        let mut output = Vec::new();

        let replied = transport.run(input, &mut output).await.unwrap();
        assert_eq!(replied, 3);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("[channel] alice has joined the queue. (1/2)"));
        assert!(text.contains("[to alice] Queue: 1/2"));

        let started = events.recv().await.unwrap();
        assert_eq!(
            render_event(&started),
            "[channel] Match starting: alice, bob\n"
        );
    }
}
