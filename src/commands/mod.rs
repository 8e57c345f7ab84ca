//! Chat command handling
//!
//! Transports hand every inbound chat message to the `CommandDispatcher`,
//! which parses `!command args`, calls into the lifecycle, ladder and player
//! store, and returns the reply together with where it should be delivered.

pub mod dispatcher;
pub mod parser;

pub use dispatcher::CommandDispatcher;
pub use parser::Command;

use crate::types::PlayerIdentity;
use serde::{Deserialize, Serialize};

/// Kind of channel a message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Shared text channel
    Group,
    /// Private conversation with the bot
    Direct,
}

/// Where a reply should be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// The channel the command came from
    Channel,
    /// A private message to the author
    Direct,
}

/// An inbound chat message as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: PlayerIdentity,
    pub author_is_bot: bool,
    pub channel: ChannelKind,
    pub content: String,
}

impl ChatMessage {
    /// A message from a human in a group channel
    pub fn group(author: PlayerIdentity, content: impl Into<String>) -> Self {
        Self {
            author,
            author_is_bot: false,
            channel: ChannelKind::Group,
            content: content.into(),
        }
    }

    /// A message from a human sent directly to the bot
    pub fn direct(author: PlayerIdentity, content: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Direct,
            ..Self::group(author, content)
        }
    }
}

/// Reply produced for a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub text: String,
    pub delivery: Delivery,
}

impl CommandReply {
    pub fn channel(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delivery: Delivery::Channel,
        }
    }

    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delivery: Delivery::Direct,
        }
    }
}
