//! Command parsing

use serde::{Deserialize, Serialize};

const COMMAND_PREFIX: char = '!';

/// A recognised chat command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    JoinQueue { in_game_name: Option<String> },
    LeaveQueue,
    Queue,
    Rating,
    Ladder,
    Help,
    /// Prefixed, but not a command we know
    Unknown(String),
}

impl Command {
    /// Parse a chat message. Returns `None` for anything without the `!` prefix.
    ///
    /// The command word is case-insensitive; everything after it is split on
    /// whitespace. For `joinqueue` the remaining words form the in-game name.
    pub fn parse(content: &str) -> Option<Self> {
        let rest = content.strip_prefix(COMMAND_PREFIX)?;
        let mut words = rest.split_whitespace();
        let name = words.next()?.to_lowercase();

        let command = match name.as_str() {
            "joinqueue" => {
                let args: Vec<&str> = words.collect();
                Command::JoinQueue {
                    in_game_name: if args.is_empty() {
                        None
                    } else {
                        Some(args.join(" "))
                    },
                }
            }
            "leavequeue" => Command::LeaveQueue,
            "queue" => Command::Queue,
            "rating" => Command::Rating,
            "ladder" => Command::Ladder,
            "commands" | "help" => Command::Help,
            _ => Command::Unknown(name),
        };
        Some(command)
    }

    /// Label used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Command::JoinQueue { .. } => "joinqueue",
            Command::LeaveQueue => "leavequeue",
            Command::Queue => "queue",
            Command::Rating => "rating",
            Command::Ladder => "ladder",
            Command::Help => "help",
            Command::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_commands_ignored() {
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("!"), None);
        assert_eq!(Command::parse("!   "), None);
    }

    #[test]
    fn test_command_word_is_case_insensitive() {
        assert_eq!(Command::parse("!LeaveQueue"), Some(Command::LeaveQueue));
        assert_eq!(Command::parse("!LADDER"), Some(Command::Ladder));
        assert_eq!(Command::parse("!help"), Some(Command::Help));
        assert_eq!(Command::parse("!commands"), Some(Command::Help));
    }

    #[test]
    fn test_joinqueue_arguments() {
        assert_eq!(
            Command::parse("!joinqueue"),
            Some(Command::JoinQueue { in_game_name: None })
        );
        assert_eq!(
            Command::parse("!joinqueue   Foo   Bar "),
            Some(Command::JoinQueue {
                in_game_name: Some("Foo Bar".to_string())
            })
        );
    }

    #[test]
    fn test_unknown_command() {
        let command = Command::parse("!dance now").unwrap();
        assert_eq!(command, Command::Unknown("dance".to_string()));
        assert_eq!(command.name(), "unknown");
    }
}
