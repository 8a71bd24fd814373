//! Command module - Parses operator input into session operations
//!
//! One line of operator input maps to at most one send. Malformed input
//! is reported and never terminates the session.

use thiserror::Error;

use crate::network::{Session, SessionResult};

/// Command parse errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Invalid coordinates")]
    InvalidCoordinates,

    #[error("Usage: move <x> <y>")]
    MoveUsage,

    #[error("Usage: chat <message>")]
    ChatUsage,

    #[error("Unknown command: {0}")]
    Unknown(String),
}

/// A parsed operator command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Move the player to a position
    Move(f64, f64),
    /// Send a chat message
    Chat(String),
    /// Perform the attack action
    Attack,
    /// Perform the pickup action
    Pickup,
    /// Send a heartbeat
    Heartbeat,
    /// Stop the session and exit
    Quit,
}

impl Command {
    /// Parse one line of operator input.
    ///
    /// `move` takes exactly two numeric tokens; `chat` joins the
    /// remaining tokens with single spaces. Command words are
    /// case-insensitive.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((word, args)) = tokens.split_first() else {
            return Err(CommandError::Empty);
        };

        match word.to_lowercase().as_str() {
            "move" => {
                if args.len() != 2 {
                    return Err(CommandError::MoveUsage);
                }
                let x: f64 = args[0].parse().map_err(|_| CommandError::InvalidCoordinates)?;
                let y: f64 = args[1].parse().map_err(|_| CommandError::InvalidCoordinates)?;
                // Positions are finite by definition
                if !x.is_finite() || !y.is_finite() {
                    return Err(CommandError::InvalidCoordinates);
                }
                Ok(Command::Move(x, y))
            }
            "chat" => {
                if args.is_empty() {
                    return Err(CommandError::ChatUsage);
                }
                Ok(Command::Chat(args.join(" ")))
            }
            "attack" => Ok(Command::Attack),
            "pickup" => Ok(Command::Pickup),
            "heartbeat" => Ok(Command::Heartbeat),
            "quit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Execute a parsed command against the session.
///
/// Returns a confirmation line for the operator, or `None` for `Quit`
/// (which stops the session).
pub async fn dispatch(session: &mut Session, command: Command) -> SessionResult<Option<String>> {
    match command {
        Command::Move(x, y) => {
            session.send_move(x, y).await?;
            Ok(Some(format!("Sent move to ({}, {})", x, y)))
        }
        Command::Chat(text) => {
            let summary = format!("Sent chat: {}", text);
            session.send_chat(text).await?;
            Ok(Some(summary))
        }
        Command::Attack => {
            session.send_action("attack".to_string()).await?;
            Ok(Some("Sent action: attack".to_string()))
        }
        Command::Pickup => {
            session.send_action("pickup".to_string()).await?;
            Ok(Some("Sent action: pickup".to_string()))
        }
        Command::Heartbeat => {
            let sequence = session.send_heartbeat().await?;
            Ok(Some(format!("Sent heartbeat with sequence {}", sequence)))
        }
        Command::Quit => {
            session.stop().await;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move() {
        assert_eq!(Command::parse("move 3.5 -2.0"), Ok(Command::Move(3.5, -2.0)));
    }

    #[test]
    fn test_parse_move_invalid_coordinates() {
        assert_eq!(
            Command::parse("move abc 1.0"),
            Err(CommandError::InvalidCoordinates)
        );
        assert_eq!(
            Command::parse("move inf 1.0"),
            Err(CommandError::InvalidCoordinates)
        );
        assert_eq!(
            Command::parse("move NaN 1.0"),
            Err(CommandError::InvalidCoordinates)
        );
    }

    #[test]
    fn test_parse_move_wrong_arity() {
        assert_eq!(Command::parse("move 1.0"), Err(CommandError::MoveUsage));
        assert_eq!(Command::parse("move 1 2 3"), Err(CommandError::MoveUsage));
    }

    #[test]
    fn test_parse_chat_joins_tokens_with_single_spaces() {
        assert_eq!(
            Command::parse("chat hello   brave    world"),
            Ok(Command::Chat("hello brave world".to_string()))
        );
    }

    #[test]
    fn test_parse_chat_requires_message() {
        assert_eq!(Command::parse("chat"), Err(CommandError::ChatUsage));
    }

    #[test]
    fn test_parse_fixed_commands() {
        assert_eq!(Command::parse("attack"), Ok(Command::Attack));
        assert_eq!(Command::parse("pickup"), Ok(Command::Pickup));
        assert_eq!(Command::parse("heartbeat"), Ok(Command::Heartbeat));
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("QUIT"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            Command::parse("dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dispatch_quit_stops_session_and_blocks_further_sends() {
        use crate::network::{SessionConfig, SessionError};

        let server = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();

        let confirmation = dispatch(&mut session, Command::Quit).await.unwrap();
        assert!(confirmation.is_none());
        assert!(!session.is_running());

        // Queued commands after quit are refused, not sent
        assert!(matches!(
            dispatch(&mut session, Command::Heartbeat).await,
            Err(SessionError::NotRunning)
        ));
    }
}
