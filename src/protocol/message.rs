//! Protocol message definitions
//!
//! Defines all message types exchanged with the game server.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a player, generated once per session.
///
/// Serializes as the plain hyphenated UUID string, which is what the
/// server expects in the `player_id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Generate a fresh random identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// All protocol messages
///
/// Serde's default enum representation produces the wire convention the
/// server uses: a single-key object keyed by the variant name, e.g.
/// `{"Chat":{"player_id":"...","message":"hi"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Keep-alive; also doubles as the join message
    Heartbeat {
        player_id: PlayerId,
        /// Echo of the session sequence counter at send time
        sequence: u64,
    },

    /// Player position update
    PlayerMove {
        player_id: PlayerId,
        x: f64,
        y: f64,
    },

    /// Chat message
    Chat {
        player_id: PlayerId,
        message: String,
    },

    /// Named player action with optional structured payload
    PlayerAction {
        player_id: PlayerId,
        action: String,
        data: serde_json::Map<String, serde_json::Value>,
    },

    /// Acknowledge a received sequence number
    Ack { sequence: u64 },
}

impl Message {
    /// Get the message kind name (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Heartbeat { .. } => "Heartbeat",
            Message::PlayerMove { .. } => "PlayerMove",
            Message::Chat { .. } => "Chat",
            Message::PlayerAction { .. } => "PlayerAction",
            Message::Ack { .. } => "Ack",
        }
    }

    /// Whether this message kind is flagged reliable on the wire.
    ///
    /// The flag is a fixed per-kind policy, not a caller choice. It is
    /// advisory metadata only: this peer never retransmits.
    pub fn is_reliable(&self) -> bool {
        matches!(
            self,
            Message::PlayerMove { .. } | Message::Chat { .. } | Message::PlayerAction { .. }
        )
    }
}
