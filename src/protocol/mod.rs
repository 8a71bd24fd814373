//! Protocol module - Defines the wire format spoken toward the game server
//!
//! Outbound datagrams use a JSON envelope so the tool stays trivially
//! inspectable on the wire. The addressed server replies in its own
//! compact binary serialization; inbound datagrams are therefore only
//! classified as text or opaque binary, never decoded.

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum datagram size (conventional Ethernet MTU)
pub const MAX_DATAGRAM_SIZE: usize = 1500;
