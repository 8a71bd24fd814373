//! Packet codec for the UDP wire envelope
//!
//! Every outbound datagram is one JSON-encoded [`Packet`]. Inbound
//! datagrams are only classified as text or opaque binary; the server's
//! native binary serialization is deliberately not decoded here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::{Message, MAX_DATAGRAM_SIZE};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Datagram too large: {0} bytes (max: {1})")]
    DatagramTooLarge(usize, usize),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// The wire envelope wrapping one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Session sequence number, unique per outbound packet
    pub sequence: u64,
    /// Milliseconds since the Unix epoch at construction time
    pub timestamp: u64,
    /// The wrapped message
    pub message: Message,
    /// Advisory reliability flag, fixed per message kind
    pub reliable: bool,
}

impl Packet {
    /// Wrap a message in an envelope stamped with the current time.
    ///
    /// The reliability flag comes from the message kind and cannot be
    /// supplied by the caller.
    pub fn new(sequence: u64, message: Message) -> Self {
        let reliable = message.is_reliable();
        Self {
            sequence,
            timestamp: epoch_millis(),
            message,
            reliable,
        }
    }

    /// Encode the envelope as one JSON datagram.
    ///
    /// The encoded form is traced at debug level so an operator running
    /// with `--verbose` sees exactly what goes on the wire.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let json = serde_json::to_string(self)?;
        tracing::debug!("sending packet: {}", json);

        let bytes = json.into_bytes();
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(CodecError::DatagramTooLarge(bytes.len(), MAX_DATAGRAM_SIZE));
        }
        Ok(bytes)
    }

    /// Decode an envelope from datagram bytes
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Current time in milliseconds since the Unix epoch
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Classification of an inbound datagram
///
/// The test peer speaks JSON while the server replies in its compact
/// binary format, so most server replies land in `Binary`. Classification
/// never fails: a datagram is either valid UTF-8 or it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The datagram decoded as UTF-8 text
    Text(String),
    /// The raw bytes of a datagram that is not valid UTF-8
    Binary(Vec<u8>),
}

impl Inbound {
    /// Classify a received datagram as text or opaque binary
    pub fn classify(data: &[u8]) -> Self {
        match std::str::from_utf8(data) {
            Ok(text) => Inbound::Text(text.to_string()),
            Err(_) => Inbound::Binary(data.to_vec()),
        }
    }
}

impl fmt::Display for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inbound::Text(text) => write!(f, "{}", text),
            Inbound::Binary(bytes) => {
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}
