//! Network module - UDP session toward the game server
//!
//! Provides:
//! - Session owning the shared socket, player identity, and sequence counter
//! - Background receive loop classifying server replies
//! - Host resolution helpers

mod session;

pub use session::*;

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on the blocking receive wait; also the cancellation latency
    pub receive_timeout: Duration,
    /// Capacity of the session event channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(1),
            event_buffer: 256,
        }
    }
}

impl SessionConfig {
    pub fn with_receive_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.receive_timeout = Duration::from_millis(timeout_ms);
        self
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
