//! UDP session toward the game server
//!
//! A session owns the player identity, the monotonic sequence counter,
//! and the UDP socket. Sends run on the caller's task; a background task
//! spawned by `start()` receives server replies for the whole running
//! lifetime and reports them as events.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionConfig;
use crate::protocol::{CodecError, Inbound, Message, Packet, PlayerId, MAX_DATAGRAM_SIZE};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session not running")]
    NotRunning,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Events emitted by the background receive loop
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A server datagram arrived and was classified
    Datagram { inbound: Inbound },
    /// A recoverable receive error occurred; the loop continues
    RecvError { message: String },
}

/// A diagnostic UDP session with the game server
pub struct Session {
    /// Identity generated once at session creation, immutable
    player_id: PlayerId,
    /// Server address the socket is connected to
    server_addr: SocketAddr,
    /// Shared with the receive task; UDP send/recv need no locking
    socket: Arc<UdpSocket>,
    /// Strictly monotonic counter, bumped before each outbound packet.
    /// Mutated only here on the send path; the receive task never reads it.
    sequence: u64,
    /// Running flag, the sole cancellation signal for the receive task
    running: Arc<AtomicBool>,
    /// Event sender handed to the receive task
    event_tx: mpsc::Sender<SessionEvent>,
    /// Event receiver (for consumers)
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    /// Handle of the spawned receive task
    recv_task: Option<JoinHandle<()>>,
    config: SessionConfig,
}

impl Session {
    /// Create a session bound to an ephemeral local port and connected
    /// to the server address.
    pub async fn connect(server_addr: SocketAddr, config: SessionConfig) -> SessionResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server_addr).await?;

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let player_id = PlayerId::generate();

        tracing::info!("Session created: player {} -> {}", player_id, server_addr);

        Ok(Self {
            player_id,
            server_addr,
            socket: Arc::new(socket),
            sequence: 0,
            running: Arc::new(AtomicBool::new(false)),
            event_tx,
            event_rx: Some(event_rx),
            recv_task: None,
            config,
        })
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Get the session's player identity
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Get the server address
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Get the sequence number of the most recent outbound packet
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Check whether the session is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the session: spawn the receive loop and send the join
    /// heartbeat. Fails if the session is already running.
    pub async fn start(&mut self) -> SessionResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let socket = Arc::clone(&self.socket);
        let running = Arc::clone(&self.running);
        let receive_timeout = self.config.receive_timeout;

        self.recv_task = Some(tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

            while running.load(Ordering::SeqCst) {
                // The timeout bounds cancellation latency: after each
                // expiry the running flag is checked again.
                match tokio::time::timeout(receive_timeout, socket.recv(&mut buf)).await {
                    Err(_) => continue,
                    Ok(Ok(len)) => {
                        let inbound = Inbound::classify(&buf[..len]);
                        match &inbound {
                            Inbound::Text(text) => {
                                tracing::debug!("received {} bytes of text: {}", len, text)
                            }
                            Inbound::Binary(_) => {
                                tracing::debug!("received {} bytes of binary data", len)
                            }
                        }
                        if event_tx.send(SessionEvent::Datagram { inbound }).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        // One bad datagram never kills the loop. After
                        // stop() the error is just the socket going away.
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        tracing::warn!("receive error: {}", e);
                        let _ = event_tx
                            .send(SessionEvent::RecvError {
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }

            tracing::debug!("receive loop exited");
        }));

        tracing::info!("Session started");

        // Initial heartbeat joins the game (sequence 1)
        self.send_heartbeat().await?;

        Ok(())
    }

    /// Stop the session. Idempotent: stopping a stopped session is a no-op.
    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(task) = self.recv_task.take() {
            task.abort();
            let _ = task.await;
        }

        tracing::info!("Session stopped");
    }

    /// Send a heartbeat (not reliable)
    pub async fn send_heartbeat(&mut self) -> SessionResult<u64> {
        self.ensure_running()?;
        let sequence = self.next_sequence();
        let message = Message::Heartbeat {
            player_id: self.player_id,
            sequence,
        };
        self.transmit(sequence, message).await
    }

    /// Send a position update (reliable)
    pub async fn send_move(&mut self, x: f64, y: f64) -> SessionResult<u64> {
        self.ensure_running()?;
        let sequence = self.next_sequence();
        let message = Message::PlayerMove {
            player_id: self.player_id,
            x,
            y,
        };
        self.transmit(sequence, message).await
    }

    /// Send a chat message (reliable)
    pub async fn send_chat(&mut self, text: String) -> SessionResult<u64> {
        self.ensure_running()?;
        let sequence = self.next_sequence();
        let message = Message::Chat {
            player_id: self.player_id,
            message: text,
        };
        self.transmit(sequence, message).await
    }

    /// Send a named action with an empty data payload (reliable)
    pub async fn send_action(&mut self, action: String) -> SessionResult<u64> {
        self.ensure_running()?;
        let sequence = self.next_sequence();
        let message = Message::PlayerAction {
            player_id: self.player_id,
            action,
            data: serde_json::Map::new(),
        };
        self.transmit(sequence, message).await
    }

    /// Acknowledge a sequence number (not reliable).
    ///
    /// The caller supplies the sequence to acknowledge; the session does
    /// not check that it was ever observed.
    pub async fn send_ack(&mut self, sequence_to_ack: u64) -> SessionResult<u64> {
        self.ensure_running()?;
        let sequence = self.next_sequence();
        let message = Message::Ack {
            sequence: sequence_to_ack,
        };
        self.transmit(sequence, message).await
    }

    fn ensure_running(&self) -> SessionResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SessionError::NotRunning)
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Wrap, encode, and transmit one datagram. Errors propagate to the
    /// caller; each send is independent.
    async fn transmit(&mut self, sequence: u64, message: Message) -> SessionResult<u64> {
        let kind = message.kind();
        let packet = Packet::new(sequence, message);
        let bytes = packet.encode()?;
        self.socket.send(&bytes).await?;
        tracing::info!("sent {} (sequence {})", kind, sequence);
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Bind a fake server socket on an ephemeral loopback port
    async fn fake_server() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv_packet(server: &UdpSocket) -> (Packet, SocketAddr) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .expect("timed out waiting for datagram")
            .unwrap();
        (Packet::decode(&buf[..len]).unwrap(), from)
    }

    #[tokio::test]
    async fn test_start_sends_join_heartbeat_with_sequence_one() {
        let (server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();

        session.start().await.unwrap();

        let (packet, _) = recv_packet(&server).await;
        assert_eq!(packet.sequence, 1);
        assert!(!packet.reliable);
        match packet.message {
            Message::Heartbeat { player_id, sequence } => {
                assert_eq!(player_id, session.player_id());
                assert_eq!(sequence, 1);
            }
            other => panic!("expected Heartbeat, got {:?}", other),
        }

        session.stop().await;
    }

    #[tokio::test]
    async fn test_send_move_carries_coordinates_and_reliable_flag() {
        let (server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();
        let _ = recv_packet(&server).await; // join heartbeat

        let seq = session.send_move(3.5, -2.0).await.unwrap();
        assert_eq!(seq, 2);

        let (packet, _) = recv_packet(&server).await;
        assert_eq!(packet.sequence, 2);
        assert!(packet.reliable);
        match packet.message {
            Message::PlayerMove { x, y, .. } => {
                assert_eq!(x, 3.5);
                assert_eq!(y, -2.0);
            }
            other => panic!("expected PlayerMove, got {:?}", other),
        }

        session.stop().await;
    }

    #[tokio::test]
    async fn test_sequence_increases_by_one_across_all_operations() {
        let (server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();
        assert_eq!(session.sequence(), 1);

        assert_eq!(session.send_move(1.0, 2.0).await.unwrap(), 2);
        assert_eq!(session.send_chat("hello".to_string()).await.unwrap(), 3);
        assert_eq!(session.send_action("attack".to_string()).await.unwrap(), 4);
        assert_eq!(session.send_ack(2).await.unwrap(), 5);
        assert_eq!(session.send_heartbeat().await.unwrap(), 6);
        assert_eq!(session.sequence(), 6);

        // Every packet observed on the wire carries its own sequence
        for expected in 1..=6u64 {
            let (packet, _) = recv_packet(&server).await;
            assert_eq!(packet.sequence, expected);
        }

        session.stop().await;
    }

    #[tokio::test]
    async fn test_ack_acknowledges_arbitrary_sequence() {
        let (server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();
        let _ = recv_packet(&server).await;

        session.send_ack(9999).await.unwrap();
        let (packet, _) = recv_packet(&server).await;
        assert!(!packet.reliable);
        assert_eq!(packet.message, Message::Ack { sequence: 9999 });

        session.stop().await;
    }

    #[tokio::test]
    async fn test_binary_datagram_is_classified_not_fatal() {
        let (server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();
        let mut events = session.take_event_receiver().unwrap();

        // The join heartbeat tells the server where the client lives
        let (_, client_addr) = recv_packet(&server).await;
        server.send_to(&[0xFF, 0xFE, 0x00], client_addr).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        match event {
            SessionEvent::Datagram { inbound } => {
                assert_eq!(inbound, Inbound::Binary(vec![0xFF, 0xFE, 0x00]));
            }
            other => panic!("expected Datagram, got {:?}", other),
        }

        // The loop survives; a text reply still comes through
        server.send_to(b"pong", client_addr).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            SessionEvent::Datagram { inbound } => {
                assert_eq!(inbound, Inbound::Text("pong".to_string()));
            }
            other => panic!("expected Datagram, got {:?}", other),
        }

        session.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (_server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();

        session.stop().await;
        assert!(!session.is_running());
        session.stop().await;
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_no_sends_after_stop() {
        let (_server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();
        session.stop().await;

        assert!(matches!(
            session.send_heartbeat().await,
            Err(SessionError::NotRunning)
        ));
        assert!(matches!(
            session.send_move(0.0, 0.0).await,
            Err(SessionError::NotRunning)
        ));
        // Counter untouched by the refused sends
        assert_eq!(session.sequence(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (_server, addr) = fake_server().await;
        let mut session = Session::connect(addr, SessionConfig::default()).await.unwrap();
        session.start().await.unwrap();

        assert!(matches!(
            session.start().await,
            Err(SessionError::AlreadyRunning)
        ));

        session.stop().await;
    }
}
