//! Connection lifecycle state machine.
//!
//! Tracks the persistent channel from transport open to a joined room. Uses
//! the action pattern: methods take time as input and return actions for the
//! driver to execute. Room-level events (messages, presence, acks) are not
//! handled here; the owner routes them and reports join outcomes back via
//! [`Connection::room_joined`] and [`Connection::room_error`].
//!
//! # State Machine
//!
//! ```text
//!                  begin             open / connect        room-joined
//! ┌──────────────┐ ────> ┌────────────┐ ────> ┌──────────────────┐ ────> ┌────────┐
//! │ Disconnected │       │ Connecting │       │ AwaitingRoomJoin │       │ Joined │
//! └──────────────┘ <──── └────────────┘ <──── └──────────────────┘ <──── └────────┘
//!          drop / leave / room-error / timeout (from any connected state)
//! ```
//!
//! `Connecting` has two internal phases ([`HandshakePhase`]): waiting for the
//! Engine.IO open packet, then waiting for the Socket.IO connect
//! acknowledgement. Reaching `AwaitingRoomJoin` emits
//! [`ConnectionAction::JoinRoom`] so the owner sends `join-room` with the
//! session's token and username.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use tracing::debug;
use wishpernet_proto::Packet;

use crate::error::ConnectionError;

/// Time allowed from transport open until the server accepts the room join.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Send this packet to the server
    Send(Packet),

    /// Namespace connected; the owner must emit `join-room` now
    JoinRoom,

    /// Close the transport with this reason
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live transport
    Disconnected,
    /// Transport open, Engine.IO/Socket.IO handshake in progress
    Connecting,
    /// `join-room` sent, waiting for `room-joined` or `room-error`
    AwaitingRoomJoin,
    /// Server accepted the join; messages flow
    Joined,
}

/// Sub-step of [`ConnectionState::Connecting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Waiting for the Engine.IO open packet
    AwaitingOpen,
    /// Socket connect sent, waiting for the server's connect packet
    AwaitingConnect,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Limit on `Connecting` plus `AwaitingRoomJoin`
    pub join_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { join_timeout: DEFAULT_JOIN_TIMEOUT }
    }
}

/// Connection state machine
///
/// Pure: no I/O, no Environment storage. Time is passed to the methods that
/// need it. Generic over `Instant` to support both real time and virtual time
/// for deterministic testing.
///
/// # Invariants
///
/// - `phase` is meaningful only while `state == Connecting`.
/// - `heartbeat_window` is set once the Engine.IO open packet arrives and
///   cleared on every transition to `Disconnected`.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    phase: HandshakePhase,
    config: ConnectionConfig,
    /// Last packet received from the server
    last_activity: I,
    /// When the current connection attempt began
    attempt_started: I,
    /// `pingInterval + pingTimeout` from the open handshake
    heartbeat_window: Option<Duration>,
    /// Engine.IO session id
    engine_sid: Option<String>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a new connection in [`ConnectionState::Disconnected`].
    pub fn new(now: I, config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            phase: HandshakePhase::AwaitingOpen,
            config,
            last_activity: now,
            attempt_started: now,
            heartbeat_window: None,
            engine_sid: None,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handshake phase while connecting. `None` in every other state.
    #[must_use]
    pub fn phase(&self) -> Option<HandshakePhase> {
        (self.state == ConnectionState::Connecting).then_some(self.phase)
    }

    /// Engine.IO session id. `None` before the open packet.
    #[must_use]
    pub fn engine_sid(&self) -> Option<&str> {
        self.engine_sid.as_deref()
    }

    /// Configured join timeout.
    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        self.config.join_timeout
    }

    /// Whether a transport is live (any state but `Disconnected`).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state != ConnectionState::Disconnected
    }

    /// Start a connection attempt; call when the transport has opened.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if not `Disconnected`
    pub fn begin(&mut self, now: I) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "begin".to_string(),
            });
        }

        self.phase = HandshakePhase::AwaitingOpen;
        self.attempt_started = now;
        self.last_activity = now;
        self.transition(ConnectionState::Connecting);
        Ok(())
    }

    /// Mark connection as active (call on any packet from the server).
    pub fn update_activity(&mut self, now: I) {
        self.last_activity = now;
    }

    /// Process an Engine.IO or Socket.IO control packet.
    ///
    /// Event and ack packets belong to the owner and are rejected here.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnexpectedPacket` if the packet is invalid for the
    ///   current state or phase
    pub fn handle_packet(
        &mut self,
        packet: &Packet,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.last_activity = now;

        match (self.state, packet) {
            (ConnectionState::Connecting, Packet::Open(handshake))
                if self.phase == HandshakePhase::AwaitingOpen =>
            {
                self.heartbeat_window = Some(
                    Duration::from_millis(handshake.ping_interval)
                        + Duration::from_millis(handshake.ping_timeout),
                );
                self.engine_sid = Some(handshake.sid.clone());
                self.phase = HandshakePhase::AwaitingConnect;
                debug!("engine open, connecting namespace");

                Ok(vec![ConnectionAction::Send(Packet::Connect(None))])
            },

            (ConnectionState::Connecting, Packet::Connect(_))
                if self.phase == HandshakePhase::AwaitingConnect =>
            {
                self.transition(ConnectionState::AwaitingRoomJoin);
                Ok(vec![ConnectionAction::JoinRoom])
            },

            (state, Packet::Ping) if state != ConnectionState::Disconnected => {
                Ok(vec![ConnectionAction::Send(Packet::Pong)])
            },

            (state, Packet::Pong | Packet::Noop) if state != ConnectionState::Disconnected => {
                Ok(vec![])
            },

            (state, Packet::ConnectError(data)) if state != ConnectionState::Disconnected => {
                let reason = ConnectionError::ConnectRefused(data.to_string()).to_string();
                self.reset();
                Ok(vec![ConnectionAction::Close { reason }])
            },

            (state, Packet::Disconnect | Packet::Close)
                if state != ConnectionState::Disconnected =>
            {
                self.reset();
                Ok(vec![ConnectionAction::Close { reason: "server closed connection".to_string() }])
            },

            (state, packet) => {
                Err(ConnectionError::UnexpectedPacket { state, packet: packet.kind() })
            },
        }
    }

    /// Record that the server accepted the room join.
    ///
    /// Idempotent in `Joined`: a repeated `room-joined` is a history replay,
    /// not a protocol violation.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` unless `AwaitingRoomJoin` or `Joined`
    pub fn room_joined(&mut self, now: I) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::AwaitingRoomJoin => {
                self.last_activity = now;
                self.transition(ConnectionState::Joined);
                Ok(())
            },
            ConnectionState::Joined => {
                self.last_activity = now;
                Ok(())
            },
            state => Err(ConnectionError::InvalidState {
                state,
                operation: "room_joined".to_string(),
            }),
        }
    }

    /// Record that the server rejected the room join.
    ///
    /// Terminal for the connection: always ends in `Disconnected`.
    pub fn room_error(&mut self, message: &str) -> Vec<ConnectionAction> {
        let was_connected = self.is_connected();
        self.reset();

        if was_connected {
            vec![ConnectionAction::Close {
                reason: ConnectionError::RoomRejected(message.to_string()).to_string(),
            }]
        } else {
            vec![]
        }
    }

    /// Record that the transport dropped. Returns the state before the drop.
    pub fn transport_lost(&mut self) -> ConnectionState {
        let previous = self.state;
        self.reset();
        previous
    }

    /// Leave the room: disconnect the namespace and close the transport.
    pub fn leave(&mut self) -> Vec<ConnectionAction> {
        if !self.is_connected() {
            return vec![];
        }

        self.reset();
        vec![ConnectionAction::Send(Packet::Disconnect), ConnectionAction::Close {
            reason: "left room".to_string(),
        }]
    }

    /// Timeout error if a deadline has passed. `None` otherwise.
    #[must_use]
    pub fn check_timeout(&self, now: I) -> Option<ConnectionError> {
        match self.state {
            ConnectionState::Disconnected => None,
            ConnectionState::Connecting | ConnectionState::AwaitingRoomJoin => {
                let elapsed = now - self.attempt_started;
                (elapsed > self.config.join_timeout)
                    .then_some(ConnectionError::JoinTimeout { elapsed })
            },
            ConnectionState::Joined => {
                let window = self.heartbeat_window?;
                let elapsed = now - self.last_activity;
                (elapsed > window).then_some(ConnectionError::HeartbeatTimeout { elapsed })
            },
        }
    }

    /// Process periodic maintenance (timeouts).
    ///
    /// Call periodically; closes the connection when a deadline passes.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let Some(err) = self.check_timeout(now) else {
            return vec![];
        };

        self.reset();
        vec![ConnectionAction::Close { reason: err.to_string() }]
    }

    fn reset(&mut self) {
        self.heartbeat_window = None;
        self.engine_sid = None;
        self.phase = HandshakePhase::AwaitingOpen;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            debug!(from = ?self.state, to = ?to, "connection state");
        }
        self.state = to;
    }
}
