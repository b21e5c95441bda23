//! In-memory model of the room server.
//!
//! Models both surfaces the client talks to:
//!
//! - the HTTP token issuer (`create-room`, `check-room`) through
//!   [`RoomDirectory`]
//! - the Socket.IO channel: each simulated socket has an outbox of packets
//!   the server has sent and not yet delivered
//!
//! The server never sees plaintext. It stores and relays envelopes verbatim,
//! resolves share tokens to their room, and serializes event bodies as JSON
//! strings the way the production server does.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use wishpernet_client::{DirectoryError, RoomDirectory};
use wishpernet_core::Environment;
use wishpernet_proto::{
    CheckRoomResponse, ClientRequest, CreateRoomResponse, GenerateShareToken, JoinRoom,
    MessageEnvelope, OpenHandshake, Packet, Presence, ProtocolError, RoomError, RoomJoined,
    RoomToken, SendMessage, ServerEvent, ShareToken,
};

use crate::SimEnv;

/// Messages replayed to a joining client.
pub const HISTORY_LIMIT: usize = 50;

/// Empty rooms older than this are removed by [`SimServer::cleanup_expired`].
pub const ROOM_TTL: Duration = Duration::from_secs(3600);

/// Rejection text for unknown or expired rooms.
const ROOM_UNAVAILABLE: &str = "Room does not exist or has expired";

/// Engine heartbeat interval advertised in the open handshake (ms).
const PING_INTERVAL_MS: u64 = 25_000;

/// Engine heartbeat timeout advertised in the open handshake (ms).
const PING_TIMEOUT_MS: u64 = 20_000;

/// Identifier of a simulated socket.
pub type SocketId = u64;

struct SimRoom {
    created_at: u64,
    messages: Vec<MessageEnvelope>,
    share_tokens: Vec<ShareToken>,
}

#[derive(Default)]
struct SimSocket {
    outbox: VecDeque<Packet>,
    /// Canonical room and username once joined
    member: Option<(RoomToken, String)>,
}

struct ServerState {
    env: SimEnv,
    rooms: HashMap<RoomToken, SimRoom>,
    /// Share token → canonical room token
    share_map: HashMap<String, RoomToken>,
    /// Ordered so broadcasts are delivered deterministically
    sockets: BTreeMap<SocketId, SimSocket>,
    next_socket: SocketId,
    directory_down: bool,
}

/// Simulated room server.
///
/// Cheap to clone; clones share state, so several simulated clients can talk
/// to one server.
#[derive(Clone)]
pub struct SimServer {
    state: Arc<Mutex<ServerState>>,
}

impl SimServer {
    /// Server drawing tokens and ids from `env`.
    pub fn new(env: SimEnv) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                env,
                rooms: HashMap::new(),
                share_map: HashMap::new(),
                sockets: BTreeMap::new(),
                next_socket: 1,
                directory_down: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a room and return its canonical token.
    pub fn create_room(&self) -> RoomToken {
        let mut state = self.lock();
        let token = RoomToken::from_bytes(&state.env.random_array());
        let created_at = state.env.wall_clock_millis();
        state
            .rooms
            .insert(token.clone(), SimRoom { created_at, messages: Vec::new(), share_tokens: vec![] });
        info!("room created");
        token
    }

    /// Canonical token for a room or share token, if the room exists.
    pub fn resolve(&self, token: &str) -> Option<RoomToken> {
        self.lock().resolve(token)
    }

    /// Members currently joined to the room a token resolves to.
    pub fn user_count(&self, token: &str) -> u32 {
        let state = self.lock();
        state.resolve(token).map_or(0, |room| state.user_count(&room))
    }

    /// Stored envelopes for a room, oldest first.
    pub fn messages(&self, room: &RoomToken) -> Vec<MessageEnvelope> {
        self.lock().rooms.get(room).map(|r| r.messages.clone()).unwrap_or_default()
    }

    /// Share tokens issued for a room.
    pub fn share_tokens(&self, room: &RoomToken) -> Vec<ShareToken> {
        self.lock().rooms.get(room).map(|r| r.share_tokens.clone()).unwrap_or_default()
    }

    /// Delete a room and its share tokens, as if it had expired.
    pub fn expire_room(&self, room: &RoomToken) -> bool {
        self.lock().remove_room(room)
    }

    /// Remove empty rooms older than [`ROOM_TTL`]. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.lock();
        let now = state.env.wall_clock_millis();
        let ttl = u64::try_from(ROOM_TTL.as_millis()).unwrap_or(u64::MAX);

        let expired: Vec<RoomToken> = state
            .rooms
            .iter()
            .filter(|(token, room)| {
                state.user_count(token) == 0 && now.saturating_sub(room.created_at) > ttl
            })
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            state.remove_room(token);
        }
        expired.len()
    }

    /// Make HTTP directory calls fail with a network error.
    pub fn set_directory_down(&self, down: bool) {
        self.lock().directory_down = down;
    }

    /// Accept a transport connection. The open handshake is queued at once.
    pub fn open_socket(&self) -> SocketId {
        let mut state = self.lock();
        let id = state.next_socket;
        state.next_socket += 1;

        let mut socket = SimSocket::default();
        socket.outbox.push_back(Packet::Open(OpenHandshake {
            sid: format!("sim-{id}"),
            upgrades: vec![],
            ping_interval: PING_INTERVAL_MS,
            ping_timeout: PING_TIMEOUT_MS,
            max_payload: Some(1_000_000),
        }));
        state.sockets.insert(id, socket);
        debug!(socket = id, "socket opened");
        id
    }

    /// Drop a transport connection, leaving its room.
    pub fn close_socket(&self, socket: SocketId) {
        let mut state = self.lock();
        state.leave(socket);
        state.sockets.remove(&socket);
        debug!(socket, "socket closed");
    }

    /// Whether the socket is still open.
    pub fn is_open(&self, socket: SocketId) -> bool {
        self.lock().sockets.contains_key(&socket)
    }

    /// Take everything queued for a socket.
    pub fn drain(&self, socket: SocketId) -> Vec<Packet> {
        self.lock()
            .sockets
            .get_mut(&socket)
            .map(|s| s.outbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Queue an arbitrary packet for a socket.
    pub fn inject(&self, socket: SocketId, packet: Packet) {
        self.lock().send(socket, packet);
    }

    /// Queue an Engine ping for a socket.
    pub fn ping(&self, socket: SocketId) {
        self.inject(socket, Packet::Ping);
    }

    /// Process a packet the client sent on `socket`.
    ///
    /// Malformed client events are logged and ignored, as the production
    /// server does.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if a reply fails to serialize
    pub fn receive(&self, socket: SocketId, packet: Packet) -> Result<(), ProtocolError> {
        let mut state = self.lock();
        if !state.sockets.contains_key(&socket) {
            warn!(socket, "packet for closed socket");
            return Ok(());
        }

        match packet {
            Packet::Connect(_) => {
                state.send(socket, Packet::Connect(Some(json!({ "sid": format!("ns-{socket}") }))));
                Ok(())
            },
            Packet::Disconnect | Packet::Close => {
                state.leave(socket);
                Ok(())
            },
            Packet::Ping => {
                state.send(socket, Packet::Pong);
                Ok(())
            },
            Packet::Event { ack, name, data } => match ClientRequest::from_event(&name, data) {
                Ok(ClientRequest::JoinRoom(join)) => state.join(socket, join),
                Ok(ClientRequest::SendMessage(message)) => state.relay(message),
                Ok(ClientRequest::GenerateShareToken(request)) => {
                    state.share(socket, ack, &request);
                    Ok(())
                },
                Err(err) => {
                    warn!(%err, event = %name, "ignoring malformed event");
                    Ok(())
                },
            },
            other => {
                debug!(packet = other.kind(), "ignoring packet");
                Ok(())
            },
        }
    }
}

impl ServerState {
    fn resolve(&self, token: &str) -> Option<RoomToken> {
        let direct = RoomToken::parse(token).ok().filter(|t| self.rooms.contains_key(t));
        direct.or_else(|| self.share_map.get(token).filter(|t| self.rooms.contains_key(*t)).cloned())
    }

    fn user_count(&self, room: &RoomToken) -> u32 {
        let count = self
            .sockets
            .values()
            .filter(|s| s.member.as_ref().is_some_and(|(r, _)| r == room))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn members(&self, room: &RoomToken) -> Vec<SocketId> {
        self.sockets
            .iter()
            .filter(|(_, s)| s.member.as_ref().is_some_and(|(r, _)| r == room))
            .map(|(id, _)| *id)
            .collect()
    }

    fn send(&mut self, socket: SocketId, packet: Packet) {
        if let Some(s) = self.sockets.get_mut(&socket) {
            s.outbox.push_back(packet);
        }
    }

    fn broadcast(&mut self, room: &RoomToken, packet: &Packet) {
        for socket in self.members(room) {
            self.send(socket, packet.clone());
        }
    }

    fn remove_room(&mut self, room: &RoomToken) -> bool {
        self.share_map.retain(|_, target| target != room);
        self.rooms.remove(room).is_some()
    }

    fn join(&mut self, socket: SocketId, join: JoinRoom) -> Result<(), ProtocolError> {
        let Some(room) = self.resolve(join.room_token.as_str()) else {
            let rejection = RoomError { message: ROOM_UNAVAILABLE.to_string() };
            self.send(socket, string_event(ServerEvent::RoomError(rejection))?);
            return Ok(());
        };

        if let Some(s) = self.sockets.get_mut(&socket) {
            s.member = Some((room.clone(), join.username.clone()));
        }

        let user_count = self.user_count(&room);
        let history = self
            .rooms
            .get(&room)
            .map(|r| {
                let start = r.messages.len().saturating_sub(HISTORY_LIMIT);
                r.messages[start..].to_vec()
            })
            .unwrap_or_default();

        let joined =
            RoomJoined { room_token: Some(room.clone()), user_count, messages: history };
        self.send(socket, string_event(ServerEvent::RoomJoined(joined))?);

        let presence = Presence { username: join.username, user_count };
        self.broadcast(&room, &string_event(ServerEvent::UserJoined(presence))?);

        debug!(socket, user_count, "user joined room");
        Ok(())
    }

    fn relay(&mut self, message: SendMessage) -> Result<(), ProtocolError> {
        let Some(room) = self.resolve(message.room_token.as_str()) else {
            warn!("message for unknown room dropped");
            return Ok(());
        };

        let envelope = MessageEnvelope {
            username: message.username,
            encrypted_message: Some(message.encrypted_message),
            timestamp: message.timestamp,
            message_id: Some(uuid(self.env.random_array())),
        };

        if let Some(r) = self.rooms.get_mut(&room) {
            r.messages.push(envelope.clone());
        }
        self.broadcast(&room, &string_event(ServerEvent::NewMessage(envelope))?);
        Ok(())
    }

    fn share(&mut self, socket: SocketId, ack: Option<u64>, request: &GenerateShareToken) {
        let Some(id) = ack else {
            warn!(socket, "share request without ack id");
            return;
        };

        let reply = match self.resolve(request.room_token.as_str()) {
            Some(room) => {
                let share = ShareToken::from_bytes(&self.env.random_array());
                self.share_map.insert(share.as_str().to_owned(), room.clone());
                if let Some(r) = self.rooms.get_mut(&room) {
                    r.share_tokens.push(share.clone());
                }
                Value::String(share.into())
            },
            None => Value::Null,
        };

        self.send(socket, Packet::Ack { id, args: vec![reply] });
    }

    fn leave(&mut self, socket: SocketId) {
        let Some((room, username)) = self.sockets.get_mut(&socket).and_then(|s| s.member.take())
        else {
            return;
        };

        let user_count = self.user_count(&room);
        let presence = Presence { username, user_count };
        match string_event(ServerEvent::UserLeft(presence)) {
            Ok(packet) => self.broadcast(&room, &packet),
            Err(err) => warn!(%err, "failed to encode user-left"),
        }
    }
}

/// Event packet whose data is the JSON body serialized as a string.
fn string_event(event: ServerEvent) -> Result<Packet, ProtocolError> {
    match event.into_packet()? {
        Packet::Event { ack, name, data } => {
            Ok(Packet::Event { ack, name, data: Value::String(data.to_string()) })
        },
        other => Ok(other),
    }
}

/// Version 4 UUID text from 16 random bytes.
fn uuid(mut bytes: [u8; 16]) -> String {
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..])
}

#[async_trait]
impl RoomDirectory for SimServer {
    async fn create_room(&self) -> Result<CreateRoomResponse, DirectoryError> {
        if self.lock().directory_down {
            return Err(DirectoryError::Network("simulated outage".to_string()));
        }
        Ok(CreateRoomResponse { room_token: SimServer::create_room(self) })
    }

    async fn check_room(&self, token: &RoomToken) -> Result<CheckRoomResponse, DirectoryError> {
        let state = self.lock();
        if state.directory_down {
            return Err(DirectoryError::Network("simulated outage".to_string()));
        }

        let primary = state.resolve(token.as_str());
        let user_count = primary.as_ref().map_or(0, |room| state.user_count(room));
        Ok(CheckRoomResponse {
            exists: primary.is_some(),
            user_count,
            primary_room_token: primary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_body(packet: &Packet) -> (String, Value) {
        match packet {
            Packet::Event { name, data: Value::String(body), .. } => {
                (name.clone(), serde_json::from_str(body).unwrap())
            },
            other => panic!("expected string event, got {other:?}"),
        }
    }

    #[test]
    fn created_tokens_are_valid_and_distinct() {
        let server = SimServer::new(SimEnv::new());
        let a = server.create_room();
        let b = server.create_room();
        assert_ne!(a, b);
        assert_eq!(server.resolve(a.as_str()), Some(a));
    }

    #[test]
    fn uuid_has_version_and_variant() {
        let id = uuid([0xff; 16]);
        assert_eq!(id.len(), 36);
        assert_eq!(&id[14..15], "4");
        assert!(matches!(&id[19..20], "8" | "9" | "a" | "b"));
    }

    #[test]
    fn join_unknown_room_is_rejected() {
        let server = SimServer::new(SimEnv::new());
        let socket = server.open_socket();
        server.drain(socket);

        let join = ClientRequest::JoinRoom(JoinRoom {
            room_token: RoomToken::parse(&"ab".repeat(32)).unwrap(),
            username: "alice".to_string(),
        });
        server.receive(socket, join.into_packet(None).unwrap()).unwrap();

        let packets = server.drain(socket);
        let (name, body) = event_body(&packets[0]);
        assert_eq!(name, "room-error");
        assert_eq!(body["message"], ROOM_UNAVAILABLE);
    }

    #[test]
    fn history_is_capped() {
        let server = SimServer::new(SimEnv::new());
        let room = server.create_room();
        for i in 0..(HISTORY_LIMIT + 5) {
            let message = SendMessage {
                room_token: room.clone(),
                encrypted_message: format!("e{i}"),
                timestamp: i as u64,
                username: "bob".to_string(),
            };
            server.lock().relay(message).unwrap();
        }

        let socket = server.open_socket();
        let join = ClientRequest::JoinRoom(JoinRoom {
            room_token: room.clone(),
            username: "alice".to_string(),
        });
        server.receive(socket, join.into_packet(None).unwrap()).unwrap();

        let packets = server.drain(socket);
        let (_, body) = event_body(&packets[1]);
        let history = body["messages"].as_array().unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0]["encryptedMessage"], "e5");
    }

    #[test]
    fn expired_rooms_are_cleaned_up() {
        let env = SimEnv::new();
        let server = SimServer::new(env.clone());
        let room = server.create_room();

        assert_eq!(server.cleanup_expired(), 0);
        env.advance(ROOM_TTL + Duration::from_secs(1));
        assert_eq!(server.cleanup_expired(), 1);
        assert_eq!(server.resolve(room.as_str()), None);
    }
}
