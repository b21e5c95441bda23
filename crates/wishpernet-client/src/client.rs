//! Chat client state machine.
//!
//! The `ChatClient` owns everything a single chat page needs: the connection
//! lifecycle, the session, the room key cache, and in-flight share requests.
//! It dispatches server events, encrypts outgoing messages, and decides what
//! the user sees.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, warn};
use wishpernet_core::{Connection, ConnectionAction, ConnectionConfig, ConnectionState, Environment};
use wishpernet_crypto::{CipherError, NONCE_SIZE, RoomCipher};
use wishpernet_proto::{
    ClientRequest, GenerateShareToken, JoinRoom, MessageEnvelope, Packet, Presence,
    ProtocolError, RoomError, RoomJoined, RoomToken, SendMessage, ServerEvent, ShareToken,
};

use crate::{
    error::{ClientError, ShareError},
    event::{
        ChatMessage, ClientAction, ClientEvent, ENCRYPTION_FAILED_NOTICE, MessageBody,
        ShareRequestId,
    },
    session::SessionStore,
};

/// Notice shown when the server rejects a join without a reason.
const ROOM_UNAVAILABLE: &str = "Room does not exist or has expired";

/// Length of the random suffix in synthesized message ids.
const SYNTHETIC_ID_SUFFIX_LEN: usize = 6;

/// Chat client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Lifecycle timeouts.
    pub connection: ConnectionConfig,
}

/// Client for one room session.
///
/// # Invariants
///
/// - Every message is decrypted with the key of the session's current
///   canonical token, never with a share token.
/// - The key cache holds at most the current room's key while connected and
///   nothing after a drop, leave, or rejection.
/// - Every share request is answered exactly once: by its ack, by
///   `ShareError::NotJoined`, or by `ShareError::ConnectionLost`.
pub struct ChatClient<E: Environment> {
    /// Environment for randomness and time.
    env: E,

    /// Persistent channel lifecycle.
    connection: Connection<E::Instant>,

    /// Identity and displayed message ids.
    session: SessionStore,

    /// Token → key cache plus the AEAD.
    cipher: RoomCipher,

    /// Share requests awaiting an ack, keyed by ack id.
    pending_shares: HashMap<u64, ShareRequestId>,

    /// Next Socket.IO ack id.
    next_ack_id: u64,
}

impl<E: Environment> ChatClient<E> {
    /// Create a client over a session produced by the entry flows.
    pub fn new(env: E, config: ClientConfig, session: SessionStore) -> Self {
        let connection = Connection::new(env.now(), config.connection);
        Self {
            env,
            connection,
            session,
            cipher: RoomCipher::new(),
            pending_shares: HashMap::new(),
            next_ack_id: 0,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Session store, including displayed message ids.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Cipher and its key cache.
    pub fn cipher(&self) -> &RoomCipher {
        &self.cipher
    }

    /// Share requests still waiting for the server.
    pub fn pending_share_count(&self) -> usize {
        self.pending_shares.len()
    }

    /// Process an event and return resulting actions.
    ///
    /// A [`ClientAction::StatusChanged`] is appended whenever the event moved
    /// the connection to a different state.
    ///
    /// # Errors
    ///
    /// - `ClientError::NoSession` when opening a transport without a session
    /// - `ClientError::NotJoined` when sending outside a joined room
    /// - `ClientError::Connection` for packets invalid in the current state
    /// - `ClientError::Protocol` for malformed server events
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let before = self.connection.state();

        let mut actions = match event {
            ClientEvent::TransportOpened { now } => self.handle_transport_opened(now),
            ClientEvent::TransportClosed { reason } => Ok(self.handle_transport_closed(&reason)),
            ClientEvent::PacketReceived { packet, now } => self.handle_packet(packet, now),
            ClientEvent::Tick { now } => {
                let connection_actions = self.connection.tick(now);
                self.convert_connection_actions(connection_actions)
            },
            ClientEvent::SendMessage { text } => self.handle_send_message(&text),
            ClientEvent::RequestShareToken { request } => self.handle_share_request(request),
            ClientEvent::Leave => Ok(self.handle_leave()),
        }?;

        let after = self.connection.state();
        if before != after {
            actions.push(ClientAction::StatusChanged(after));
        }

        Ok(actions)
    }

    fn handle_transport_opened(
        &mut self,
        now: E::Instant,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if self.session.load().is_none() {
            return Err(ClientError::NoSession);
        }

        self.connection.begin(now)?;
        info!("transport open, starting handshake");
        Ok(vec![])
    }

    fn handle_transport_closed(&mut self, reason: &str) -> Vec<ClientAction> {
        if self.connection.transport_lost() == ConnectionState::Disconnected {
            return vec![];
        }

        warn!(reason, "transport lost");
        self.connection_lost()
    }

    fn handle_packet(
        &mut self,
        packet: Packet,
        now: E::Instant,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match packet {
            Packet::Event { name, data, .. } => {
                if !self.connection.is_connected() {
                    debug!(event = %name, "event while disconnected, dropping");
                    return Ok(vec![]);
                }
                self.connection.update_activity(now);
                self.handle_server_event(&name, data, now)
            },
            Packet::Ack { id, args } => {
                self.connection.update_activity(now);
                Ok(self.handle_ack(id, args))
            },
            control => {
                let connection_actions = self.connection.handle_packet(&control, now)?;
                self.convert_connection_actions(connection_actions)
            },
        }
    }

    fn handle_server_event(
        &mut self,
        name: &str,
        data: Value,
        now: E::Instant,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let event = match ServerEvent::from_event(name, data) {
            Ok(event) => event,
            Err(ProtocolError::UnknownEvent(name)) => {
                debug!(event = %name, "ignoring unknown event");
                return Ok(vec![]);
            },
            Err(err) => return Err(err.into()),
        };

        match event {
            ServerEvent::RoomJoined(joined) => self.handle_room_joined(joined, now),
            ServerEvent::RoomError(RoomError { message }) => Ok(self.handle_room_error(message)),
            ServerEvent::NewMessage(envelope) => Ok(self.handle_new_message(envelope)),
            ServerEvent::UserJoined(presence) => Ok(self.presence(&presence, "joined")),
            ServerEvent::UserLeft(presence) => Ok(self.presence(&presence, "left")),
        }
    }

    fn handle_room_joined(
        &mut self,
        joined: RoomJoined,
        now: E::Instant,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.connection.room_joined(now)?;

        if let Some(canonical) = joined.room_token {
            let previous = self.current_token();
            if self.session.replace_room_token(canonical) {
                if let Some(previous) = previous {
                    self.cipher.forget(&previous);
                }
                info!("adopted canonical room token");
            }
        }

        let mut actions = vec![ClientAction::UserCount(joined.user_count)];
        for envelope in joined.messages {
            if let Some(message) = self.receive(envelope, true) {
                actions.push(ClientAction::DisplayMessage(message));
            }
        }

        info!(user_count = joined.user_count, "joined room");
        Ok(actions)
    }

    fn handle_room_error(&mut self, message: String) -> Vec<ClientAction> {
        let message = if message.is_empty() { ROOM_UNAVAILABLE.to_string() } else { message };
        warn!(reason = %message, "room rejected");

        let connection_actions = self.connection.room_error(&message);
        let mut actions = self.fail_pending_shares();
        for action in connection_actions {
            if let ConnectionAction::Close { reason } = action {
                actions.push(ClientAction::CloseTransport { reason });
            }
        }

        self.cipher.forget_all();
        self.session.clear();

        actions.push(ClientAction::Notify { message: message.clone() });
        actions.push(ClientAction::ReturnToEntry { reason: message });
        actions
    }

    fn handle_new_message(&mut self, envelope: MessageEnvelope) -> Vec<ClientAction> {
        if self.connection.state() != ConnectionState::Joined {
            debug!("message before room join, dropping");
            return vec![];
        }

        self.receive(envelope, false).map(ClientAction::DisplayMessage).into_iter().collect()
    }

    fn presence(&self, presence: &Presence, verb: &str) -> Vec<ClientAction> {
        if self.connection.state() != ConnectionState::Joined {
            return vec![];
        }

        vec![
            ClientAction::SystemNotice { text: format!("{} {verb} the chat", presence.username) },
            ClientAction::UserCount(presence.user_count),
        ]
    }

    /// Dedup, decrypt, and build a displayable message.
    ///
    /// `None` if the id was already displayed or there is no session.
    fn receive(&mut self, envelope: MessageEnvelope, history: bool) -> Option<ChatMessage> {
        let (token, username) = self
            .session
            .load()
            .map(|session| (session.room_token().clone(), session.username().to_owned()))?;

        let id = match envelope.message_id {
            Some(id) => id,
            None => self.synthesize_message_id(envelope.timestamp, &envelope.username),
        };

        if !self.session.mark_displayed(&id) {
            debug!(message_id = %id, "duplicate message, skipping");
            return None;
        }

        let opened = match envelope.encrypted_message.as_deref() {
            Some(encoded) => self.cipher.open(encoded, &token),
            None => Err(CipherError::MalformedEnvelope {
                reason: "missing encryptedMessage".to_string(),
            }),
        };

        let body = match opened {
            Ok(text) => MessageBody::Text(text),
            Err(reason) => {
                warn!(message_id = %id, %reason, "message failed to decrypt");
                MessageBody::Undecryptable { reason }
            },
        };

        Some(ChatMessage {
            own: envelope.username == username,
            id,
            username: envelope.username,
            timestamp: envelope.timestamp,
            body,
            history,
        })
    }

    fn synthesize_message_id(&self, timestamp: u64, username: &str) -> String {
        let mut entropy = self.env.random_u64();
        let suffix: String = (0..SYNTHETIC_ID_SUFFIX_LEN)
            .map(|_| {
                let digit = u32::try_from(entropy % 36).ok().and_then(|d| char::from_digit(d, 36));
                entropy /= 36;
                digit.unwrap_or('0')
            })
            .collect();

        format!("msg-{timestamp}-{username}-{suffix}")
    }

    fn handle_ack(&mut self, id: u64, args: Vec<Value>) -> Vec<ClientAction> {
        let Some(request) = self.pending_shares.remove(&id) else {
            warn!(ack_id = id, "ack for unknown request");
            return vec![];
        };

        let result = match args.into_iter().next() {
            Some(Value::String(raw)) => {
                ShareToken::parse(&raw).map_err(|_| ShareError::InvalidToken)
            },
            Some(Value::Null) | None => Err(ShareError::Refused),
            Some(_) => Err(ShareError::InvalidToken),
        };

        if let Err(err) = &result {
            warn!(%err, "share token request failed");
        }

        vec![ClientAction::ShareTokenReady { request, result }]
    }

    fn handle_share_request(
        &mut self,
        request: ShareRequestId,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let token = match (self.connection.state(), self.current_token()) {
            (ConnectionState::Joined, Some(token)) => token,
            _ => {
                return Ok(vec![ClientAction::ShareTokenReady {
                    request,
                    result: Err(ShareError::NotJoined),
                }]);
            },
        };

        let ack = self.next_ack_id;
        self.next_ack_id += 1;

        let packet = ClientRequest::GenerateShareToken(GenerateShareToken { room_token: token })
            .into_packet(Some(ack))?;
        self.pending_shares.insert(ack, request);

        debug!(ack_id = ack, "requested share token");
        Ok(vec![ClientAction::Send(packet)])
    }

    fn handle_send_message(&mut self, text: &str) -> Result<Vec<ClientAction>, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty message");
            return Ok(vec![]);
        }

        if self.connection.state() != ConnectionState::Joined {
            return Err(ClientError::NotJoined);
        }

        let mut actions = vec![ClientAction::SendAffordance { enabled: false }];

        match self.seal_message(text) {
            Ok(packet) => actions.push(ClientAction::Send(packet)),
            Err(err) => {
                warn!(%err, "failed to encrypt outgoing message");
                actions.push(ClientAction::Notify { message: ENCRYPTION_FAILED_NOTICE.to_string() });
            },
        }

        actions.push(ClientAction::SendAffordance { enabled: true });
        Ok(actions)
    }

    fn seal_message(&mut self, text: &str) -> Result<Packet, ClientError> {
        let session = self.session.load().ok_or(ClientError::NoSession)?;
        let room_token = session.room_token().clone();
        let username = session.username().to_owned();

        let nonce = self.env.random_array::<NONCE_SIZE>();
        let encrypted_message = self.cipher.seal(text, &room_token, nonce)?;

        let request = ClientRequest::SendMessage(SendMessage {
            room_token,
            encrypted_message,
            timestamp: self.env.wall_clock_millis(),
            username,
        });
        Ok(request.into_packet(None)?)
    }

    fn handle_leave(&mut self) -> Vec<ClientAction> {
        let connection_actions = self.connection.leave();

        let mut actions = self.fail_pending_shares();
        for action in connection_actions {
            match action {
                ConnectionAction::Send(packet) => actions.push(ClientAction::Send(packet)),
                ConnectionAction::Close { reason } => {
                    actions.push(ClientAction::CloseTransport { reason });
                },
                ConnectionAction::JoinRoom => {},
            }
        }

        self.cipher.forget_all();
        self.session.clear();

        info!("left room");
        actions.push(ClientAction::ReturnToEntry { reason: "left room".to_string() });
        actions
    }

    fn convert_connection_actions(
        &mut self,
        connection_actions: Vec<ConnectionAction>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::with_capacity(connection_actions.len());

        for action in connection_actions {
            match action {
                ConnectionAction::Send(packet) => actions.push(ClientAction::Send(packet)),
                ConnectionAction::JoinRoom => actions.push(ClientAction::Send(self.join_packet()?)),
                ConnectionAction::Close { reason } => {
                    warn!(%reason, "closing connection");
                    actions.extend(self.connection_lost());
                    actions.push(ClientAction::CloseTransport { reason });
                },
            }
        }

        Ok(actions)
    }

    fn join_packet(&self) -> Result<Packet, ClientError> {
        let session = self.session.load().ok_or(ClientError::NoSession)?;
        let request = ClientRequest::JoinRoom(JoinRoom {
            room_token: session.room_token().clone(),
            username: session.username().to_owned(),
        });
        Ok(request.into_packet(None)?)
    }

    /// Cleanup after an unplanned drop: the session survives, the key does not.
    fn connection_lost(&mut self) -> Vec<ClientAction> {
        if let Some(token) = self.current_token() {
            self.cipher.forget(&token);
        }
        self.fail_pending_shares()
    }

    fn fail_pending_shares(&mut self) -> Vec<ClientAction> {
        let mut pending: Vec<_> = self.pending_shares.drain().collect();
        pending.sort_unstable_by_key(|(ack, _)| *ack);

        pending
            .into_iter()
            .map(|(_, request)| ClientAction::ShareTokenReady {
                request,
                result: Err(ShareError::ConnectionLost),
            })
            .collect()
    }

    fn current_token(&self) -> Option<RoomToken> {
        self.session.load().map(|session| session.room_token().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU8, Ordering},
        },
        time::{Duration, Instant},
    };

    use serde_json::json;
    use wishpernet_proto::OpenHandshake;

    use super::*;

    const ROOM: &str = "abababababababababababababababababababababababababababababababab";

    /// Counter-based randomness so nonces differ between calls.
    #[derive(Clone, Default)]
    struct TestEnv {
        counter: Arc<AtomicU8>,
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let base = self.counter.fetch_add(1, Ordering::Relaxed);
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = base.wrapping_add(i as u8);
            }
        }

        fn wall_clock_millis(&self) -> u64 {
            1_700_000_000_000
        }
    }

    fn token(pair: &str) -> RoomToken {
        RoomToken::parse(&pair.repeat(32)).unwrap()
    }

    fn client_with_session(username: &str, room: RoomToken) -> ChatClient<TestEnv> {
        let mut store = SessionStore::new();
        store.save(username, room).unwrap();
        ChatClient::new(TestEnv::default(), ClientConfig::default(), store)
    }

    fn open() -> Packet {
        Packet::Open(OpenHandshake {
            sid: "sid".to_string(),
            upgrades: vec![],
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: None,
        })
    }

    fn room_joined(room_token: Option<&str>, messages: Value) -> Packet {
        let mut data = json!({ "userCount": 2, "messages": messages });
        if let Some(token) = room_token {
            data["roomToken"] = json!(token);
        }
        Packet::event("room-joined", data)
    }

    fn receive(client: &mut ChatClient<TestEnv>, packet: Packet) -> Vec<ClientAction> {
        client.handle(ClientEvent::PacketReceived { packet, now: Instant::now() }).unwrap()
    }

    fn join(client: &mut ChatClient<TestEnv>) -> Vec<ClientAction> {
        client.handle(ClientEvent::TransportOpened { now: Instant::now() }).unwrap();
        receive(client, open());
        receive(client, Packet::Connect(None));
        receive(client, room_joined(None, json!([])))
    }

    fn sealed(text: &str, room: &RoomToken) -> String {
        RoomCipher::new().seal(text, room, [9; NONCE_SIZE]).unwrap()
    }

    fn new_message(id: Option<&str>, username: &str, envelope: &str) -> Packet {
        let mut data = json!({
            "username": username,
            "encryptedMessage": envelope,
            "timestamp": 1_700_000_000_000u64,
        });
        if let Some(id) = id {
            data["messageId"] = json!(id);
        }
        Packet::event("new-message", data)
    }

    fn displayed(actions: &[ClientAction]) -> Vec<&ChatMessage> {
        actions
            .iter()
            .filter_map(|action| match action {
                ClientAction::DisplayMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn handshake_sends_join_with_session_identity() {
        let mut client = client_with_session("alice", token("ab"));

        let actions = client.handle(ClientEvent::TransportOpened { now: Instant::now() }).unwrap();
        assert_eq!(actions, vec![ClientAction::StatusChanged(ConnectionState::Connecting)]);

        let actions = receive(&mut client, open());
        assert_eq!(actions, vec![ClientAction::Send(Packet::Connect(None))]);

        let actions = receive(&mut client, Packet::Connect(None));
        let Some(ClientAction::Send(Packet::Event { name, data, .. })) = actions.first() else {
            panic!("expected join-room, got {actions:?}");
        };
        assert_eq!(name, "join-room");
        assert_eq!(data["roomToken"], ROOM);
        assert_eq!(data["username"], "alice");
        assert_eq!(
            actions.last(),
            Some(&ClientAction::StatusChanged(ConnectionState::AwaitingRoomJoin))
        );

        let actions = receive(&mut client, room_joined(None, json!([])));
        assert_eq!(actions, vec![
            ClientAction::UserCount(2),
            ClientAction::StatusChanged(ConnectionState::Joined)
        ]);
    }

    #[test]
    fn transport_open_without_session_fails() {
        let mut client =
            ChatClient::new(TestEnv::default(), ClientConfig::default(), SessionStore::new());
        let result = client.handle(ClientEvent::TransportOpened { now: Instant::now() });
        assert_eq!(result, Err(ClientError::NoSession));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn canonical_token_replaces_share_token() {
        let share = token("5a");
        let canonical = token("c0");
        let mut client = client_with_session("bob", share.clone());

        client.handle(ClientEvent::TransportOpened { now: Instant::now() }).unwrap();
        receive(&mut client, open());
        receive(&mut client, Packet::Connect(None));
        let history = json!([{
            "username": "alice",
            "encryptedMessage": sealed("from before", &canonical),
            "timestamp": 1,
            "messageId": "m0",
        }]);
        let actions = receive(&mut client, room_joined(Some(canonical.as_str()), history));

        assert_eq!(client.session().load().unwrap().room_token(), &canonical);
        assert!(!client.cipher().keys().contains(&share));
        let messages = displayed(&actions);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, MessageBody::Text("from before".to_string()));
        assert!(messages[0].history);
    }

    #[test]
    fn duplicate_message_ids_display_once() {
        let room = token("ab");
        let mut client = client_with_session("alice", room.clone());
        join(&mut client);

        let envelope = sealed("hi", &room);
        let first = receive(&mut client, new_message(Some("m1"), "bob", &envelope));
        let second = receive(&mut client, new_message(Some("m1"), "bob", &envelope));

        assert_eq!(displayed(&first).len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn malformed_envelope_shows_placeholder_and_is_marked_seen() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let actions = receive(&mut client, new_message(Some("bad"), "mallory", "%%%not base64"));
        let messages = displayed(&actions);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body.to_string(), "[Encrypted message - decryption failed]");
        assert!(client.session().is_displayed("bad"));

        let again = receive(&mut client, new_message(Some("bad"), "mallory", "%%%not base64"));
        assert!(again.is_empty());
    }

    #[test]
    fn absent_envelope_shows_placeholder_and_is_marked_seen() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let null_envelope = Packet::event(
            "new-message",
            json!({ "username": "bob", "encryptedMessage": null, "messageId": "m9" }),
        );
        let missing_envelope =
            Packet::event("new-message", json!({ "username": "bob", "messageId": "m10" }));

        for (packet, id) in [(null_envelope, "m9"), (missing_envelope, "m10")] {
            let actions = receive(&mut client, packet.clone());
            let messages = displayed(&actions);
            assert_eq!(messages.len(), 1);
            assert!(matches!(messages[0].body, MessageBody::Undecryptable { .. }));
            assert_eq!(messages[0].body.to_string(), "[Encrypted message - decryption failed]");
            assert!(client.session().is_displayed(id));

            assert!(receive(&mut client, packet).is_empty());
        }
        assert_eq!(client.state(), ConnectionState::Joined);
    }

    #[test]
    fn missing_message_id_is_synthesized() {
        let room = token("ab");
        let mut client = client_with_session("alice", room.clone());
        join(&mut client);

        let actions = receive(&mut client, new_message(None, "alice", &sealed("mine", &room)));
        let messages = displayed(&actions);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].id.starts_with("msg-1700000000000-alice-"));
        assert_eq!(messages[0].id.len(), "msg-1700000000000-alice-".len() + 6);
        assert!(messages[0].own);
    }

    #[test]
    fn messages_before_join_are_dropped() {
        let room = token("ab");
        let mut client = client_with_session("alice", room.clone());
        client.handle(ClientEvent::TransportOpened { now: Instant::now() }).unwrap();
        receive(&mut client, open());
        receive(&mut client, Packet::Connect(None));

        let actions = receive(&mut client, new_message(Some("m1"), "bob", &sealed("x", &room)));
        assert!(actions.is_empty());
        assert!(!client.session().is_displayed("m1"));
    }

    #[test]
    fn send_toggles_affordance_around_packet() {
        let room = token("ab");
        let mut client = client_with_session("alice", room.clone());
        join(&mut client);

        let actions = client.handle(ClientEvent::SendMessage { text: "  hello ".into() }).unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], ClientAction::SendAffordance { enabled: false });
        assert_eq!(actions[2], ClientAction::SendAffordance { enabled: true });

        let ClientAction::Send(Packet::Event { name, data, .. }) = &actions[1] else {
            panic!("expected send-message, got {:?}", actions[1]);
        };
        assert_eq!(name, "send-message");
        assert_eq!(data["username"], "alice");
        assert_eq!(data["timestamp"], 1_700_000_000_000u64);
        let envelope = data["encryptedMessage"].as_str().unwrap();
        assert_eq!(RoomCipher::new().open(envelope, &room).unwrap(), "hello");
    }

    #[test]
    fn consecutive_sends_use_fresh_nonces() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let envelope = |actions: &[ClientAction]| match &actions[1] {
            ClientAction::Send(Packet::Event { data, .. }) => data["encryptedMessage"].clone(),
            other => panic!("unexpected {other:?}"),
        };

        let first = client.handle(ClientEvent::SendMessage { text: "same".into() }).unwrap();
        let second = client.handle(ClientEvent::SendMessage { text: "same".into() }).unwrap();
        assert_ne!(envelope(&first), envelope(&second));
    }

    #[test]
    fn whitespace_send_is_noop() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let actions = client.handle(ClientEvent::SendMessage { text: " \n\t ".into() }).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn send_requires_joined_room() {
        let mut client = client_with_session("alice", token("ab"));
        let result = client.handle(ClientEvent::SendMessage { text: "hi".into() });
        assert_eq!(result, Err(ClientError::NotJoined));
    }

    #[test]
    fn transport_drop_evicts_key_but_keeps_session() {
        let room = token("ab");
        let mut client = client_with_session("alice", room.clone());
        join(&mut client);
        client.handle(ClientEvent::SendMessage { text: "warm cache".into() }).unwrap();
        assert!(client.cipher().keys().contains(&room));

        let actions =
            client.handle(ClientEvent::TransportClosed { reason: "reset".into() }).unwrap();
        assert_eq!(actions, vec![ClientAction::StatusChanged(ConnectionState::Disconnected)]);
        assert!(client.cipher().keys().is_empty());
        assert_eq!(client.session().load().unwrap().room_token(), &room);
    }

    #[test]
    fn room_error_clears_session_and_returns_to_entry() {
        let mut client = client_with_session("alice", token("ab"));
        client.handle(ClientEvent::TransportOpened { now: Instant::now() }).unwrap();
        receive(&mut client, open());
        receive(&mut client, Packet::Connect(None));

        let actions = receive(
            &mut client,
            Packet::event("room-error", json!("{\"message\":\"Room does not exist or has expired\"}")),
        );

        assert!(client.session().load().is_none());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(actions.iter().any(|a| matches!(a, ClientAction::CloseTransport { .. })));
        assert!(actions.contains(&ClientAction::ReturnToEntry {
            reason: "Room does not exist or has expired".to_string()
        }));
    }

    #[test]
    fn share_request_resolves_through_ack() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let actions =
            client.handle(ClientEvent::RequestShareToken { request: ShareRequestId(7) }).unwrap();
        let ClientAction::Send(Packet::Event { ack: Some(ack), name, .. }) = &actions[0] else {
            panic!("expected generate-share-token, got {actions:?}");
        };
        assert_eq!(name, "generate-share-token");
        assert_eq!(client.pending_share_count(), 1);

        let share = "5a".repeat(32);
        let actions = receive(&mut client, Packet::Ack { id: *ack, args: vec![json!(share)] });
        assert_eq!(actions, vec![ClientAction::ShareTokenReady {
            request: ShareRequestId(7),
            result: Ok(ShareToken::parse(&share).unwrap()),
        }]);
        assert_eq!(client.pending_share_count(), 0);
    }

    #[test]
    fn share_ack_with_null_is_refused() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        client.handle(ClientEvent::RequestShareToken { request: ShareRequestId(1) }).unwrap();
        let actions = receive(&mut client, Packet::Ack { id: 0, args: vec![Value::Null] });
        assert_eq!(actions, vec![ClientAction::ShareTokenReady {
            request: ShareRequestId(1),
            result: Err(ShareError::Refused),
        }]);
    }

    #[test]
    fn share_request_before_join_fails_immediately() {
        let mut client = client_with_session("alice", token("ab"));
        let actions =
            client.handle(ClientEvent::RequestShareToken { request: ShareRequestId(3) }).unwrap();
        assert_eq!(actions, vec![ClientAction::ShareTokenReady {
            request: ShareRequestId(3),
            result: Err(ShareError::NotJoined),
        }]);
    }

    #[test]
    fn pending_shares_fail_on_drop() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);
        client.handle(ClientEvent::RequestShareToken { request: ShareRequestId(1) }).unwrap();

        let actions = client.handle(ClientEvent::TransportClosed { reason: "gone".into() }).unwrap();
        assert!(actions.contains(&ClientAction::ShareTokenReady {
            request: ShareRequestId(1),
            result: Err(ShareError::ConnectionLost),
        }));
        assert_eq!(client.pending_share_count(), 0);
    }

    #[test]
    fn presence_emits_notice_and_count() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let actions =
            receive(&mut client, Packet::event("user-joined", json!({"username": "bob", "userCount": 3})));
        assert_eq!(actions, vec![
            ClientAction::SystemNotice { text: "bob joined the chat".to_string() },
            ClientAction::UserCount(3),
        ]);

        let actions =
            receive(&mut client, Packet::event("user-left", json!({"username": "bob", "userCount": 2})));
        assert_eq!(actions[0], ClientAction::SystemNotice { text: "bob left the chat".to_string() });
    }

    #[test]
    fn leave_clears_everything() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);

        let actions = client.handle(ClientEvent::Leave).unwrap();
        assert_eq!(actions[0], ClientAction::Send(Packet::Disconnect));
        assert!(actions.iter().any(|a| matches!(a, ClientAction::CloseTransport { .. })));
        assert!(actions.iter().any(|a| matches!(a, ClientAction::ReturnToEntry { .. })));
        assert!(client.session().load().is_none());
        assert!(client.cipher().keys().is_empty());
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);
        assert!(receive(&mut client, Packet::event("typing", json!({}))).is_empty());
    }

    #[test]
    fn ping_answered_with_pong() {
        let mut client = client_with_session("alice", token("ab"));
        join(&mut client);
        assert_eq!(receive(&mut client, Packet::Ping), vec![ClientAction::Send(Packet::Pong)]);
    }
}
