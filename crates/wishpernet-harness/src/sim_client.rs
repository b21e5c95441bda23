//! Simulated client: a `ChatClient` wired to a [`SimServer`] socket.
//!
//! Plays the role of the transport runtime. Packets the client sends are fed
//! to the server synchronously, packets the server queues are fed back on
//! [`SimClient::pump`], and every user-facing action is recorded for
//! assertions.

use wishpernet_client::{
    ChatClient, ChatMessage, ClientAction, ClientConfig, ClientError, ClientEvent,
    ConnectionState, SessionStore, ShareRequestId,
};
use wishpernet_core::Environment;
use wishpernet_proto::Packet;

use crate::{SimEnv, SimInstant, SimServer, SocketId};

/// Upper bound on server → client round trips per pump.
const MAX_PUMP_ROUNDS: usize = 64;

/// One simulated chat participant.
pub struct SimClient {
    env: SimEnv,
    server: SimServer,
    client: ChatClient<SimEnv>,
    socket: Option<SocketId>,
    log: Vec<ClientAction>,
}

impl SimClient {
    /// Client over an already populated session store.
    pub fn new(env: SimEnv, server: SimServer, session: SessionStore) -> Self {
        let client = ChatClient::new(env.clone(), ClientConfig::default(), session);
        Self { env, server, client, socket: None, log: Vec::new() }
    }

    /// Underlying client.
    pub fn client(&self) -> &ChatClient<SimEnv> {
        &self.client
    }

    /// Connection state.
    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Socket currently open on the server, if any.
    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    /// Open a socket and run the handshake until the server stops answering.
    ///
    /// # Errors
    ///
    /// Any error the client raises while handling the handshake.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let socket = self.server.open_socket();
        self.socket = Some(socket);

        let now = self.env.now();
        self.handle(ClientEvent::TransportOpened { now })?;
        self.pump()
    }

    /// Deliver everything the server has queued, repeating until quiet.
    ///
    /// # Errors
    ///
    /// Any error the client raises while handling a packet.
    pub fn pump(&mut self) -> Result<(), ClientError> {
        for _ in 0..MAX_PUMP_ROUNDS {
            let Some(socket) = self.socket else {
                return Ok(());
            };

            let packets = self.server.drain(socket);
            if packets.is_empty() {
                return Ok(());
            }

            for packet in packets {
                let packet = Packet::decode(&packet.encode()?)?;
                let now = self.env.now();
                self.handle(ClientEvent::PacketReceived { packet, now })?;
            }
        }
        Ok(())
    }

    /// Submit message text.
    ///
    /// # Errors
    ///
    /// `ClientError::NotJoined` outside a joined room.
    pub fn send(&mut self, text: &str) -> Result<(), ClientError> {
        self.handle(ClientEvent::SendMessage { text: text.to_string() })
    }

    /// Ask for a share token. The answer arrives on a later [`SimClient::pump`].
    ///
    /// # Errors
    ///
    /// Any error the client raises while encoding the request.
    pub fn request_share(&mut self, request: ShareRequestId) -> Result<(), ClientError> {
        self.handle(ClientEvent::RequestShareToken { request })
    }

    /// Leave the room.
    ///
    /// # Errors
    ///
    /// Any error the client raises while leaving.
    pub fn leave(&mut self) -> Result<(), ClientError> {
        self.handle(ClientEvent::Leave)
    }

    /// Drop the transport without the client initiating it.
    ///
    /// # Errors
    ///
    /// Any error the client raises while cleaning up.
    pub fn drop_transport(&mut self) -> Result<(), ClientError> {
        if let Some(socket) = self.socket.take() {
            self.server.close_socket(socket);
        }
        self.handle(ClientEvent::TransportClosed { reason: "simulated drop".to_string() })
    }

    /// Feed a timeout tick at the current virtual time.
    ///
    /// # Errors
    ///
    /// Any error the client raises while closing.
    pub fn tick(&mut self) -> Result<(), ClientError> {
        let now = self.env.now();
        self.handle(ClientEvent::Tick { now })
    }

    /// Everything recorded since the last call.
    pub fn take_actions(&mut self) -> Vec<ClientAction> {
        std::mem::take(&mut self.log)
    }

    /// Recorded actions, oldest first.
    pub fn actions(&self) -> &[ClientAction] {
        &self.log
    }

    /// Recorded chat messages, oldest first.
    pub fn messages(&self) -> Vec<&ChatMessage> {
        self.log
            .iter()
            .filter_map(|action| match action {
                ClientAction::DisplayMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Feed one event and execute the resulting actions.
    ///
    /// # Errors
    ///
    /// Any error from [`ChatClient::handle`].
    pub fn handle(&mut self, event: ClientEvent<SimInstant>) -> Result<(), ClientError> {
        let actions = self.client.handle(event)?;

        for action in actions {
            match action {
                ClientAction::Send(packet) => self.transmit(packet)?,
                ClientAction::CloseTransport { reason } => {
                    if let Some(socket) = self.socket.take() {
                        self.server.close_socket(socket);
                    }
                    self.log.push(ClientAction::CloseTransport { reason });
                },
                other => self.log.push(other),
            }
        }
        Ok(())
    }

    fn transmit(&mut self, packet: Packet) -> Result<(), ClientError> {
        let Some(socket) = self.socket else {
            return Ok(());
        };

        // Through the codec, so tests exercise the real wire form.
        let text = packet.encode()?;
        self.server.receive(socket, Packet::decode(&text)?)?;
        Ok(())
    }
}
