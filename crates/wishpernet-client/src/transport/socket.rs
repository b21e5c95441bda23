//! Socket.IO session runtime.
//!
//! One tokio task per chat session. It owns the [`ChatClient`] and the
//! WebSocket, multiplexing three sources:
//!
//! ```text
//!   socket frames ──┐
//!   user commands ──┼──> ChatClient::handle ──> actions ──┬──> socket
//!   1s ticker ──────┘                                     ├──> share oneshots
//!                                                         └──> update channel
//! ```
//!
//! Share requests are answered through their own oneshot, never through the
//! update channel. After an unplanned drop the task reconnects with the same
//! session, up to [`TransportConfig::max_reconnect_attempts`] consecutive
//! failures.

use std::{collections::HashMap, time::Duration};

use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use wishpernet_core::{ConnectionState, Environment};
use wishpernet_proto::{Packet, ShareToken};

use super::{SystemEnv, TransportConfig, TransportError};
use crate::{
    client::{ChatClient, ClientConfig},
    error::{ClientError, ShareError},
    event::{ClientAction, ClientEvent, ShareRequestId},
    session::SessionStore,
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

type ShareReply = oneshot::Sender<Result<ShareToken, ShareError>>;

/// Interval between timeout checks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Queued user commands before `send_message` waits.
const COMMAND_CAPACITY: usize = 32;

/// User intents forwarded to the runtime.
enum Command {
    Send(String),
    Share(ShareReply),
    Leave,
}

/// How a connection attempt ended.
enum Outcome {
    Unreachable(TransportError),
    Dropped { joined: bool },
    Finished,
}

/// What the runtime does after executing a batch of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Flow {
    Continue,
    Closed,
    Finished,
}

/// Handle to a running chat session.
///
/// Dropping the handle leaves the room.
pub struct ChatHandle {
    commands: mpsc::Sender<Command>,
    updates: mpsc::UnboundedReceiver<ClientAction>,
    task: JoinHandle<()>,
}

impl ChatHandle {
    /// Submit message text. Empty input is ignored by the client.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the session has ended
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.commands.send(Command::Send(text.into())).await.map_err(|_| TransportError::Closed)
    }

    /// Ask the server for an invite token.
    ///
    /// Resolves once with the ack result. A session that ends first resolves
    /// to `ShareError::ConnectionLost`.
    pub async fn request_share_token(&self) -> Result<ShareToken, ShareError> {
        let (reply, result) = oneshot::channel();
        if self.commands.send(Command::Share(reply)).await.is_err() {
            return Err(ShareError::ConnectionLost);
        }
        result.await.unwrap_or(Err(ShareError::ConnectionLost))
    }

    /// Leave the room and end the session.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the session has already ended
    pub async fn leave(&self) -> Result<(), TransportError> {
        self.commands.send(Command::Leave).await.map_err(|_| TransportError::Closed)
    }

    /// Next display update. `None` once the session has ended.
    pub async fn next_update(&mut self) -> Option<ClientAction> {
        self.updates.recv().await
    }

    /// Abort the runtime without leaving cleanly.
    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Start a chat session for `session` on the current tokio runtime.
///
/// Returns immediately; connection progress arrives as
/// [`ClientAction::StatusChanged`] updates.
pub fn connect(config: TransportConfig, session: SessionStore) -> ChatHandle {
    let env = SystemEnv::new();
    let client = ChatClient::new(env.clone(), ClientConfig::default(), session);

    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let runtime = SessionRuntime {
        env,
        config,
        client,
        commands: command_rx,
        updates: update_tx,
        shares: HashMap::new(),
        next_share: 0,
    };

    let task = tokio::spawn(runtime.run());
    ChatHandle { commands: command_tx, updates: update_rx, task }
}

struct SessionRuntime {
    env: SystemEnv,
    config: TransportConfig,
    client: ChatClient<SystemEnv>,
    commands: mpsc::Receiver<Command>,
    updates: mpsc::UnboundedSender<ClientAction>,
    shares: HashMap<ShareRequestId, ShareReply>,
    next_share: u64,
}

impl SessionRuntime {
    async fn run(mut self) {
        let mut failures = 0u32;

        loop {
            let (joined, last_error) = match self.run_connection().await {
                Outcome::Finished => break,
                Outcome::Unreachable(err) => {
                    warn!(%err, "socket connect failed");
                    (false, Some(err))
                },
                Outcome::Dropped { joined } => (joined, None),
            };

            if joined {
                failures = 0;
            }
            failures += 1;

            if failures > self.config.max_reconnect_attempts {
                warn!(failures, "giving up on reconnect");
                let message = match last_error {
                    Some(err) => format!("Unable to reach the chat server ({err})"),
                    None => "Unable to reach the chat server".to_string(),
                };
                self.publish(ClientAction::Notify { message });
                break;
            }

            info!(attempt = failures, "reconnecting");
            if self.backoff().await == Flow::Finished {
                break;
            }
        }

        debug!("session runtime stopped");
    }

    async fn run_connection(&mut self) -> Outcome {
        let ws = match connect_async(self.config.socket_url.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => return Outcome::Unreachable(TransportError::Connection(e.to_string())),
        };

        info!("socket connected");
        let (mut sink, mut stream) = ws.split();
        let mut joined = false;

        let now = self.env.now();
        let mut flow = self.dispatch(ClientEvent::TransportOpened { now }, Some(&mut sink)).await;

        let mut ticker = interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while flow == Flow::Continue {
            flow = tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match Packet::decode(&text) {
                        Ok(packet) => {
                            let now = self.env.now();
                            self.dispatch(ClientEvent::PacketReceived { packet, now }, Some(&mut sink))
                                .await
                        },
                        Err(e) => {
                            warn!(error = %e, "undecodable frame");
                            Flow::Continue
                        },
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        let reason = "server closed socket".to_string();
                        self.dispatch(ClientEvent::TransportClosed { reason }, None).await.max(Flow::Closed)
                    },
                    Some(Ok(_)) => Flow::Continue,
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        self.dispatch(ClientEvent::TransportClosed { reason }, None).await.max(Flow::Closed)
                    },
                },
                command = self.commands.recv() => self.command(command, Some(&mut sink)).await,
                _ = ticker.tick() => {
                    let now = self.env.now();
                    self.dispatch(ClientEvent::Tick { now }, Some(&mut sink)).await
                },
            };

            joined |= self.client.state() == ConnectionState::Joined;
        }

        if let Err(e) = sink.close().await {
            debug!(error = %e, "socket close failed");
        }

        match flow {
            Flow::Finished => Outcome::Finished,
            Flow::Continue | Flow::Closed => Outcome::Dropped { joined },
        }
    }

    /// Wait out the reconnect delay while still answering user commands.
    async fn backoff(&mut self) -> Flow {
        let env = self.env.clone();
        let delay = env.sleep(self.config.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                () = &mut delay => return Flow::Continue,
                command = self.commands.recv() => {
                    if self.command(command, None).await == Flow::Finished {
                        return Flow::Finished;
                    }
                },
            }
        }
    }

    async fn command(&mut self, command: Option<Command>, sink: Option<&mut WsSink>) -> Flow {
        let event = match command {
            Some(Command::Send(text)) => ClientEvent::SendMessage { text },
            Some(Command::Share(reply)) => {
                let request = ShareRequestId(self.next_share);
                self.next_share += 1;
                self.shares.insert(request, reply);
                ClientEvent::RequestShareToken { request }
            },
            Some(Command::Leave) | None => ClientEvent::Leave,
        };

        self.dispatch(event, sink).await
    }

    async fn dispatch(
        &mut self,
        event: ClientEvent<std::time::Instant>,
        sink: Option<&mut WsSink>,
    ) -> Flow {
        let err = match self.client.handle(event) {
            Ok(actions) => return self.execute(actions, sink).await,
            Err(err) => err,
        };

        match error_flow(&err) {
            Flow::Finished => {
                warn!(%err, "session cannot continue");
                Flow::Finished
            },
            Flow::Closed => {
                warn!(%err, "transient failure, dropping socket");
                self.transport_lost(err.to_string())
            },
            Flow::Continue => {
                if err == ClientError::NotJoined {
                    self.publish(ClientAction::Notify { message: err.to_string() });
                } else {
                    warn!(%err, "client rejected event");
                }
                Flow::Continue
            },
        }
    }

    /// Tell the client the socket is gone and run its cleanup actions.
    fn transport_lost(&mut self, reason: String) -> Flow {
        let cleanup = self.client.handle(ClientEvent::TransportClosed { reason }).unwrap_or_default();
        cleanup.into_iter().fold(Flow::Closed, |flow, action| flow.max(self.apply_local(action)))
    }

    async fn execute(&mut self, actions: Vec<ClientAction>, mut sink: Option<&mut WsSink>) -> Flow {
        let mut flow = Flow::Continue;

        for action in actions {
            let ClientAction::Send(packet) = action else {
                flow = flow.max(self.apply_local(action));
                continue;
            };

            let Some(socket) = sink.as_deref_mut().filter(|_| flow == Flow::Continue) else {
                debug!(packet = packet.kind(), "socket unavailable, dropping packet");
                continue;
            };

            let text = match packet.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode packet");
                    continue;
                },
            };

            if let Err(e) = socket.send(Message::Text(text.into())).await {
                let reason = e.to_string();
                warn!(%reason, "socket write failed");
                flow = flow.max(self.transport_lost(reason));
            }
        }

        flow
    }

    /// Execute an action that does not touch the socket.
    fn apply_local(&mut self, action: ClientAction) -> Flow {
        match action {
            ClientAction::CloseTransport { reason } => {
                debug!(%reason, "closing socket");
                Flow::Closed
            },
            ClientAction::ShareTokenReady { request, result } => {
                if let Some(reply) = self.shares.remove(&request) {
                    // Receiver gone means the caller stopped waiting.
                    let _ = reply.send(result);
                }
                Flow::Continue
            },
            ClientAction::ReturnToEntry { reason } => {
                self.publish(ClientAction::ReturnToEntry { reason });
                Flow::Finished
            },
            ClientAction::Send(packet) => {
                debug!(packet = packet.kind(), "no socket, dropping packet");
                Flow::Continue
            },
            other => {
                self.publish(other);
                Flow::Continue
            },
        }
    }

    fn publish(&self, action: ClientAction) {
        if self.updates.send(action).is_err() {
            debug!("update receiver dropped");
        }
    }
}

/// How the runtime reacts to an event the client refused.
///
/// Transient errors keep the session and reconnect. A missing session ends
/// the runtime. Anything else is reported and the connection carries on.
fn error_flow(err: &ClientError) -> Flow {
    if err.is_transient() {
        Flow::Closed
    } else if *err == ClientError::NoSession {
        Flow::Finished
    } else {
        Flow::Continue
    }
}
