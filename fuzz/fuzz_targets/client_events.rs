//! Fuzz target for the chat client state machine
//!
//! Drives a client against the simulated room server with arbitrary
//! operation sequences, including hostile server events injected onto the
//! client's socket.
//!
//! # Invariants
//!
//! - The client never panics, whatever the server sends
//! - A message id is displayed at most once per session
//! - `Joined` always has a session behind it
//! - Returning to entry always clears the session

#![no_main]

use std::{collections::HashSet, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use wishpernet_client::{ClientAction, ConnectionState, SessionStore, ShareRequestId};
use wishpernet_harness::{SimClient, SimEnv, SimServer};
use wishpernet_proto::{EventName, Packet};

#[derive(Debug, Arbitrary)]
enum Operation {
    Send(String),
    Share,
    Leave,
    Drop,
    Reconnect,
    Advance(u16),
    Tick,
    ExpireRoom,
    /// Server event with a known name and arbitrary JSON text as data
    Inject { event: KnownEvent, data: String },
    /// Completely arbitrary frame
    InjectRaw(String),
}

#[derive(Debug, Arbitrary)]
enum KnownEvent {
    RoomJoined,
    RoomError,
    NewMessage,
    UserJoined,
    UserLeft,
    Other(String),
}

impl KnownEvent {
    fn name(&self) -> String {
        match self {
            Self::RoomJoined => EventName::RoomJoined.as_str().to_string(),
            Self::RoomError => EventName::RoomError.as_str().to_string(),
            Self::NewMessage => EventName::NewMessage.as_str().to_string(),
            Self::UserJoined => EventName::UserJoined.as_str().to_string(),
            Self::UserLeft => EventName::UserLeft.as_str().to_string(),
            Self::Other(name) => name.clone(),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let env = SimEnv::with_seed(scenario.seed);
    let server = SimServer::new(env.clone());
    let room = server.create_room();

    let mut store = SessionStore::new();
    store.save("alice", room.clone()).expect("valid username");
    let mut client = SimClient::new(env.clone(), server.clone(), store);
    let _ = client.connect();

    let mut seen = HashSet::new();
    let mut next_share = 0u64;

    for operation in scenario.operations.into_iter().take(64) {
        let _ = match operation {
            Operation::Send(text) => client.send(&text).and_then(|()| client.pump()),
            Operation::Share => {
                next_share += 1;
                client.request_share(ShareRequestId(next_share)).and_then(|()| client.pump())
            },
            Operation::Leave => client.leave(),
            Operation::Drop => client.drop_transport(),
            Operation::Reconnect => {
                if client.socket().is_none() && client.client().session().load().is_some() {
                    client.connect()
                } else {
                    Ok(())
                }
            },
            Operation::Advance(secs) => {
                env.advance(Duration::from_secs(u64::from(secs)));
                Ok(())
            },
            Operation::Tick => client.tick(),
            Operation::ExpireRoom => {
                server.expire_room(&room);
                Ok(())
            },
            Operation::Inject { event, data } => match client.socket() {
                Some(socket) => {
                    let data = serde_json::from_str(&data).unwrap_or(Value::String(data));
                    server.inject(socket, Packet::event(event.name(), data));
                    client.pump()
                },
                None => Ok(()),
            },
            Operation::InjectRaw(text) => match (client.socket(), Packet::decode(&text)) {
                (Some(socket), Ok(packet)) => {
                    server.inject(socket, packet);
                    client.pump()
                },
                _ => Ok(()),
            },
        };

        for action in client.take_actions() {
            match action {
                ClientAction::DisplayMessage(message) => {
                    assert!(seen.insert(message.id.clone()), "message {} shown twice", message.id);
                },
                ClientAction::ReturnToEntry { .. } => {
                    assert!(client.client().session().load().is_none(), "session survived exit");
                    seen.clear();
                },
                _ => {},
            }
        }

        if client.state() == ConnectionState::Joined {
            assert!(client.client().session().load().is_some(), "joined without a session");
        }
    }
});
