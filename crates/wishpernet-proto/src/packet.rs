//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! The persistent channel is a WebSocket carrying text messages. Each message
//! is one Engine.IO packet; Engine.IO type `4` (message) wraps a Socket.IO
//! packet. Only the default namespace and text payloads are supported.
//!
//! ```text
//! 0{"sid":..}        engine open (server -> client)
//! 1                  engine close
//! 2 / 3              engine ping / pong
//! 40[{..}]           socket connect (both directions)
//! 41                 socket disconnect
//! 42<id?>[name,data] socket event, optional ack id
//! 43<id>[args..]     socket ack reply
//! 44{..}             socket connect error
//! ```
//!
//! This is a pure framing layer. Event names are carried as strings and data
//! as raw JSON; see [`crate::events`] for typed payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// Maximum accepted text message size (1 MiB).
pub const MAX_PACKET_LEN: usize = 1024 * 1024;

/// Engine.IO open handshake sent by the server on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine session id
    pub sid: String,
    /// Transports the server offers to upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Interval between server pings (milliseconds)
    pub ping_interval: u64,
    /// Time the server waits for a pong (milliseconds)
    pub ping_timeout: u64,
    /// Maximum payload size the server accepts, if advertised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// One text message on the persistent channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine open handshake (`0`)
    Open(OpenHandshake),
    /// Engine close (`1`)
    Close,
    /// Engine heartbeat probe (`2`), answered with [`Packet::Pong`]
    Ping,
    /// Engine heartbeat answer (`3`)
    Pong,
    /// Engine no-op (`6`)
    Noop,
    /// Socket namespace connect (`40`), with optional auth/handshake data
    Connect(Option<Value>),
    /// Socket namespace disconnect (`41`)
    Disconnect,
    /// Socket event (`42`)
    Event {
        /// Acknowledgement id requested by the sender
        ack: Option<u64>,
        /// Event name
        name: String,
        /// First event argument, `Value::Null` if absent
        data: Value,
    },
    /// Socket acknowledgement reply (`43`)
    Ack {
        /// Id of the event being acknowledged
        id: u64,
        /// Acknowledgement arguments
        args: Vec<Value>,
    },
    /// Socket connect refused (`44`)
    ConnectError(Value),
}

impl Packet {
    /// Event packet without an acknowledgement id.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::Event { ack: None, name: name.into(), data }
    }

    /// Short name of the packet type, for diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Noop => "noop",
            Self::Connect(_) => "connect",
            Self::Disconnect => "disconnect",
            Self::Event { .. } => "event",
            Self::Ack { .. } => "ack",
            Self::ConnectError(_) => "connect-error",
        }
    }

    /// Encode into a text message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if a payload fails to serialize
    /// - `ProtocolError::PacketTooLarge` if the result exceeds
    ///   [`MAX_PACKET_LEN`]
    pub fn encode(&self) -> Result<String> {
        let text = match self {
            Self::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Self::Close => "1".to_owned(),
            Self::Ping => "2".to_owned(),
            Self::Pong => "3".to_owned(),
            Self::Noop => "6".to_owned(),
            Self::Connect(None) => "40".to_owned(),
            Self::Connect(Some(data)) => format!("40{}", serde_json::to_string(data)?),
            Self::Disconnect => "41".to_owned(),
            Self::Event { ack, name, data } => {
                let args = if data.is_null() {
                    Value::Array(vec![Value::String(name.clone())])
                } else {
                    Value::Array(vec![Value::String(name.clone()), data.clone()])
                };
                let id = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("42{id}{}", serde_json::to_string(&args)?)
            },
            Self::Ack { id, args } => format!("43{id}{}", serde_json::to_string(args)?),
            Self::ConnectError(data) => format!("44{}", serde_json::to_string(data)?),
        };

        if text.len() > MAX_PACKET_LEN {
            return Err(ProtocolError::PacketTooLarge { size: text.len(), max: MAX_PACKET_LEN });
        }

        Ok(text)
    }

    /// Decode a text message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyPacket` for an empty message
    /// - `ProtocolError::PacketTooLarge` above [`MAX_PACKET_LEN`]
    /// - `ProtocolError::UnknownPacketType` for unknown type digits
    /// - `ProtocolError::MalformedPacket` for binary packets, foreign
    ///   namespaces, missing event names or bad ack ids
    /// - `ProtocolError::Json` if the JSON body is invalid
    ///
    /// # Security
    ///
    /// Size is checked before any JSON parsing so an oversized message cannot
    /// force a large allocation in the parser.
    pub fn decode(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(ProtocolError::EmptyPacket);
        }
        if text.len() > MAX_PACKET_LEN {
            return Err(ProtocolError::PacketTooLarge { size: text.len(), max: MAX_PACKET_LEN });
        }

        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyPacket)?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => decode_socket(rest),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

fn decode_socket(rest: &str) -> Result<Packet> {
    let mut chars = rest.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolError::MalformedPacket("missing socket packet type".into()))?;
    let body = strip_default_namespace(chars.as_str())?;

    match kind {
        '0' if body.is_empty() => Ok(Packet::Connect(None)),
        '0' => Ok(Packet::Connect(Some(serde_json::from_str(body)?))),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let (ack, json) = split_ack_id(body)?;
            let args: Vec<Value> = serde_json::from_str(json)?;
            let mut args = args.into_iter();
            let Some(Value::String(name)) = args.next() else {
                return Err(ProtocolError::MalformedPacket("event without name".into()));
            };
            let data = args.next().unwrap_or(Value::Null);
            Ok(Packet::Event { ack, name, data })
        },
        '3' => {
            let (Some(id), json) = split_ack_id(body)? else {
                return Err(ProtocolError::MalformedPacket("ack without id".into()));
            };
            let args: Vec<Value> = serde_json::from_str(json)?;
            Ok(Packet::Ack { id, args })
        },
        '4' if body.is_empty() => Ok(Packet::ConnectError(Value::Null)),
        '4' => Ok(Packet::ConnectError(serde_json::from_str(body)?)),
        '5' | '6' => Err(ProtocolError::MalformedPacket("binary packets are not supported".into())),
        other => Err(ProtocolError::UnknownPacketType(other)),
    }
}

/// Strip an explicit `/,` namespace prefix; reject any other namespace.
fn strip_default_namespace(body: &str) -> Result<&str> {
    if !body.starts_with('/') {
        return Ok(body);
    }

    let (namespace, remainder) = match body.find(',') {
        Some(idx) => (&body[..idx], &body[idx + 1..]),
        None => (body, ""),
    };

    if namespace == "/" {
        Ok(remainder)
    } else {
        Err(ProtocolError::MalformedPacket(format!("unsupported namespace {namespace}")))
    }
}

/// Split a leading decimal ack id from the JSON body.
fn split_ack_id(body: &str) -> Result<(Option<u64>, &str)> {
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, body));
    }

    let id = body[..digits]
        .parse::<u64>()
        .map_err(|_| ProtocolError::MalformedPacket("ack id out of range".into()))?;
    Ok((Some(id), &body[digits..]))
}
