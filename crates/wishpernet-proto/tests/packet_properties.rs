//! Property-based tests for the packet codec and token shape.
//!
//! These verify that decoding never panics on arbitrary input, that the
//! encoder output is always accepted by the decoder, and that the token
//! shape check agrees with its regex on valid tokens and their near misses.

use proptest::prelude::*;
use serde_json::{Value, json};
use wishpernet_proto::{
    ClientRequest, MessageEnvelope, Packet, ProtocolError, RoomToken, SendMessage, ServerEvent,
    ShareToken, is_valid_token_shape,
};

/// Oracle: regex `^[a-f0-9]{64}$` spelled out by hand.
fn oracle_shape(s: &str) -> bool {
    s.chars().count() == 64 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

fn arbitrary_token() -> impl Strategy<Value = RoomToken> {
    any::<[u8; 32]>().prop_map(|bytes| RoomToken::from_bytes(&bytes))
}

fn token_string() -> impl Strategy<Value = String> {
    arbitrary_token().prop_map(|token| token.as_str().to_owned())
}

fn replace_at(token: &str, index: usize, replacement: &str) -> String {
    let mut out = token.to_owned();
    out.replace_range(index..=index, replacement);
    out
}

/// A valid token with exactly one character-level defect.
fn near_miss_token() -> impl Strategy<Value = String> {
    prop_oneof![
        (token_string(), 0..64usize, "[A-F]").prop_map(|(t, i, c)| replace_at(&t, i, &c)),
        (token_string(), 0..64usize, "[g-zG-Z .:_-]").prop_map(|(t, i, c)| replace_at(&t, i, &c)),
        (token_string(), 0..64usize).prop_map(|(t, i)| replace_at(&t, i, "")),
        (token_string(), "[a-f0-9]").prop_map(|(t, c)| t + &c),
        (token_string(), "[ \t\n]").prop_map(|(t, ws)| format!("{ws}{t}")),
    ]
}

/// Mostly tokens and near misses, with some unrelated noise.
fn token_candidate() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => "[a-fA-F0-9g-z ]{0,70}",
        2 => token_string(),
        3 => near_miss_token(),
    ]
}

proptest! {
    #[test]
    fn prop_decode_never_panics(text in ".{0,256}") {
        let _ = Packet::decode(&text);
    }

    #[test]
    fn prop_decode_socket_prefix_never_panics(body in ".{0,256}") {
        let _ = Packet::decode(&format!("42{body}"));
        let _ = Packet::decode(&format!("43{body}"));
    }

    #[test]
    fn prop_token_shape_matches_oracle(s in token_candidate()) {
        prop_assert_eq!(is_valid_token_shape(&s), oracle_shape(&s));
        prop_assert_eq!(RoomToken::parse(&s).is_ok(), oracle_shape(&s));
    }

    #[test]
    fn prop_near_miss_tokens_are_rejected(s in near_miss_token()) {
        prop_assert!(!is_valid_token_shape(&s));
        prop_assert_eq!(RoomToken::parse(&s), Err(ProtocolError::InvalidToken { len: s.len() }));
        prop_assert!(ShareToken::parse(&s).is_err());
    }

    #[test]
    fn prop_generated_tokens_are_valid(token in arbitrary_token()) {
        prop_assert!(is_valid_token_shape(token.as_str()));
    }

    #[test]
    fn prop_send_message_survives_wire(
        token in arbitrary_token(),
        username in "[^\u{0}]{1,32}",
        payload in "[A-Za-z0-9+/=]{0,200}",
        timestamp in any::<u64>(),
        ack in proptest::option::of(any::<u64>()),
    ) {
        let request = ClientRequest::SendMessage(SendMessage {
            room_token: token,
            encrypted_message: payload,
            timestamp,
            username,
        });

        let text = request.clone().into_packet(ack).unwrap().encode().unwrap();
        let Packet::Event { ack: decoded_ack, name, data } = Packet::decode(&text).unwrap() else {
            return Err(TestCaseError::fail("expected event packet"));
        };

        prop_assert_eq!(decoded_ack, ack);
        prop_assert_eq!(ClientRequest::from_event(&name, data).unwrap(), request);
    }
}

#[test]
fn string_wrapped_and_object_data_decode_identically() {
    let object = json!({
        "username": "dave",
        "encryptedMessage": "AAAA",
        "timestamp": 1_700_000_000_000_u64,
        "messageId": "9c1d"
    });
    let wrapped = Value::String(object.to_string());

    let a = ServerEvent::from_event("new-message", object).unwrap();
    let b = ServerEvent::from_event("new-message", wrapped).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a,
        ServerEvent::NewMessage(MessageEnvelope {
            username: "dave".into(),
            encrypted_message: Some("AAAA".into()),
            timestamp: 1_700_000_000_000,
            message_id: Some("9c1d".into()),
        })
    );
}

#[test]
fn string_data_that_is_not_json_is_rejected() {
    let result = ServerEvent::from_event("room-error", Value::String("Room not found".into()));
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}
