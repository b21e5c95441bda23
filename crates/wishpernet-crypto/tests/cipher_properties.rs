//! Property-based tests for room encryption.
//!
//! Oracle: a key derived independently on a second cipher instance stands
//! in for a second client.

use proptest::prelude::*;
use wishpernet_crypto::{CipherError, Envelope, NONCE_SIZE, RoomCipher, TAG_SIZE};
use wishpernet_proto::RoomToken;

fn arbitrary_token() -> impl Strategy<Value = RoomToken> {
    any::<[u8; 32]>().prop_map(|bytes| RoomToken::from_bytes(&bytes))
}

fn distinct_tokens() -> impl Strategy<Value = (RoomToken, RoomToken)> {
    (arbitrary_token(), arbitrary_token()).prop_filter("tokens must differ", |(a, b)| a != b)
}

proptest! {
    #[test]
    fn prop_round_trip_across_clients(
        token in arbitrary_token(),
        plaintext in ".{0,64}|.{1024,1500}",
        nonce in any::<[u8; NONCE_SIZE]>(),
    ) {
        let mut sender = RoomCipher::new();
        let mut receiver = RoomCipher::new();

        let envelope = sender.seal(&plaintext, &token, nonce).unwrap();
        prop_assert_eq!(receiver.open(&envelope, &token).unwrap(), plaintext);
    }

    #[test]
    fn prop_distinct_nonces_give_distinct_envelopes(
        token in arbitrary_token(),
        plaintext in ".{0,64}",
        n1 in any::<[u8; NONCE_SIZE]>(),
        n2 in any::<[u8; NONCE_SIZE]>(),
    ) {
        prop_assume!(n1 != n2);
        let mut cipher = RoomCipher::new();

        let a = cipher.seal(&plaintext, &token, n1).unwrap();
        let b = cipher.seal(&plaintext, &token, n2).unwrap();
        prop_assert_ne!(a, b);
    }

    #[test]
    fn prop_cross_room_isolation((t1, t2) in distinct_tokens(), plaintext in ".{0,64}") {
        let mut cipher = RoomCipher::new();

        let envelope = cipher.seal(&plaintext, &t1, [0; NONCE_SIZE]).unwrap();
        prop_assert_eq!(cipher.open(&envelope, &t2), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn prop_envelope_layout(token in arbitrary_token(), plaintext in ".{0,256}") {
        let mut cipher = RoomCipher::new();
        let nonce = [0x42; NONCE_SIZE];

        let decoded = Envelope::decode(&cipher.seal(&plaintext, &token, nonce).unwrap()).unwrap();
        prop_assert_eq!(decoded.nonce, nonce);
        prop_assert_eq!(decoded.ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn prop_open_never_panics(token in arbitrary_token(), garbage in ".{0,128}") {
        let mut cipher = RoomCipher::new();
        let _ = cipher.open(&garbage, &token);
    }
}

#[test]
fn known_answer_interoperates_with_browser_clients() {
    let token = RoomToken::parse(&"ab".repeat(32)).unwrap();
    let nonce: [u8; NONCE_SIZE] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    let mut cipher = RoomCipher::new();

    let envelope = cipher.seal("hello", &token, nonce).unwrap();
    assert_eq!(envelope, "AAECAwQFBgcICQoL4/5vXAeXzUfXaGnxySqzcgRDcpbl");
    assert_eq!(hex::encode(nonce), "000102030405060708090a0b");
}
