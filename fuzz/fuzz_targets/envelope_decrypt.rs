//! Fuzz target for envelope decoding and decryption
//!
//! # Strategy
//!
//! - Arbitrary text as the envelope (garbled relays, foreign rooms)
//! - Genuine envelopes with one bit flipped
//!
//! # Invariants
//!
//! - Decryption never panics; every failure is a `CipherError`
//! - A tampered envelope never authenticates

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wishpernet_crypto::{decrypt, derive_room_key, encrypt, NONCE_SIZE};
use wishpernet_proto::RoomToken;

#[derive(Debug, Arbitrary)]
enum Input {
    /// Text straight off the wire
    Raw(String),
    /// Genuine envelope with a flipped bit
    Tampered { plaintext: String, nonce: [u8; NONCE_SIZE], token: [u8; 32], flip: u16 },
}

fuzz_target!(|input: Input| {
    match input {
        Input::Raw(text) => {
            let key = derive_room_key(&RoomToken::from_bytes(&[0xab; 32]));
            let _ = decrypt(&text, &key);
        },
        Input::Tampered { plaintext, nonce, token, flip } => {
            let key = derive_room_key(&RoomToken::from_bytes(&token));
            let envelope = encrypt(plaintext.as_bytes(), &key, nonce).expect("encrypt");

            let mut raw = envelope.nonce.to_vec();
            raw.extend_from_slice(&envelope.ciphertext);
            let bit = usize::from(flip) % (raw.len() * 8);
            raw[bit / 8] ^= 1 << (bit % 8);

            let mut tampered = envelope.clone();
            tampered.nonce.copy_from_slice(&raw[..NONCE_SIZE]);
            tampered.ciphertext = raw[NONCE_SIZE..].to_vec();

            assert!(decrypt(&tampered.encode(), &key).is_err(), "tampered envelope opened");
            assert_eq!(decrypt(&envelope.encode(), &key).as_deref(), Ok(plaintext.as_str()));
        },
    }
});
