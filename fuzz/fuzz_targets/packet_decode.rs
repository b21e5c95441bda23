//! Fuzz target for Packet::decode
//!
//! Feeds arbitrary text frames to the Engine.IO/Socket.IO decoder.
//!
//! # Invariants
//!
//! - Decoding never panics; malformed frames return an error
//! - Whatever decodes and re-encodes decodes again to the same kind of packet

#![no_main]

use libfuzzer_sys::fuzz_target;
use wishpernet_proto::Packet;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(packet) = Packet::decode(text) else {
        return;
    };

    let Ok(encoded) = packet.encode() else {
        return;
    };
    let again = Packet::decode(&encoded).expect("encoded packet must decode");
    assert_eq!(again.kind(), packet.kind(), "re-encoding changed the packet type");
});
