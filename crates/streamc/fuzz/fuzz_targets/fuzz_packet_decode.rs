#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use streamc::wire::Packet;

/// Fuzz the packet parser.
///
/// This target exercises:
/// - Packet::decode for both tags across several symbol sizes
/// - the re-encode path for anything that parses
///
/// Parsing must never panic, and a packet that parses must encode back to
/// exactly the bytes it came from.
fuzz_target!(|data: &[u8]| {
    let Some((&size, body)) = data.split_first() else {
        return;
    };
    let symbol_size = usize::from(size % 64) + 1;
    let wire = Bytes::copy_from_slice(body);
    if let Ok(packet) = Packet::decode(&mut wire.clone(), symbol_size) {
        assert_eq!(packet.encode(), wire);
    }
});
