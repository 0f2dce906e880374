#![no_main]

use libfuzzer_sys::fuzz_target;
use streamc::{Decoder, Parameters};

/// Fuzz the decoder with arbitrary packet sequences.
///
/// The input is split into length-prefixed records, each handed to
/// `deserialize` and then `ingest`. This exercises:
/// - field membership checks on repair coefficients
/// - window overflow and evicted-history rejection
/// - elimination over arbitrary (often singular) coefficient sets
///
/// Errors are expected; panics and a `dof` beyond the window width are not.
fuzz_target!(|data: &[u8]| {
    let Some((&cfg, mut rest)) = data.split_first() else {
        return;
    };
    let gf_power = cfg % 8 + 1;
    let params = Parameters::default()
        .with_gf_power(gf_power)
        .with_symbol_size(usize::from(gf_power))
        .with_buffer_size(16)
        .with_window_capacity(16);
    let Ok(mut dec) = Decoder::new(params) else {
        return;
    };

    while let Some((&len, tail)) = rest.split_first() {
        let len = usize::from(len).min(tail.len());
        let (record, next) = tail.split_at(len);
        rest = next;

        if let Ok(packet) = dec.deserialize(record) {
            let _ = dec.ingest(packet);
        }
        let width = dec.window().map_or(0, |w| w.end - w.start);
        assert!(dec.dof() as u64 <= width);
        let win_s = dec.win_s();
        for (id, symbol) in dec.drain_delivered() {
            assert!(id < win_s);
            assert_eq!(symbol.len(), usize::from(gf_power));
        }
        if dec.pending_len() > 64 {
            let _ = dec.deactivate();
        }
    }
});
