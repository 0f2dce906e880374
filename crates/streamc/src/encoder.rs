//! # Encoder
//!
//! Buffers source symbols in a [`TransmitBuffer`] and emits two kinds of
//! packets from it:
//!
//! - **source packets**, each symbol verbatim, once, in id order;
//! - **repair packets**, a random linear combination over GF(2^m) of every
//!   symbol still in the window (or of the most recent `k`).
//!
//! The window only shrinks when the receiver acknowledges through
//! [`Encoder::flush_acked`]; until then every repair keeps covering the
//! unacknowledged symbols.
//!
//! ```
//! use streamc::{Encoder, Parameters};
//!
//! let params = Parameters::default().with_symbol_size(4);
//! let mut enc = Encoder::new(params).unwrap();
//! enc.push(b"AAAA").unwrap();
//! enc.push(b"BBBB").unwrap();
//! let first = enc.output_source_packet().unwrap();
//! let repair = enc.output_repair_packet().unwrap();
//! assert!(!first.is_repair());
//! assert!(repair.is_repair());
//! ```

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use tracing::{debug, trace, warn};

use crate::buffer::TransmitBuffer;
use crate::coefficients::{CoefficientSource, SeededCoefficients};
use crate::config::Parameters;
use crate::error::{CodecError, Result};
use crate::field::GaloisField;
use crate::stats::EncoderStats;
use crate::wire::{Packet, RepairPacket};

/// Offsets the scheduler stream from the coefficient stream seeded with the
/// same value.
const SCHEDULER_SEED_SALT: u64 = 0x5EED_0F_5C4E_D01E;

pub struct Encoder<C = SeededCoefficients> {
    params: Parameters,
    field: &'static GaloisField,
    buffer: TransmitBuffer,
    coefficients: C,
    /// Draws the repair decisions of [`next_packet`](Self::next_packet) when
    /// the repair ratio is fractional.
    scheduler: StdRng,
    /// Next id to emit as a source packet.
    send_cursor: u64,
    next_repair_id: u64,
    /// Packets emitted by the scheduler so far.
    scheduled: u64,
    stats: EncoderStats,
}

impl Encoder<SeededCoefficients> {
    /// Encoder with the default coefficient stream seeded from `params.seed`.
    pub fn new(params: Parameters) -> Result<Self> {
        let coefficients = SeededCoefficients::new(params.seed);
        Self::with_source(params, coefficients)
    }

    /// Encoder preloaded with `data`, split into symbols. When the data does
    /// not fit `buffer_size` the buffer grows to the next multiple of it and
    /// the window capacity follows; decoders should take [`Self::params`].
    pub fn with_data(mut params: Parameters, data: &[u8]) -> Result<Self> {
        params.validate()?;
        let symbols = data.len().div_ceil(params.symbol_size);
        if symbols > params.buffer_size {
            let grown = symbols.div_ceil(params.buffer_size) * params.buffer_size;
            params = params.with_buffer_size(grown);
            debug!(
                symbols,
                buffer_size = params.buffer_size,
                "transmission buffer grown to hold initial data"
            );
        }
        let mut encoder = Self::new(params)?;
        for chunk in data.chunks(encoder.params.symbol_size) {
            encoder.push(chunk)?;
        }
        Ok(encoder)
    }
}

impl<C: CoefficientSource> Encoder<C> {
    /// Encoder drawing repair coefficients from `coefficients`.
    pub fn with_source(params: Parameters, coefficients: C) -> Result<Self> {
        params.validate()?;
        let field = GaloisField::get(params.gf_power)?;
        let buffer = TransmitBuffer::new(params.buffer_size, params.symbol_size)?;
        Ok(Encoder {
            field,
            buffer,
            coefficients,
            scheduler: StdRng::seed_from_u64(params.seed ^ SCHEDULER_SEED_SALT),
            send_cursor: 0,
            next_repair_id: 0,
            scheduled: 0,
            stats: EncoderStats::new(),
            params,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn field(&self) -> &'static GaloisField {
        self.field
    }

    pub fn buffer(&self) -> &TransmitBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Next id to emit as a source packet.
    pub fn send_cursor(&self) -> u64 {
        self.send_cursor.max(self.buffer.head_id())
    }

    /// Source symbols buffered but not yet sent.
    pub fn unsent(&self) -> u64 {
        self.buffer.next_id() - self.send_cursor()
    }

    /// Buffer `data` as source id `id`, which must be the next id in sequence.
    pub fn enqueue(&mut self, id: u64, data: &[u8]) -> Result<()> {
        self.buffer.enqueue(id, data)?;
        self.stats.symbols_enqueued += 1;
        trace!(id, len = data.len(), "symbol enqueued");
        Ok(())
    }

    /// Buffer `data` under the next id and return that id.
    pub fn push(&mut self, data: &[u8]) -> Result<u64> {
        let id = self.buffer.next_id();
        self.enqueue(id, data)?;
        Ok(id)
    }

    /// The next unsent symbol as a systematic packet.
    pub fn output_source_packet(&mut self) -> Option<Packet> {
        let id = self.send_cursor();
        let symbol = self.buffer.get(id)?;
        let packet = Packet::source(id, Bytes::copy_from_slice(symbol));
        self.send_cursor = id + 1;
        self.stats.source_sent += 1;
        trace!(id, "source packet");
        Some(packet)
    }

    /// A repair packet over the whole window `[headsid, tailsid]`.
    pub fn output_repair_packet(&mut self) -> Option<Packet> {
        let window = self.buffer.window()?;
        let packet = self.repair_over(*window.start(), *window.end());
        self.stats.repairs_sent += 1;
        Some(packet)
    }

    /// A repair packet over the `k` most recent buffered symbols.
    pub fn output_repair_packet_short(&mut self, k: usize) -> Option<Packet> {
        if k == 0 {
            return None;
        }
        let window = self.buffer.window()?;
        let win_e = *window.end();
        let win_s = win_e.saturating_sub(k as u64 - 1).max(*window.start());
        let packet = self.repair_over(win_s, win_e);
        self.stats.short_repairs_sent += 1;
        Some(packet)
    }

    fn repair_over(&mut self, win_s: u64, win_e: u64) -> Packet {
        let width = (win_e - win_s + 1) as usize;
        if width > self.params.window_capacity {
            warn!(
                win_s,
                win_e,
                capacity = self.params.window_capacity,
                "repair window wider than the decoder window capacity"
            );
        }

        let mut coefficients = vec![0u8; width];
        self.coefficients.fill(self.field, &mut coefficients);
        if !coefficients.iter().all(|&c| self.field.contains(c)) {
            warn!(
                gf_power = self.field.power(),
                "coefficient source produced values outside the field"
            );
        }

        let mut symbol = vec![0u8; self.params.symbol_size];
        for (id, &c) in (win_s..=win_e).zip(&coefficients) {
            if let Some(src) = self.buffer.get(id) {
                self.field.mul_add_region(&mut symbol, src, c);
            }
        }

        let repair_id = self.next_repair_id;
        self.next_repair_id += 1;
        trace!(repair_id, win_s, win_e, "repair packet");
        Packet::Repair(RepairPacket {
            repair_id,
            win_s,
            win_e,
            coefficients: Bytes::from(coefficients),
            symbol: Bytes::from(symbol),
        })
    }

    /// Release every symbol up to and including `ack_id`. Returns the number
    /// of symbols released.
    pub fn flush_acked(&mut self, ack_id: u64) -> usize {
        let released = self.buffer.flush_acked(ack_id);
        self.stats.symbols_flushed += released as u64;
        released
    }

    /// Wire form of a packet built with these parameters.
    pub fn serialize(&self, packet: &Packet) -> Result<Bytes> {
        if packet.symbol().len() != self.params.symbol_size {
            return Err(CodecError::Malformed("symbol size mismatch"));
        }
        if let Packet::Repair(rp) = packet {
            if rp.win_e < rp.win_s || (rp.win_e - rp.win_s) as usize + 1 != rp.width() {
                return Err(CodecError::Malformed("coefficient count does not match window"));
            }
            if !rp.coefficients.iter().all(|&c| self.field.contains(c)) {
                return Err(CodecError::Malformed("coefficient outside the field"));
            }
        }
        Ok(packet.encode())
    }

    /// The next packet of a stream interleaving source and repair packets at
    /// `repair_ratio`. Once every buffered symbol has been sent, only repair
    /// packets come out until more data is pushed or the buffer is flushed.
    /// `None` when the buffer is empty.
    pub fn next_packet(&mut self) -> Option<Packet> {
        let window = self.buffer.window()?;
        let cursor = self.send_cursor();
        let in_flight = cursor > *window.start();
        let packet = if cursor > *window.end() || (in_flight && self.repair_due()) {
            self.output_repair_packet()
        } else {
            self.output_source_packet()
        };
        self.scheduled += 1;
        packet
    }

    fn repair_due(&mut self) -> bool {
        let ratio = self.params.repair_ratio;
        if ratio <= 0.0 {
            false
        } else if ratio < 1.0 {
            self.scheduler.random::<f64>() < ratio
        } else {
            let every = ratio as u64 + 1;
            (self.scheduled + 1) % every == 0
        }
    }
}

impl<C> std::fmt::Debug for Encoder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("field", self.field)
            .field("window", &self.buffer.window())
            .field("send_cursor", &self.send_cursor)
            .field("next_repair_id", &self.next_repair_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::FixedCoefficients;

    fn params() -> Parameters {
        Parameters::default().with_symbol_size(4).with_buffer_size(4)
    }

    #[test]
    fn source_packets_follow_enqueue_order() {
        let mut enc = Encoder::new(params()).unwrap();
        enc.push(b"AAAA").unwrap();
        enc.push(b"BB").unwrap();
        let Some(Packet::Source(a)) = enc.output_source_packet() else {
            panic!("expected source packet");
        };
        let Some(Packet::Source(b)) = enc.output_source_packet() else {
            panic!("expected source packet");
        };
        assert_eq!((a.id, &a.symbol[..]), (0, &b"AAAA"[..]));
        assert_eq!((b.id, &b.symbol[..]), (1, &b"BB\0\0"[..]));
        assert!(enc.output_source_packet().is_none());
        assert_eq!(enc.stats().source_sent, 2);
    }

    #[test]
    fn repair_is_the_weighted_sum() {
        let coeffs = vec![2u8, 3, 5];
        let mut enc = Encoder::with_source(params(), FixedCoefficients::new(coeffs.clone()))
            .unwrap();
        for s in [b"AAAA", b"BBBB", b"CCCC"] {
            enc.push(s).unwrap();
        }
        let Some(Packet::Repair(rp)) = enc.output_repair_packet() else {
            panic!("expected repair packet");
        };
        assert_eq!((rp.repair_id, rp.win_s, rp.win_e), (0, 0, 2));
        assert_eq!(&rp.coefficients[..], &coeffs[..]);

        let gf = enc.field();
        let mut expected = vec![0u8; 4];
        for (c, s) in coeffs.iter().zip([b"AAAA", b"BBBB", b"CCCC"]) {
            gf.mul_add_region(&mut expected, s, *c);
        }
        assert_eq!(&rp.symbol[..], &expected[..]);
    }

    #[test]
    fn serialize_rejects_coefficients_outside_the_field() {
        let p = params().with_gf_power(4);
        let mut enc = Encoder::with_source(p, FixedCoefficients::new(vec![3, 0x20])).unwrap();
        enc.push(b"AAAA").unwrap();
        enc.push(b"BBBB").unwrap();
        let repair = enc.output_repair_packet().unwrap();
        assert!(matches!(enc.serialize(&repair), Err(CodecError::Malformed(_))));
        // in-field sources serialize normally
        let source = enc.output_source_packet().unwrap();
        assert!(enc.serialize(&source).is_ok());
    }

    #[test]
    fn short_repair_covers_recent_symbols() {
        let mut enc = Encoder::new(params()).unwrap();
        for _ in 0..4 {
            enc.push(b"xxxx").unwrap();
        }
        let Some(Packet::Repair(rp)) = enc.output_repair_packet_short(2) else {
            panic!("expected repair packet");
        };
        assert_eq!((rp.win_s, rp.win_e, rp.width()), (2, 3, 2));
        let Some(Packet::Repair(rp)) = enc.output_repair_packet_short(10) else {
            panic!("expected repair packet");
        };
        assert_eq!((rp.win_s, rp.win_e), (0, 3));
        assert_eq!(rp.repair_id, 1);
        assert!(enc.output_repair_packet_short(0).is_none());
        assert_eq!(enc.stats().short_repairs_sent, 2);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut enc = Encoder::new(params()).unwrap();
        assert!(enc.output_source_packet().is_none());
        assert!(enc.output_repair_packet().is_none());
        assert!(enc.next_packet().is_none());
    }

    #[test]
    fn same_seed_same_repairs() {
        let mut a = Encoder::new(params().with_seed(11)).unwrap();
        let mut b = Encoder::new(params().with_seed(11)).unwrap();
        for enc in [&mut a, &mut b] {
            enc.push(b"AAAA").unwrap();
            enc.push(b"BBBB").unwrap();
        }
        for _ in 0..3 {
            assert_eq!(a.output_repair_packet(), b.output_repair_packet());
        }
    }

    #[test]
    fn flush_moves_window_and_cursor() {
        let mut enc = Encoder::new(params()).unwrap();
        for _ in 0..4 {
            enc.push(b"dddd").unwrap();
        }
        assert!(matches!(enc.push(b"eeee"), Err(CodecError::BufferFull { .. })));
        enc.output_source_packet();
        assert_eq!(enc.flush_acked(2), 3);
        // cursor was at 1, eviction overtook it
        assert_eq!(enc.send_cursor(), 3);
        let Some(Packet::Source(p)) = enc.output_source_packet() else {
            panic!("expected source packet");
        };
        assert_eq!(p.id, 3);
        assert_eq!(enc.push(b"eeee").unwrap(), 4);
        let Some(Packet::Repair(rp)) = enc.output_repair_packet() else {
            panic!("expected repair packet");
        };
        assert_eq!((rp.win_s, rp.win_e), (3, 4));
        assert_eq!(enc.stats().symbols_flushed, 3);
    }

    #[test]
    fn with_data_splits_and_grows() {
        let data: Vec<u8> = (0..22u8).collect();
        let enc = Encoder::with_data(params(), &data).unwrap();
        // 6 symbols do not fit in 4 slots, grown to 8
        assert_eq!(enc.buffer().capacity(), 8);
        assert_eq!(enc.buffer().len(), 6);
        assert_eq!(enc.buffer().get(5), Some(&[20u8, 21, 0, 0][..]));
    }

    #[test]
    fn integer_ratio_interleaves() {
        let mut enc = Encoder::new(params().with_buffer_size(16).with_repair_ratio(2.0)).unwrap();
        for _ in 0..8 {
            enc.push(b"ssss").unwrap();
        }
        let kinds: String = (0..9)
            .map(|_| match enc.next_packet() {
                Some(Packet::Source(_)) => 'S',
                Some(Packet::Repair(_)) => 'R',
                None => '-',
            })
            .collect();
        assert_eq!(kinds, "SSRSSRSSR");
    }

    #[test]
    fn zero_ratio_sends_sources_then_repairs() {
        let mut enc = Encoder::new(params()).unwrap();
        enc.push(b"aaaa").unwrap();
        enc.push(b"bbbb").unwrap();
        assert!(!enc.next_packet().unwrap().is_repair());
        assert!(!enc.next_packet().unwrap().is_repair());
        assert!(enc.next_packet().unwrap().is_repair());
        assert_eq!(enc.unsent(), 0);
    }

    #[test]
    fn serialize_checks_symbol_size() {
        let enc = Encoder::new(params()).unwrap();
        let ok = Packet::source(0, Bytes::from_static(b"AAAA"));
        assert_eq!(enc.serialize(&ok).unwrap(), ok.encode());
        let bad = Packet::source(0, Bytes::from_static(b"AAA"));
        assert!(matches!(enc.serialize(&bad), Err(CodecError::Malformed(_))));
    }
}
