//! # streamc
//!
//! Sliding-window streaming FEC codec.
//!
//! The encoder sends every source symbol once as a systematic packet and
//! mixes in repair packets: random linear combinations over GF(2^m) of the
//! symbols the receiver has not acknowledged yet. The decoder keeps an
//! incrementally reduced coefficient matrix over its window of unresolved
//! ids and releases symbols in order as soon as they are determined, without
//! waiting for the end of the stream or for retransmissions.
//!
//! ## Crate structure
//!
//! - [`field`]: GF(2^m) arithmetic, `m` in `1..=8`
//! - [`coefficients`]: Seeded coefficient streams for repair packets
//! - [`config`]: Session parameters and TOML loading
//! - [`wire`]: Packet model and wire format
//! - [`buffer`]: Encoder transmission ring
//! - [`encoder`]: Source/repair packet generation and scheduling
//! - [`matrix`]: Incremental Gaussian elimination
//! - [`decoder`]: Reception, window tracking and in-order delivery
//! - [`stats`]: Encoder and decoder counters
//! - [`error`]: Error type
//!
//! ## Example
//!
//! ```
//! use streamc::{Decoder, Encoder, Parameters};
//!
//! let params = Parameters::default().with_symbol_size(4).with_repair_ratio(1.0);
//! let mut enc = Encoder::new(params.clone()).unwrap();
//! let mut dec = Decoder::new(params).unwrap();
//!
//! for chunk in [b"AAAA", b"BBBB", b"CCCC"] {
//!     enc.push(chunk).unwrap();
//! }
//! while let Some(packet) = enc.next_packet() {
//!     if packet.low_id() == 1 && !packet.is_repair() {
//!         continue; // lost on the channel
//!     }
//!     dec.ingest(packet).unwrap();
//!     if dec.delivered_count() == 3 {
//!         break;
//!     }
//! }
//! let out: Vec<_> = dec.drain_delivered().map(|(_, s)| s).collect();
//! assert_eq!(out, [&b"AAAA"[..], &b"BBBB"[..], &b"CCCC"[..]]);
//! ```

pub mod buffer;
pub mod coefficients;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod field;
pub mod matrix;
pub mod stats;
pub mod wire;

pub use coefficients::{CoefficientSource, FixedCoefficients, SeededCoefficients};
pub use config::Parameters;
pub use decoder::{Decoder, Outcome, Reception};
pub use encoder::Encoder;
pub use error::{CodecError, Result};
pub use field::GaloisField;
pub use wire::{Packet, RepairPacket, SourcePacket};
