//! Error taxonomy shared by the encoder, decoder and wire codec.
//!
//! Steady-state outcomes under loss (duplicate or redundant packets) are not
//! errors; they are reported through [`crate::decoder::Reception`] and
//! [`crate::decoder::Outcome`]. Everything here is either caller misuse or a
//! resource condition the caller has to act on.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("transmission buffer full ({capacity} symbols)")]
    BufferFull { capacity: usize },
    #[error("decoder is not active")]
    NotActive,
    #[error("decoding window [{win_s}, {win_e}] exceeds capacity {capacity}")]
    WindowOverflow { win_s: u64, win_e: u64, capacity: usize },
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("source id {got} out of sequence, expected {expected}")]
    OutOfSequence { expected: u64, got: u64 },
    #[error("symbol of {len} bytes exceeds symbol size {symbol_size}")]
    SymbolTooLarge { len: usize, symbol_size: usize },
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    #[error("source id {id} is no longer held in delivered history")]
    HistoryEvicted { id: u64 },
}

pub type Result<T> = std::result::Result<T, CodecError>;
