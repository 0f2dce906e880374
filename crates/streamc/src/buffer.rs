//! # Sliding Transmission Buffer
//!
//! Fixed-capacity ring of source symbols awaiting acknowledgment. All slots
//! live in one contiguous arena; the slot for source id `n` starts at
//! `(n % capacity) * symbol_size`. The window `[head_id, next_id)` only moves
//! forward: `enqueue` extends the tail, `flush_acked` advances the head.

use std::ops::RangeInclusive;

use tracing::{debug, warn};

use crate::error::{CodecError, Result};

#[derive(Debug)]
pub struct TransmitBuffer {
    arena: Vec<u8>,
    capacity: usize,
    symbol_size: usize,
    /// Oldest buffered id (`headsid`).
    head_id: u64,
    /// Id the next enqueue must carry (`tailsid + 1`).
    next_id: u64,
}

impl TransmitBuffer {
    /// Allocate `capacity` slots of `symbol_size` bytes each.
    pub fn new(capacity: usize, symbol_size: usize) -> Result<Self> {
        if capacity == 0 || symbol_size == 0 {
            return Err(CodecError::InvalidParameters(format!(
                "buffer needs nonzero capacity and symbol size, got {capacity} x {symbol_size}"
            )));
        }
        let bytes = capacity.checked_mul(symbol_size).ok_or_else(|| {
            CodecError::InvalidParameters(format!(
                "buffer of {capacity} x {symbol_size} bytes overflows"
            ))
        })?;
        let mut arena = Vec::new();
        arena.try_reserve_exact(bytes)?;
        arena.resize(bytes, 0);
        Ok(TransmitBuffer {
            arena,
            capacity,
            symbol_size,
            head_id: 0,
            next_id: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn symbol_size(&self) -> usize {
        self.symbol_size
    }

    /// Occupied slots.
    pub fn len(&self) -> usize {
        (self.next_id - self.head_id) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_id == self.head_id
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn head_id(&self) -> u64 {
        self.head_id
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Buffered ids `[headsid, tailsid]`, or `None` when empty.
    pub fn window(&self) -> Option<RangeInclusive<u64>> {
        if self.is_empty() {
            None
        } else {
            Some(self.head_id..=self.next_id - 1)
        }
    }

    fn offset(&self, id: u64) -> usize {
        (id % self.capacity as u64) as usize * self.symbol_size
    }

    /// Append the symbol for `id` at the tail. Data shorter than the symbol
    /// size is zero-padded.
    pub fn enqueue(&mut self, id: u64, data: &[u8]) -> Result<()> {
        if data.len() > self.symbol_size {
            return Err(CodecError::SymbolTooLarge {
                len: data.len(),
                symbol_size: self.symbol_size,
            });
        }
        if id != self.next_id {
            return Err(CodecError::OutOfSequence {
                expected: self.next_id,
                got: id,
            });
        }
        if self.is_full() {
            return Err(CodecError::BufferFull {
                capacity: self.capacity,
            });
        }

        let start = self.offset(id);
        let slot = &mut self.arena[start..start + self.symbol_size];
        slot[..data.len()].copy_from_slice(data);
        slot[data.len()..].fill(0);
        self.next_id += 1;
        Ok(())
    }

    /// Release every id `<= ack_id`. Stale acknowledgments are ignored and
    /// acknowledgments past the tail are clamped to it. Returns the number of
    /// slots released.
    pub fn flush_acked(&mut self, ack_id: u64) -> usize {
        if ack_id < self.head_id {
            return 0;
        }
        let mut new_head = ack_id.saturating_add(1);
        if new_head > self.next_id {
            warn!(
                ack_id,
                next_id = self.next_id,
                "acknowledgment beyond buffered tail, clamping"
            );
            new_head = self.next_id;
        }
        let released = (new_head - self.head_id) as usize;
        self.head_id = new_head;
        if released > 0 {
            debug!(head_id = self.head_id, released, "transmission window advanced");
        }
        released
    }

    /// Symbol bytes for `id` if it is still buffered.
    pub fn get(&self, id: u64) -> Option<&[u8]> {
        if id < self.head_id || id >= self.next_id {
            return None;
        }
        let start = self.offset(id);
        Some(&self.arena[start..start + self.symbol_size])
    }

    /// Buffered `(id, symbol)` pairs from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        (self.head_id..self.next_id).map(move |id| {
            let start = self.offset(id);
            (id, &self.arena[start..start + self.symbol_size])
        })
    }
}
