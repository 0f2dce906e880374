//! # Decoder
//!
//! Receives source and repair packets in any order, folds them into an
//! [`EliminationMatrix`] and hands out source symbols strictly in id order.
//!
//! ## Window
//!
//! The decoding window runs from `win_s`, the oldest unresolved id, to the
//! highest id any accepted packet has mentioned. `win_s` doubles as the
//! in-order delivery cursor, so `win_s - 1` is the value a receiver
//! acknowledges back to the encoder.
//!
//! ## Delivered history
//!
//! Repair packets may combine ids that were already delivered. Their
//! contribution is cancelled out of the repair symbol using a bounded history
//! of the last `window_capacity` delivered symbols, which reaches back at
//! least as far as any encoder window that shares these parameters.
//!
//! ## Resynchronisation
//!
//! After a [`WindowOverflow`](CodecError::WindowOverflow) the caller
//! deactivates. If the next packet still lies beyond `win_s +
//! window_capacity`, the missing ids are unrecoverable and activation jumps
//! the window to the packet's lowest id, dropping history. A stream that
//! restarts from id 0 needs [`Decoder::reset`] instead.

use std::collections::VecDeque;
use std::ops::Range;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::Parameters;
use crate::error::{CodecError, Result};
use crate::field::GaloisField;
use crate::matrix::EliminationMatrix;
use crate::stats::DecoderStats;
use crate::wire::Packet;

/// Classification of a packet at reception time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reception {
    /// Mentions at least one unresolved id; queued for processing.
    Accepted,
    /// Every id it mentions is already delivered.
    Duplicate,
}

/// Result of folding one packet into the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Added a degree of freedom; `delivered` symbols became available in order.
    Innovative { delivered: usize },
    /// Linearly dependent on what the decoder already holds.
    Redundant,
    /// Every id it mentions is already delivered.
    Duplicate,
}

pub struct Decoder {
    params: Parameters,
    field: &'static GaloisField,
    active: bool,
    matrix: EliminationMatrix,
    /// One past the highest id mentioned by an innovative packet.
    frontier: u64,
    pending: VecDeque<Packet>,
    last_repair_id: Option<u64>,
    /// Delivered symbols for ids `[win_s - history.len(), win_s)`.
    history: VecDeque<Bytes>,
    output: VecDeque<(u64, Bytes)>,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new(params: Parameters) -> Result<Self> {
        params.validate()?;
        let field = GaloisField::get(params.gf_power)?;
        Ok(Decoder {
            params,
            field,
            active: false,
            matrix: EliminationMatrix::new(0),
            frontier: 0,
            pending: VecDeque::new(),
            last_repair_id: None,
            history: VecDeque::new(),
            output: VecDeque::new(),
            stats: DecoderStats::new(),
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Oldest unresolved id.
    pub fn win_s(&self) -> u64 {
        self.matrix.base()
    }

    /// Unresolved ids the decoder knows about, as `win_s..win_e + 1`.
    /// `None` while inactive; empty when everything seen is delivered.
    pub fn window(&self) -> Option<Range<u64>> {
        self.active.then(|| self.win_s()..self.frontier.max(self.win_s()))
    }

    /// Independent equations held for unresolved ids.
    pub fn dof(&self) -> usize {
        self.matrix.dof()
    }

    /// Number of symbols delivered in order. Ids skipped by a resync are
    /// not counted.
    pub fn delivered_count(&self) -> u64 {
        self.stats.delivered
    }

    /// Highest id delivered in order, the value to acknowledge.
    pub fn inorder(&self) -> Option<u64> {
        self.win_s().checked_sub(1)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// A delivered symbol still held in history.
    pub fn symbol(&self, id: u64) -> Option<&Bytes> {
        let back = self.win_s().checked_sub(id)? as usize;
        if back == 0 || back > self.history.len() {
            return None;
        }
        self.history.get(self.history.len() - back)
    }

    /// Take every symbol delivered since the last call, in id order.
    pub fn drain_delivered(&mut self) -> impl Iterator<Item = (u64, Bytes)> + '_ {
        self.output.drain(..)
    }

    /// Parse a wire packet with this decoder's parameters.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Packet> {
        let packet = Packet::decode(&mut &bytes[..], self.params.symbol_size)?;
        self.check(&packet)?;
        Ok(packet)
    }

    /// Open the window at the next in-order id and extend it to cover
    /// `first`. When `first` lies out of reach of that id the window jumps
    /// forward to `first`'s lowest id. A no-op when already active.
    pub fn activate(&mut self, first: &Packet) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.check(first)?;
        let capacity = self.params.window_capacity as u64;
        let end = first.high_id().saturating_add(1);
        if end.saturating_sub(self.win_s()) > capacity && first.low_id() > self.win_s() {
            self.resync(first.low_id());
        }
        let win_s = self.win_s();
        self.active = true;
        // A packet wider than the capacity leaves the window empty; processing
        // it reports the overflow.
        self.frontier = if end.saturating_sub(win_s) <= capacity {
            end.max(win_s)
        } else {
            win_s
        };
        self.stats.activations += 1;
        debug!(
            win_s = self.win_s(),
            win_e = self.frontier.checked_sub(1),
            "decoder activated"
        );
        Ok(())
    }

    /// Classify `packet` and queue it for [`process_pending`](Self::process_pending).
    pub fn receive(&mut self, packet: Packet) -> Result<Reception> {
        if !self.active {
            return Err(CodecError::NotActive);
        }
        self.check(&packet)?;
        self.stats.packets_received += 1;

        if let Packet::Repair(rp) = &packet {
            match self.last_repair_id {
                Some(last) if rp.repair_id.saturating_sub(last) > 1 => {
                    self.stats.repair_gaps += rp.repair_id - last - 1;
                    trace!(last, repair_id = rp.repair_id, "repair id gap");
                }
                _ => {}
            }
            if self.last_repair_id.map_or(true, |last| rp.repair_id > last) {
                self.last_repair_id = Some(rp.repair_id);
            }
        }

        if packet.high_id() < self.win_s() {
            self.stats.duplicates += 1;
            trace!(high = packet.high_id(), win_s = self.win_s(), "duplicate packet");
            return Ok(Reception::Duplicate);
        }
        self.pending.push_back(packet);
        Ok(Reception::Accepted)
    }

    /// Fold every queued packet in arrival order. Returns the number of
    /// symbols delivered. On error the failing packet is dropped and the
    /// rest stay queued.
    pub fn process_pending(&mut self) -> Result<usize> {
        let mut delivered = 0;
        while let Some(packet) = self.pending.pop_front() {
            if let Outcome::Innovative { delivered: n } = self.process(&packet)? {
                delivered += n;
            }
        }
        Ok(delivered)
    }

    /// Activate if needed, receive, and process everything queued. The
    /// returned outcome is for `packet`; its delivered count also includes
    /// symbols released by packets that were still queued.
    /// If an earlier queued packet fails, `packet` stays queued.
    pub fn ingest(&mut self, packet: Packet) -> Result<Outcome> {
        if !self.active {
            self.check(&packet)?;
            if packet.high_id() < self.win_s() {
                self.stats.packets_received += 1;
                self.stats.duplicates += 1;
                return Ok(Outcome::Duplicate);
            }
            self.activate(&packet)?;
        }
        if self.receive(packet)? == Reception::Duplicate {
            return Ok(Outcome::Duplicate);
        }
        let Some(packet) = self.pending.pop_back() else {
            return Ok(Outcome::Duplicate);
        };
        let earlier = match self.process_pending() {
            Ok(n) => n,
            Err(e) => {
                self.pending.push_back(packet);
                return Err(e);
            }
        };
        Ok(match self.process(&packet)? {
            Outcome::Innovative { delivered } => Outcome::Innovative {
                delivered: delivered + earlier,
            },
            other => other,
        })
    }

    /// Fold one packet into the matrix and deliver whatever it resolves.
    pub fn process(&mut self, packet: &Packet) -> Result<Outcome> {
        if !self.active {
            return Err(CodecError::NotActive);
        }
        self.check(packet)?;

        let win_s = self.win_s();
        if packet.high_id() < win_s {
            self.stats.duplicates += 1;
            return Ok(Outcome::Duplicate);
        }

        let frontier = self.frontier.max(packet.high_id().saturating_add(1));
        if frontier - win_s > self.params.window_capacity as u64 {
            warn!(
                win_s,
                win_e = frontier - 1,
                capacity = self.params.window_capacity,
                "decoding window overflow"
            );
            return Err(CodecError::WindowOverflow {
                win_s,
                win_e: frontier - 1,
                capacity: self.params.window_capacity,
            });
        }

        let (start, coeffs, symbol) = match packet {
            Packet::Source(sp) => (sp.id, vec![1u8], sp.symbol.to_vec()),
            Packet::Repair(rp) => {
                let mut symbol = rp.symbol.to_vec();
                for id in rp.win_s..win_s.min(rp.win_e.saturating_add(1)) {
                    let c = rp.coefficient(id);
                    if c == 0 {
                        continue;
                    }
                    let Some(known) = self.symbol(id) else {
                        warn!(id, win_s, "repair references evicted history");
                        return Err(CodecError::HistoryEvicted { id });
                    };
                    self.field.mul_add_region(&mut symbol, known, c);
                }
                let start = rp.win_s.max(win_s);
                let coeffs = rp.coefficients[(start - rp.win_s) as usize..].to_vec();
                (start, coeffs, symbol)
            }
        };

        if !self.matrix.insert(self.field, start, coeffs, symbol)? {
            self.stats.redundant += 1;
            trace!(low = packet.low_id(), high = packet.high_id(), "redundant packet");
            return Ok(Outcome::Redundant);
        }
        self.frontier = frontier;
        self.stats.innovative += 1;
        self.stats.peak_window = self.stats.peak_window.max(frontier - win_s);

        let delivered = self.deliver_resolved();
        trace!(
            win_s = self.win_s(),
            dof = self.dof(),
            delivered,
            "innovative packet"
        );
        Ok(Outcome::Innovative { delivered })
    }

    /// Drop pending packets and matrix state. Delivered history and the
    /// in-order cursor survive, so a later activation resumes the stream.
    pub fn deactivate(&mut self) -> Result<()> {
        if !self.active {
            return Err(CodecError::NotActive);
        }
        let win_s = self.win_s();
        debug!(
            win_s,
            dof = self.dof(),
            dropped = self.pending.len(),
            "decoder deactivated"
        );
        self.pending.clear();
        self.matrix.reset(win_s);
        self.frontier = win_s;
        self.last_repair_id = None;
        self.active = false;
        Ok(())
    }

    /// Forget the stream entirely: cursor, history, undelivered output and
    /// matrix state. The next activation starts again at id 0. Stats
    /// accumulate across resets.
    pub fn reset(&mut self) {
        debug!(
            win_s = self.win_s(),
            undrained = self.output.len(),
            "decoder reset"
        );
        self.pending.clear();
        self.matrix.reset(0);
        self.frontier = 0;
        self.last_repair_id = None;
        self.history.clear();
        self.output.clear();
        self.active = false;
    }

    /// Move the window forward to `base`, giving up on every id before it.
    fn resync(&mut self, base: u64) {
        let from = self.win_s();
        warn!(from, to = base, skipped = base - from, "resynchronising past lost ids");
        self.matrix.reset(base);
        self.frontier = base;
        self.history.clear();
        self.stats.resyncs += 1;
    }

    fn deliver_resolved(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(symbol) = self.matrix.pop_resolved() {
            let id = self.win_s() - 1;
            let symbol = Bytes::from(symbol);
            if self.history.len() == self.params.window_capacity {
                self.history.pop_front();
            }
            self.history.push_back(symbol.clone());
            self.output.push_back((id, symbol));
            delivered += 1;
        }
        self.stats.delivered += delivered as u64;
        delivered
    }

    /// Structural checks the wire codec cannot make without the field.
    fn check(&self, packet: &Packet) -> Result<()> {
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
        Ok(())
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("field", self.field)
            .field("active", &self.active)
            .field("window", &self.window())
            .field("dof", &self.dof())
            .field("pending", &self.pending.len())
            .finish()
    }
}
