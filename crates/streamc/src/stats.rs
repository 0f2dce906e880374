//! # Codec Statistics
//!
//! Counters kept by the encoder and decoder. Both serialize to JSON for
//! export alongside the rest of an application's telemetry.

use serde::Serialize;

// ─── Encoder Stats ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncoderStats {
    /// Systematic packets emitted.
    pub source_sent: u64,
    /// Repair packets emitted over the full window.
    pub repairs_sent: u64,
    /// Repair packets emitted over a truncated window.
    pub short_repairs_sent: u64,
    pub symbols_enqueued: u64,
    /// Symbols released by acknowledgments.
    pub symbols_flushed: u64,
}

impl EncoderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repair packets per source packet sent so far.
    pub fn repair_overhead(&self) -> f64 {
        if self.source_sent == 0 {
            0.0
        } else {
            (self.repairs_sent + self.short_repairs_sent) as f64 / self.source_sent as f64
        }
    }
}

// ─── Decoder Stats ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Packets handed to `receive`, duplicates included.
    pub packets_received: u64,
    pub duplicates: u64,
    /// Packets that reduced to zero against the current matrix.
    pub redundant: u64,
    /// Packets that added a degree of freedom.
    pub innovative: u64,
    /// Symbols delivered in order.
    pub delivered: u64,
    /// Repair ids skipped between consecutive repair packets.
    pub repair_gaps: u64,
    pub activations: u64,
    /// Activations that skipped unrecoverable ids.
    pub resyncs: u64,
    /// Widest window seen, in source ids.
    pub peak_window: u64,
}

impl DecoderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of received packets that carried new information.
    pub fn efficiency(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.innovative as f64 / self.packets_received as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_handle_zero() {
        assert_eq!(EncoderStats::new().repair_overhead(), 0.0);
        assert_eq!(DecoderStats::new().efficiency(), 0.0);
    }

    #[test]
    fn repair_overhead_counts_both_kinds() {
        let stats = EncoderStats {
            source_sent: 10,
            repairs_sent: 2,
            short_repairs_sent: 3,
            ..Default::default()
        };
        assert!((stats.repair_overhead() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn serializes_to_json() {
        let stats = DecoderStats {
            packets_received: 4,
            innovative: 3,
            delivered: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["packets_received"], 4);
        assert_eq!(json["delivered"], 3);
        assert_eq!(json["repair_gaps"], 0);
    }
}
