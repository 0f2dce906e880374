//! # Packet Model and Wire Format
//!
//! Two packet kinds travel on the channel. All integers are big-endian.
//!
//! ## Source packet
//!
//! ```text
//! +------+-------------------+------------------------+
//! | 0x00 | source id (u64)   | symbol (symbol_size)   |
//! +------+-------------------+------------------------+
//! ```
//!
//! ## Repair packet
//!
//! ```text
//! +------+-----------------+-------------+-------------+----------------------+------------------------+
//! | 0x01 | repair id (u64) | win_s (u64) | win_e (u64) | coeff x (win_e-win_s+1) | symbol (symbol_size) |
//! +------+-----------------+-------------+-------------+----------------------+------------------------+
//! ```
//!
//! One byte per coefficient, which covers every field up to GF(2^8). The
//! symbol size is not on the wire; both ends take it from their
//! [`Parameters`](crate::config::Parameters).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Type tag of a source packet.
pub const SOURCE_TAG: u8 = 0x00;
/// Type tag of a repair packet.
pub const REPAIR_TAG: u8 = 0x01;

/// Tag + source id.
pub const SOURCE_HEADER_LEN: usize = 1 + 8;
/// Tag + repair id + win_s + win_e.
pub const REPAIR_HEADER_LEN: usize = 1 + 8 + 8 + 8;

/// A systematic packet: one symbol verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePacket {
    pub id: u64,
    pub symbol: Bytes,
}

/// A coded packet: a linear combination of the symbols in `[win_s, win_e]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPacket {
    pub repair_id: u64,
    pub win_s: u64,
    pub win_e: u64,
    /// One coefficient per source id in `[win_s, win_e]`.
    pub coefficients: Bytes,
    pub symbol: Bytes,
}

impl RepairPacket {
    /// Number of source symbols combined.
    pub fn width(&self) -> usize {
        self.coefficients.len()
    }

    /// Coefficient applied to `id`, zero outside the window.
    pub fn coefficient(&self, id: u64) -> u8 {
        if id < self.win_s || id > self.win_e {
            return 0;
        }
        self.coefficients
            .get((id - self.win_s) as usize)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Source(SourcePacket),
    Repair(RepairPacket),
}

impl Packet {
    pub fn source(id: u64, symbol: Bytes) -> Self {
        Packet::Source(SourcePacket { id, symbol })
    }

    pub fn is_repair(&self) -> bool {
        matches!(self, Packet::Repair(_))
    }

    /// Lowest source id this packet says anything about.
    pub fn low_id(&self) -> u64 {
        match self {
            Packet::Source(p) => p.id,
            Packet::Repair(p) => p.win_s,
        }
    }

    /// Highest source id this packet says anything about.
    pub fn high_id(&self) -> u64 {
        match self {
            Packet::Source(p) => p.id,
            Packet::Repair(p) => p.win_e,
        }
    }

    pub fn symbol(&self) -> &Bytes {
        match self {
            Packet::Source(p) => &p.symbol,
            Packet::Repair(p) => &p.symbol,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Source(p) => SOURCE_HEADER_LEN + p.symbol.len(),
            Packet::Repair(p) => REPAIR_HEADER_LEN + p.coefficients.len() + p.symbol.len(),
        }
    }

    /// Append the wire form to `buf`.
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        match self {
            Packet::Source(p) => {
                buf.put_u8(SOURCE_TAG);
                buf.put_u64(p.id);
                buf.put_slice(&p.symbol);
            }
            Packet::Repair(p) => {
                buf.put_u8(REPAIR_TAG);
                buf.put_u64(p.repair_id);
                buf.put_u64(p.win_s);
                buf.put_u64(p.win_e);
                buf.put_slice(&p.coefficients);
                buf.put_slice(&p.symbol);
            }
        }
    }

    /// Serialize into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode exactly one packet occupying all of `buf`.
    ///
    /// Coefficients are not range-checked here; the decoder does that against
    /// its field.
    pub fn decode(buf: &mut impl Buf, symbol_size: usize) -> Result<Self> {
        if !buf.has_remaining() {
            return Err(CodecError::Malformed("empty packet"));
        }
        let packet = match buf.get_u8() {
            SOURCE_TAG => {
                if buf.remaining() < 8 {
                    return Err(CodecError::Malformed("truncated source header"));
                }
                let id = buf.get_u64();
                if buf.remaining() != symbol_size {
                    return Err(CodecError::Malformed("source symbol length mismatch"));
                }
                let symbol = buf.copy_to_bytes(symbol_size);
                Packet::Source(SourcePacket { id, symbol })
            }
            REPAIR_TAG => {
                if buf.remaining() < 24 {
                    return Err(CodecError::Malformed("truncated repair header"));
                }
                let repair_id = buf.get_u64();
                let win_s = buf.get_u64();
                let win_e = buf.get_u64();
                if win_e < win_s {
                    return Err(CodecError::Malformed("repair window end before start"));
                }
                // Compare without computing width + symbol_size first: a hostile
                // window can make that sum overflow.
                let width = win_e - win_s;
                let body = buf.remaining() as u64;
                if body < symbol_size as u64 || body - symbol_size as u64 != width + 1 {
                    return Err(CodecError::Malformed("repair body length mismatch"));
                }
                let coefficients = buf.copy_to_bytes(width as usize + 1);
                let symbol = buf.copy_to_bytes(symbol_size);
                Packet::Repair(RepairPacket {
                    repair_id,
                    win_s,
                    win_e,
                    coefficients,
                    symbol,
                })
            }
            _ => return Err(CodecError::Malformed("unknown packet tag")),
        };
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repair() -> Packet {
        Packet::Repair(RepairPacket {
            repair_id: 7,
            win_s: 10,
            win_e: 12,
            coefficients: Bytes::from_static(&[3, 0x1D, 0xFF]),
            symbol: Bytes::from_static(b"WXYZ"),
        })
    }

    #[test]
    fn source_layout_is_exact() {
        let pkt = Packet::source(0x0102_0304_0506_0708, Bytes::from_static(b"AAAA"));
        let wire = pkt.encode();
        assert_eq!(
            &wire[..],
            &[0x00, 1, 2, 3, 4, 5, 6, 7, 8, b'A', b'A', b'A', b'A'][..]
        );
        assert_eq!(wire.len(), pkt.encoded_len());
    }

    #[test]
    fn repair_layout_is_exact() {
        let wire = repair().encode();
        let mut expected = vec![0x01];
        expected.extend_from_slice(&7u64.to_be_bytes());
        expected.extend_from_slice(&10u64.to_be_bytes());
        expected.extend_from_slice(&12u64.to_be_bytes());
        expected.extend_from_slice(&[3, 0x1D, 0xFF]);
        expected.extend_from_slice(b"WXYZ");
        assert_eq!(&wire[..], &expected[..]);
    }

    #[test]
    fn roundtrip_both_kinds() {
        for pkt in [Packet::source(3, Bytes::from_static(b"CCCC")), repair()] {
            let wire = pkt.encode();
            let decoded = Packet::decode(&mut wire.clone(), 4).unwrap();
            assert_eq!(decoded, pkt);
            assert_eq!(decoded.encode(), wire);
        }
    }

    #[test]
    fn rejects_truncated_and_trailing() {
        let wire = repair().encode();
        for cut in 0..wire.len() {
            assert!(Packet::decode(&mut wire.slice(..cut), 4).is_err(), "cut={cut}");
        }
        let mut long = BytesMut::from(&wire[..]);
        long.put_u8(0);
        assert!(Packet::decode(&mut long.freeze(), 4).is_err());
    }

    #[test]
    fn rejects_wrong_symbol_size() {
        let wire = Packet::source(1, Bytes::from_static(b"AAAA")).encode();
        assert!(Packet::decode(&mut wire.clone(), 3).is_err());
        assert!(Packet::decode(&mut wire.clone(), 5).is_err());
    }

    #[test]
    fn rejects_inverted_window() {
        let mut buf = BytesMut::new();
        buf.put_u8(REPAIR_TAG);
        buf.put_u64(0);
        buf.put_u64(5);
        buf.put_u64(4);
        buf.put_slice(&[1, 2, 3, 4]);
        assert!(matches!(
            Packet::decode(&mut buf.freeze(), 4),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_huge_window_without_allocating() {
        let mut buf = BytesMut::new();
        buf.put_u8(REPAIR_TAG);
        buf.put_u64(0);
        buf.put_u64(0);
        buf.put_u64(u64::MAX);
        buf.put_slice(&[1, 2, 3, 4]);
        assert!(Packet::decode(&mut buf.freeze(), 4).is_err());
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(Packet::decode(&mut Bytes::from_static(&[0x7F, 0, 0]), 1).is_err());
        assert!(Packet::decode(&mut Bytes::new(), 1).is_err());
    }

    #[test]
    fn repair_coefficient_lookup() {
        let Packet::Repair(rp) = repair() else {
            unreachable!()
        };
        assert_eq!(rp.width(), 3);
        assert_eq!(rp.coefficient(9), 0);
        assert_eq!(rp.coefficient(10), 3);
        assert_eq!(rp.coefficient(12), 0xFF);
        assert_eq!(rp.coefficient(13), 0);
    }
}
