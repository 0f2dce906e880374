//! # GF(2^m) Arithmetic
//!
//! Arithmetic over GF(2^m) for `m` in `1..=8`. Addition is XOR;
//! multiplication and division go through log/antilog tables built from a
//! primitive polynomial with generator 2. Field elements are one byte each;
//! symbol regions pack `m`-bit elements back to back.
//!
//! Tables are built once per exponent and shared process-wide, so a
//! [`GaloisField`] reference is free to pass around and carries no state.

use once_cell::sync::Lazy;

use crate::error::{CodecError, Result};

/// Largest supported field exponent. Field elements are one byte on the wire.
pub const MAX_GF_POWER: u8 = 8;

/// Primitive polynomials for GF(2^1) .. GF(2^8), indexed by `m - 1`.
const PRIMITIVE_POLY: [u16; 8] = [0x3, 0x7, 0xB, 0x13, 0x25, 0x43, 0x89, 0x11D];

static FIELDS: Lazy<[GaloisField; 8]> = Lazy::new(|| {
    [
        GaloisField::build(1),
        GaloisField::build(2),
        GaloisField::build(3),
        GaloisField::build(4),
        GaloisField::build(5),
        GaloisField::build(6),
        GaloisField::build(7),
        GaloisField::build(8),
    ]
});

/// GF(2^m) with precomputed log/antilog tables.
pub struct GaloisField {
    power: u8,
    /// Order of the multiplicative group: 2^m - 1.
    order: usize,
    log: [u8; 256],
    /// Antilog table, duplicated so `log a + log b` never needs a modulo.
    exp: [u8; 512],
}

impl GaloisField {
    /// Shared field for exponent `power`.
    pub fn get(power: u8) -> Result<&'static GaloisField> {
        if power == 0 || power > MAX_GF_POWER {
            return Err(CodecError::InvalidParameters(format!(
                "gf_power must be in 1..={MAX_GF_POWER}, got {power}"
            )));
        }
        Ok(&FIELDS[(power - 1) as usize])
    }

    fn build(power: u8) -> Self {
        let size = 1usize << power;
        let order = size - 1;
        let poly = PRIMITIVE_POLY[(power - 1) as usize];

        let mut log = [0u8; 256];
        let mut exp = [0u8; 512];
        let mut x: u16 = 1;
        for i in 0..order {
            exp[i] = x as u8;
            exp[i + order] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & size as u16 != 0 {
                x ^= poly;
            }
        }
        // log[0] is unused (0 has no logarithm)
        GaloisField {
            power,
            order,
            log,
            exp,
        }
    }

    /// Field exponent `m`.
    pub fn power(&self) -> u8 {
        self.power
    }

    /// Number of field elements, 2^m.
    pub fn size(&self) -> usize {
        self.order + 1
    }

    /// Whether `a` is an element of this field.
    #[inline]
    pub fn contains(&self, a: u8) -> bool {
        (a as usize) <= self.order
    }

    #[inline]
    pub fn add(&self, a: u8, b: u8) -> u8 {
        a ^ b
    }

    #[inline]
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let sum = self.log[a as usize] as usize + self.log[b as usize] as usize;
        self.exp[sum]
    }

    /// Division. Panics if `b == 0`.
    #[inline]
    pub fn div(&self, a: u8, b: u8) -> u8 {
        assert_ne!(b, 0, "division by zero in GF(2^{})", self.power);
        if a == 0 {
            return 0;
        }
        let diff = self.log[a as usize] as usize + self.order - self.log[b as usize] as usize;
        self.exp[diff]
    }

    /// Multiplicative inverse. Panics if `a == 0`.
    #[inline]
    pub fn inv(&self, a: u8) -> u8 {
        assert_ne!(a, 0, "inverse of zero in GF(2^{})", self.power);
        self.exp[self.order - self.log[a as usize] as usize]
    }

    /// `dst[i] ^= c * src[i]` for vectors holding one element per byte.
    pub fn mul_add_elements(&self, dst: &mut [u8], src: &[u8], c: u8) {
        if c == 0 {
            return;
        }
        for (d, &s) in dst.iter_mut().zip(src) {
            *d ^= self.mul(s, c);
        }
    }

    /// `dst[i] = c * dst[i]` for vectors holding one element per byte.
    pub fn mul_elements(&self, dst: &mut [u8], c: u8) {
        for d in dst.iter_mut() {
            *d = self.mul(*d, c);
        }
    }

    /// `dst ^= c * src` over the common prefix of both slices.
    ///
    /// In GF(2^8) every byte is one element. Smaller fields read the region
    /// as a big-endian bit stream of `m`-bit elements, so the region length
    /// in bits should be a multiple of `m`.
    pub fn mul_add_region(&self, dst: &mut [u8], src: &[u8], c: u8) {
        match c {
            0 => {}
            1 => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d ^= s;
                }
            }
            _ if self.power == 8 => {
                let log_c = self.log[c as usize] as usize;
                for (d, &s) in dst.iter_mut().zip(src) {
                    if s != 0 {
                        *d ^= self.exp[log_c + self.log[s as usize] as usize];
                    }
                }
            }
            _ => {
                let m = self.power as usize;
                let words = dst.len().min(src.len()) * 8 / m;
                for w in 0..words {
                    let s = read_bits(src, w * m, m);
                    if s != 0 {
                        xor_bits(dst, w * m, m, self.mul(s, c));
                    }
                }
            }
        }
    }

    /// `dst = c * dst`, with the same element layout as [`Self::mul_add_region`].
    pub fn mul_region(&self, dst: &mut [u8], c: u8) {
        match c {
            0 => dst.fill(0),
            1 => {}
            _ if self.power == 8 => {
                for d in dst.iter_mut() {
                    *d = self.mul(*d, c);
                }
            }
            _ => {
                let m = self.power as usize;
                for w in 0..dst.len() * 8 / m {
                    let v = read_bits(dst, w * m, m);
                    if v != 0 {
                        xor_bits(dst, w * m, m, v ^ self.mul(v, c));
                    }
                }
            }
        }
    }
}

/// `width` bits (at most 8) starting `offset` bits into `buf`, MSB first.
#[inline]
fn read_bits(buf: &[u8], offset: usize, width: usize) -> u8 {
    let byte = offset / 8;
    let shift = offset % 8;
    let hi = buf[byte] as u16;
    let lo = buf.get(byte + 1).copied().unwrap_or(0) as u16;
    let window = (hi << 8) | lo;
    ((window >> (16 - shift - width)) & ((1 << width) - 1)) as u8
}

/// XOR `value` into the `width` bits starting `offset` bits into `buf`.
#[inline]
fn xor_bits(buf: &mut [u8], offset: usize, width: usize, value: u8) {
    let byte = offset / 8;
    let shift = offset % 8;
    let window = (value as u16) << (16 - shift - width);
    buf[byte] ^= (window >> 8) as u8;
    let low = window as u8;
    if low != 0 {
        buf[byte + 1] ^= low;
    }
}

impl std::fmt::Debug for GaloisField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GF(2^{})", self.power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_fields() -> impl Iterator<Item = &'static GaloisField> {
        (1..=MAX_GF_POWER).map(|m| GaloisField::get(m).unwrap())
    }

    #[test]
    fn rejects_unsupported_power() {
        assert!(GaloisField::get(0).is_err());
        assert!(GaloisField::get(9).is_err());
    }

    #[test]
    fn generator_spans_multiplicative_group() {
        // Every nonzero element must show up exactly once in the antilog table,
        // otherwise the polynomial is not primitive.
        for gf in all_fields() {
            let mut seen = vec![false; gf.size()];
            for i in 0..gf.order {
                let v = gf.exp[i] as usize;
                assert!(v != 0 && v < gf.size(), "{gf:?}: exp[{i}] = {v}");
                assert!(!seen[v], "{gf:?}: {v} generated twice");
                seen[v] = true;
            }
        }
    }

    #[test]
    fn identity_and_zero() {
        for gf in all_fields() {
            for a in 0..gf.size() as u8 {
                assert_eq!(gf.mul(a, 1), a);
                assert_eq!(gf.mul(1, a), a);
                assert_eq!(gf.mul(a, 0), 0);
                assert_eq!(gf.add(a, a), 0);
            }
        }
    }

    #[test]
    fn inverse_property() {
        for gf in all_fields() {
            for a in 1..gf.size() as u8 {
                let inv = gf.inv(a);
                assert!(gf.contains(inv));
                assert_eq!(gf.mul(a, inv), 1, "{gf:?}: a={a}, inv={inv}");
            }
        }
    }

    #[test]
    fn div_roundtrip() {
        for gf in all_fields() {
            for a in 1..gf.size() as u8 {
                for b in 1..gf.size() as u8 {
                    assert_eq!(gf.div(gf.mul(a, b), b), a);
                }
            }
        }
    }

    #[test]
    fn gf256_matches_known_products() {
        let gf = GaloisField::get(8).unwrap();
        // 0x11D reduction: x^8 = x^4 + x^3 + x^2 + 1
        assert_eq!(gf.mul(0x80, 2), 0x1D);
        assert_eq!(gf.mul(2, 2), 4);
        assert_eq!(gf.inv(1), 1);
    }

    #[test]
    fn distributive() {
        let gf = GaloisField::get(4).unwrap();
        for a in 0..16u8 {
            for b in 0..16u8 {
                for c in 0..16u8 {
                    assert_eq!(
                        gf.mul(a, gf.add(b, c)),
                        gf.add(gf.mul(a, b), gf.mul(a, c))
                    );
                }
            }
        }
    }

    #[test]
    fn element_ops_stay_in_field() {
        let gf = GaloisField::get(3).unwrap();
        let src = [1u8, 2, 3, 7];
        let mut dst = [5u8, 0, 6, 1];
        gf.mul_add_elements(&mut dst, &src, 6);
        for (i, &d) in dst.iter().enumerate() {
            assert!(gf.contains(d));
            assert_eq!(d, [5u8, 0, 6, 1][i] ^ gf.mul(src[i], 6));
        }
        gf.mul_elements(&mut dst, gf.inv(6));
        gf.mul_elements(&mut dst, 6);
        assert!(dst.iter().all(|&d| gf.contains(d)));
    }

    #[test]
    fn nibble_regions_act_per_element() {
        let gf = GaloisField::get(4).unwrap();
        let src = [0x12u8, 0xF0, 0x0A];
        let mut dst = [0u8; 3];
        gf.mul_add_region(&mut dst, &src, 3);
        for (i, (&d, &s)) in dst.iter().zip(&src).enumerate() {
            assert_eq!(d >> 4, gf.mul(s >> 4, 3), "high nibble of byte {i}");
            assert_eq!(d & 0xF, gf.mul(s & 0xF, 3), "low nibble of byte {i}");
        }
    }

    #[test]
    fn packed_regions_invert() {
        // 105 bytes hold a whole number of elements for every m in 1..=8.
        let original: Vec<u8> = (0..105u32).map(|i| (i * 151 + 7) as u8).collect();
        for gf in all_fields() {
            for c in 1..gf.size() as u8 {
                let mut buf = original.clone();
                gf.mul_region(&mut buf, c);
                gf.mul_region(&mut buf, gf.inv(c));
                assert_eq!(buf, original, "{gf:?}: c={c}");

                let mut acc = vec![0u8; original.len()];
                gf.mul_add_region(&mut acc, &original, c);
                let mut scaled = original.clone();
                gf.mul_region(&mut scaled, c);
                assert_eq!(acc, scaled, "{gf:?}: c={c}");
                gf.mul_add_region(&mut acc, &original, c);
                assert!(acc.iter().all(|&b| b == 0));
            }
        }
    }

    #[test]
    fn region_ops_match_scalar() {
        let gf = GaloisField::get(8).unwrap();
        let src: Vec<u8> = (0..=255u8).collect();
        for c in [0u8, 1, 2, 0x53, 0xFF] {
            let mut dst = vec![0xA5u8; 256];
            gf.mul_add_region(&mut dst, &src, c);
            for (i, &d) in dst.iter().enumerate() {
                assert_eq!(d, 0xA5 ^ gf.mul(c, src[i]));
            }

            let mut scaled = src.clone();
            gf.mul_region(&mut scaled, c);
            for (i, &s) in scaled.iter().enumerate() {
                assert_eq!(s, gf.mul(c, src[i]));
            }
        }
    }
}
