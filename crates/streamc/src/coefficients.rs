//! # Coefficient Stream Generator
//!
//! Repair packets carry their coefficients explicitly, so the generator only
//! has to be deterministic for a given seed: the same seed and the same
//! sequence of repair calls reproduce the same repair packets bit for bit.
//!
//! The generator sits behind [`CoefficientSource`] so tests and replay tools
//! can substitute their own sequence.

use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;

use crate::field::GaloisField;

/// A reproducible stream of coding coefficients.
pub trait CoefficientSource {
    /// Fill `out` with the coefficients for one repair packet. Called exactly
    /// once per repair packet, so implementations advance once per packet.
    fn fill(&mut self, field: &GaloisField, out: &mut [u8]);
}

/// Default generator: uniform draws over the nonzero elements of the field.
pub struct SeededCoefficients {
    rng: StdRng,
    seed: u64,
}

impl SeededCoefficients {
    pub fn new(seed: u64) -> Self {
        SeededCoefficients {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl std::fmt::Debug for SeededCoefficients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededCoefficients")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl CoefficientSource for SeededCoefficients {
    fn fill(&mut self, field: &GaloisField, out: &mut [u8]) {
        // Zero coefficients would silently drop a symbol from the combination.
        let size = field.size();
        for c in out.iter_mut() {
            *c = self.rng.random_range(1..size) as u8;
        }
    }
}

/// Replays a fixed coefficient list, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedCoefficients {
    values: Vec<u8>,
    cursor: usize,
}

impl FixedCoefficients {
    /// Panics if `values` is empty.
    pub fn new(values: Vec<u8>) -> Self {
        assert!(!values.is_empty(), "fixed coefficient list must not be empty");
        FixedCoefficients { values, cursor: 0 }
    }
}

impl CoefficientSource for FixedCoefficients {
    fn fill(&mut self, _field: &GaloisField, out: &mut [u8]) {
        for c in out.iter_mut() {
            *c = self.values[self.cursor % self.values.len()];
            self.cursor += 1;
        }
    }
}
