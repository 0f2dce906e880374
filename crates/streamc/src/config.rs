//! Session parameters shared by both ends of a stream.
//!
//! Parameters are either built in code (`Parameters::default()` plus the
//! `with_*` helpers) or parsed from TOML:
//!
//! ```toml
//! gf_power = 8
//! symbol_size = 1200
//! repair_ratio = 3        # one repair packet after every 3 source packets
//! seed = 42
//! buffer_size = 128
//! ```

use serde::Deserialize;

use crate::error::{CodecError, Result};
use crate::field::MAX_GF_POWER;

pub const DEFAULT_GF_POWER: u8 = 8;
pub const DEFAULT_SYMBOL_SIZE: usize = 200;
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Largest symbol accepted, keeps a whole packet within a UDP datagram.
pub const MAX_SYMBOL_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParametersInput {
    pub gf_power: Option<u8>,
    pub symbol_size: Option<usize>,
    pub repair_ratio: Option<f64>,
    pub seed: Option<u64>,
    pub buffer_size: Option<usize>,
    pub window_capacity: Option<usize>,
}

/// Codec parameters. Encoder and decoder of one stream must agree on all of
/// them except `repair_ratio`, which only steers the encoder's scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Field exponent `m` of GF(2^m).
    pub gf_power: u8,
    /// Bytes per source symbol.
    pub symbol_size: usize,
    /// Repair packets per source packet. Below 1 it is a probability, from 1
    /// upward it must be an integer `n` and one repair follows every `n`
    /// source packets.
    pub repair_ratio: f64,
    /// Seed for the coefficient stream.
    pub seed: u64,
    /// Encoder transmission buffer capacity in symbols.
    pub buffer_size: usize,
    /// Widest decoding window the decoder will track.
    pub window_capacity: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            gf_power: DEFAULT_GF_POWER,
            symbol_size: DEFAULT_SYMBOL_SIZE,
            repair_ratio: 0.0,
            seed: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            window_capacity: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Parameters {
    pub fn with_gf_power(mut self, gf_power: u8) -> Self {
        self.gf_power = gf_power;
        self
    }

    pub fn with_symbol_size(mut self, symbol_size: usize) -> Self {
        self.symbol_size = symbol_size;
        self
    }

    pub fn with_repair_ratio(mut self, repair_ratio: f64) -> Self {
        self.repair_ratio = repair_ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the buffer size and raises the window capacity to match if needed.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self.window_capacity = self.window_capacity.max(buffer_size);
        self
    }

    pub fn with_window_capacity(mut self, window_capacity: usize) -> Self {
        self.window_capacity = window_capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.gf_power == 0 || self.gf_power > MAX_GF_POWER {
            return Err(invalid(format!(
                "gf_power must be in 1..={MAX_GF_POWER}, got {}",
                self.gf_power
            )));
        }
        if self.symbol_size == 0 || self.symbol_size > MAX_SYMBOL_SIZE {
            return Err(invalid(format!(
                "symbol_size must be in 1..={MAX_SYMBOL_SIZE}, got {}",
                self.symbol_size
            )));
        }
        if (self.symbol_size * 8) % self.gf_power as usize != 0 {
            return Err(invalid(format!(
                "symbol_size ({} bytes) must hold a whole number of {}-bit field elements",
                self.symbol_size, self.gf_power
            )));
        }
        if !self.repair_ratio.is_finite() || self.repair_ratio < 0.0 {
            return Err(invalid(format!(
                "repair_ratio must be a non-negative number, got {}",
                self.repair_ratio
            )));
        }
        if self.repair_ratio >= 1.0 && self.repair_ratio.fract() != 0.0 {
            return Err(invalid(format!(
                "repair_ratio >= 1 must be an integer, got {}",
                self.repair_ratio
            )));
        }
        if self.buffer_size == 0 {
            return Err(invalid("buffer_size must be > 0".to_string()));
        }
        // The decoder cancels delivered symbols out of repair packets using its
        // history, which must reach back as far as the encoder window does.
        if self.window_capacity < self.buffer_size {
            return Err(invalid(format!(
                "window_capacity ({}) must be >= buffer_size ({})",
                self.window_capacity, self.buffer_size
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Parameters::default());
        }
        let parsed: ParametersInput = toml::from_str(input)
            .map_err(|e| invalid(format!("invalid parameters TOML: {e}")))?;
        parsed.resolve()
    }
}

impl ParametersInput {
    pub fn resolve(self) -> Result<Parameters> {
        let defaults = Parameters::default();
        let buffer_size = self.buffer_size.unwrap_or(defaults.buffer_size);
        let params = Parameters {
            gf_power: self.gf_power.unwrap_or(defaults.gf_power),
            symbol_size: self.symbol_size.unwrap_or(defaults.symbol_size),
            repair_ratio: self.repair_ratio.unwrap_or(defaults.repair_ratio),
            seed: self.seed.unwrap_or(defaults.seed),
            buffer_size,
            window_capacity: self.window_capacity.unwrap_or(buffer_size),
        };
        params.validate()?;
        Ok(params)
    }
}

fn invalid(msg: String) -> CodecError {
    CodecError::InvalidParameters(msg)
}
