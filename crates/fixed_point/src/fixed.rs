//! Fixed-point encoding into the ring Z_2^64

use serde::{Deserialize, Serialize};

use crate::error::{FixedPointError, Result};

/// Default number of fractional bits (2^16 = 65536)
pub const DEFAULT_FRAC_BITS: u8 = 16;

/// Maximum number of fractional bits (leaves headroom for accumulation)
pub const MAX_FRAC_BITS: u8 = 40;

/// Bit width of the ring every share lives in
pub const RING_BITS: u32 = 64;

/// Encodes real values as ring elements scaled by 2^frac_bits.
///
/// Negative values use two's complement, so decoding reads the ring
/// element back as an `i64` before dividing out the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPointEncoder {
    frac_bits: u8,
}

impl FixedPointEncoder {
    /// Create an encoder with the given number of fractional bits
    pub fn new(frac_bits: u8) -> Result<Self> {
        if frac_bits > MAX_FRAC_BITS {
            return Err(FixedPointError::InvalidFracBits(frac_bits));
        }
        Ok(Self { frac_bits })
    }

    /// Encoder for plain integers (scale 0)
    pub const fn integer() -> Self {
        Self { frac_bits: 0 }
    }

    /// Number of fractional bits
    pub fn frac_bits(&self) -> u8 {
        self.frac_bits
    }

    /// Scale factor 2^frac_bits as f64
    pub fn scale_factor(&self) -> f64 {
        (1u64 << self.frac_bits) as f64
    }

    /// Largest magnitude that can be encoded without wrapping
    pub fn max_magnitude(&self) -> f64 {
        (1u64 << (RING_BITS as u8 - 1 - self.frac_bits)) as f64
    }

    /// Encode a single value
    pub fn encode(&self, value: f64) -> Result<u64> {
        if !value.is_finite() {
            return Err(FixedPointError::NotFinite(value));
        }
        let scaled = (value * self.scale_factor()).round();
        if scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
            return Err(FixedPointError::Overflow {
                value,
                frac_bits: self.frac_bits,
            });
        }
        Ok(scaled as i64 as u64)
    }

    /// Encode a slice of values
    pub fn encode_slice(&self, values: &[f64]) -> Result<Vec<u64>> {
        values.iter().map(|&v| self.encode(v)).collect()
    }

    /// Decode a single ring element
    pub fn decode(&self, raw: u64) -> f64 {
        raw as i64 as f64 / self.scale_factor()
    }

    /// Decode a slice of ring elements
    pub fn decode_slice(&self, raw: &[u64]) -> Vec<f64> {
        raw.iter().map(|&x| self.decode(x)).collect()
    }
}

impl Default for FixedPointEncoder {
    fn default() -> Self {
        Self {
            frac_bits: DEFAULT_FRAC_BITS,
        }
    }
}

/// Signed interpretation of a ring element
pub fn to_signed(raw: u64) -> i64 {
    raw as i64
}

/// Ring element for a signed integer
pub fn from_signed(value: i64) -> u64 {
    value as u64
}

/// Arithmetic right shift of a ring element, reading it as signed
pub fn shift_right_signed(raw: u64, bits: u8) -> u64 {
    ((raw as i64) >> bits) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_f64() {
        let encoder = FixedPointEncoder::default();
        let values = [0.0, 1.0, -1.0, 0.5, -0.5, 0.123456, -0.123456, 100.0, -100.0];

        for &v in &values {
            let back = encoder.decode(encoder.encode(v).unwrap());
            let error = (v - back).abs();
            // One ulp at 16 fractional bits is ~0.000015
            assert!(
                error < 0.0001,
                "Roundtrip error too large for {}: got {}, error {}",
                v,
                back,
                error
            );
        }
    }

    #[test]
    fn test_negative_is_twos_complement() {
        let encoder = FixedPointEncoder::integer();
        assert_eq!(encoder.encode(-1.0).unwrap(), u64::MAX);
        assert_eq!(encoder.decode(u64::MAX), -1.0);
    }

    #[test]
    fn test_wrapping_add_decodes() {
        let encoder = FixedPointEncoder::default();
        let a = encoder.encode(1.5).unwrap();
        let b = encoder.encode(-2.25).unwrap();
        let sum = a.wrapping_add(b);
        assert!((encoder.decode(sum) + 0.75).abs() < 0.0001);
    }

    #[test]
    fn test_invalid_frac_bits() {
        assert!(matches!(
            FixedPointEncoder::new(MAX_FRAC_BITS + 1),
            Err(FixedPointError::InvalidFracBits(_))
        ));
    }

    #[test]
    fn test_overflow() {
        let encoder = FixedPointEncoder::new(MAX_FRAC_BITS).unwrap();
        let result = encoder.encode(1e12);
        assert!(matches!(result, Err(FixedPointError::Overflow { .. })));
    }

    #[test]
    fn test_not_finite() {
        let encoder = FixedPointEncoder::default();
        assert!(matches!(
            encoder.encode(f64::NAN),
            Err(FixedPointError::NotFinite(_))
        ));
    }

    #[test]
    fn test_shift_right_signed() {
        let encoder = FixedPointEncoder::integer();
        let minus_eight = encoder.encode(-8.0).unwrap();
        assert_eq!(to_signed(shift_right_signed(minus_eight, 2)), -2);
        assert_eq!(shift_right_signed(from_signed(12), 2), 3);
    }
}
