//! Fixed-point error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FixedPointError {
    #[error("Overflow during fixed-point encoding: {value} does not fit with {frac_bits} fractional bits")]
    Overflow { value: f64, frac_bits: u8 },

    #[error("Value is not finite: {0}")]
    NotFinite(f64),

    #[error("Scale mismatch: expected {expected}, got {got}")]
    ScaleMismatch { expected: u8, got: u8 },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid fractional bit count: {0} (must be at most {})", crate::MAX_FRAC_BITS)]
    InvalidFracBits(u8),

    #[error("Axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },
}

pub type Result<T> = std::result::Result<T, FixedPointError>;
