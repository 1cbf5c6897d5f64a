//! PrivLookup Fixed-Point Ring
//!
//! Ring arithmetic over Z_2^64 and the fixed-point encoding used to carry
//! real-valued tensors through additive secret sharing.

mod error;
mod fixed;
mod tensor;

pub use error::{FixedPointError, Result};
pub use fixed::{
    from_signed, shift_right_signed, to_signed, FixedPointEncoder, DEFAULT_FRAC_BITS,
    MAX_FRAC_BITS, RING_BITS,
};
pub use tensor::RingTensor;
