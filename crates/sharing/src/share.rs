//! Additive secret shares over Z_2^64
//!
//! A value `v` is held as `v = share_0 + share_1 (mod 2^64)`. Each party
//! holds one [`SecretShare`]; shares are zeroized on drop.
//!
//! A `SecretShare` has no public reveal. Only [`crate::ResultShare`], the
//! output of a secure matrix product, can be opened to plaintext.

use privlookup_fixed_point::RingTensor;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{Result, SharingError};

/// One of the two computing parties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Party {
    /// Rank 0. Adds public constants and public cross terms.
    Zero,
    /// Rank 1
    One,
}

impl Party {
    pub fn from_rank(rank: u32) -> Option<Self> {
        match rank {
            0 => Some(Party::Zero),
            1 => Some(Party::One),
            _ => None,
        }
    }

    pub fn rank(self) -> u32 {
        match self {
            Party::Zero => 0,
            Party::One => 1,
        }
    }

    pub fn peer(self) -> Self {
        match self {
            Party::Zero => Party::One,
            Party::One => Party::Zero,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Party::Zero
    }
}

/// This party's additive share of a secret tensor
#[derive(Debug)]
pub struct SecretShare {
    tensor: RingTensor,
    frac_bits: u8,
}

impl Drop for SecretShare {
    fn drop(&mut self) {
        self.tensor.data_mut().zeroize();
    }
}

impl SecretShare {
    pub(crate) fn from_tensor(tensor: RingTensor, frac_bits: u8) -> Self {
        Self { tensor, frac_bits }
    }

    pub(crate) fn tensor(&self) -> &RingTensor {
        &self.tensor
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    /// Fixed-point fractional bits of the shared value
    pub fn frac_bits(&self) -> u8 {
        self.frac_bits
    }

    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    fn check_scale(&self, other: &Self) -> Result<()> {
        if self.frac_bits != other.frac_bits {
            return Err(SharingError::ScaleMismatch {
                expected: self.frac_bits,
                got: other.frac_bits,
            });
        }
        Ok(())
    }

    /// `[x + y]`, local
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_scale(other)?;
        Ok(Self::from_tensor(self.tensor.add(&other.tensor)?, self.frac_bits))
    }

    /// `[x - y]`, local
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_scale(other)?;
        Ok(Self::from_tensor(self.tensor.sub(&other.tensor)?, self.frac_bits))
    }

    /// `[-x]`, local
    pub fn negate(&self) -> Self {
        Self::from_tensor(self.tensor.neg(), self.frac_bits)
    }

    /// `[x + k]` for a public ring constant at this share's scale.
    /// Only party 0 folds the constant into its share.
    pub fn add_scalar(&self, party: Party, scalar: u64) -> Self {
        let tensor = if party.is_zero() {
            self.tensor.add_scalar(scalar)
        } else {
            self.tensor.clone()
        };
        Self::from_tensor(tensor, self.frac_bits)
    }

    /// `[k * x]` for a public integer `k`; the scale is unchanged
    pub fn mul_scalar(&self, scalar: u64) -> Self {
        Self::from_tensor(self.tensor.mul_scalar(scalar), self.frac_bits)
    }

    /// Sum along `axis`, local
    pub fn sum_axis(&self, axis: usize) -> Result<Self> {
        Ok(Self::from_tensor(self.tensor.sum_axis(axis)?, self.frac_bits))
    }

    /// `[x[..] - m[v]]` along a new trailing axis, for a public vector `m`
    pub fn broadcast_sub_public(&self, party: Party, values: &[u64]) -> Self {
        let tensor = if party.is_zero() {
            self.tensor.broadcast_sub(values)
        } else {
            self.tensor.broadcast_repeat(values.len())
        };
        Self::from_tensor(tensor, self.frac_bits)
    }

    /// Drop `bits` fractional bits with two-party local truncation.
    ///
    /// Party 0 shifts its share; party 1 shifts the negation of its share and
    /// negates back. The result is off by at most one unit in the last place,
    /// except with probability about `2^-(63 - log2|x|)`.
    pub fn truncate(&self, party: Party, bits: u8) -> Result<Self> {
        if bits > self.frac_bits {
            return Err(SharingError::ScaleMismatch {
                expected: self.frac_bits,
                got: bits,
            });
        }
        let tensor = match party {
            Party::Zero => self.tensor.shr_signed(bits),
            Party::One => self.tensor.neg().shr_signed(bits).neg(),
        };
        Ok(Self::from_tensor(tensor, self.frac_bits - bits))
    }

    pub fn reshape(&self, shape: Vec<usize>) -> Result<Self> {
        Ok(Self::from_tensor(
            self.tensor.clone().reshape(shape)?,
            self.frac_bits,
        ))
    }
}

/// Both shares of a value, as produced by whoever knows the plaintext
pub struct SharePair {
    zero: SecretShare,
    one: SecretShare,
}

impl SharePair {
    /// Split an encoded tensor: party 1's share is uniform, party 0's share
    /// is `value - share_1`
    pub fn split<R: RngCore>(value: &RingTensor, frac_bits: u8, rng: &mut R) -> Result<Self> {
        let one = RingTensor::random(value.shape().to_vec(), rng);
        let zero = value.sub(&one)?;
        Ok(Self {
            zero: SecretShare::from_tensor(zero, frac_bits),
            one: SecretShare::from_tensor(one, frac_bits),
        })
    }

    /// Separate into `(share for party, share for its peer)`
    pub fn into_shares(self, keep: Party) -> (SecretShare, SecretShare) {
        match keep {
            Party::Zero => (self.zero, self.one),
            Party::One => (self.one, self.zero),
        }
    }

    #[cfg(test)]
    pub(crate) fn reconstruct(&self) -> Result<RingTensor> {
        Ok(self.zero.tensor.add(&self.one.tensor)?)
    }
}
