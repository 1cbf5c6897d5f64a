//! XOR-shared 64-bit words
//!
//! `v = share_0 ^ share_1`. Used only inside the equality test, never
//! exposed to callers.

use privlookup_fixed_point::RingTensor;
use zeroize::Zeroize;

use crate::share::Party;

#[derive(Debug)]
pub(crate) struct BinaryShare {
    tensor: RingTensor,
}

impl Drop for BinaryShare {
    fn drop(&mut self) {
        self.tensor.data_mut().zeroize();
    }
}

impl BinaryShare {
    pub(crate) fn from_tensor(tensor: RingTensor) -> Self {
        Self { tensor }
    }

    pub(crate) fn tensor(&self) -> &RingTensor {
        &self.tensor
    }

    pub(crate) fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    /// `[x ^ y]`, local
    #[cfg(test)]
    pub(crate) fn xor(&self, other: &Self) -> crate::error::Result<Self> {
        Ok(Self::from_tensor(self.tensor.xor(&other.tensor)?))
    }

    /// `[x >> bits]` (logical), local
    pub(crate) fn shr(&self, bits: u32) -> Self {
        Self::from_tensor(self.tensor.shr(bits))
    }

    /// `[x & mask]` for a public mask, local
    pub(crate) fn and_public(&self, mask: u64) -> Self {
        Self::from_tensor(self.tensor.and_scalar(mask))
    }

    /// `[!x]`: party 0 flips its share
    pub(crate) fn not(&self, party: Party) -> Self {
        let tensor = if party.is_zero() {
            self.tensor.not()
        } else {
            self.tensor.clone()
        };
        Self::from_tensor(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(a: &BinaryShare, b: &BinaryShare) -> Vec<u64> {
        a.xor(b).unwrap().tensor().data().to_vec()
    }

    #[test]
    fn test_local_ops_commute_with_xor() {
        let x = 0xDEAD_BEEF_0123_4567u64;
        let s1 = 0x0F0F_F0F0_AAAA_5555u64;
        let a = BinaryShare::from_tensor(RingTensor::from_raw(vec![x ^ s1], vec![1]).unwrap());
        let b = BinaryShare::from_tensor(RingTensor::from_raw(vec![s1], vec![1]).unwrap());

        assert_eq!(open(&a, &b), vec![x]);
        assert_eq!(open(&a.shr(8), &b.shr(8)), vec![x >> 8]);
        assert_eq!(open(&a.and_public(0xFF), &b.and_public(0xFF)), vec![x & 0xFF]);
        assert_eq!(open(&a.not(Party::Zero), &b.not(Party::One)), vec![!x]);
    }
}
