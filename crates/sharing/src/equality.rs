//! Oblivious equality against public candidates
//!
//! `X == m` is computed as a zero test on the shared difference `D = X - m`.
//! With `D = d0 + d1`, `D == 0` exactly when `d0 == -d1`, i.e. when the
//! word `!(d0 ^ -d1)` is all ones. Party 0 holds `!d0` and party 1 holds
//! `-d1`: an XOR sharing of that word, with no communication. An AND tree
//! folds the 64 bits into bit 0, one batched binary Beaver round per level,
//! and the resulting bit is converted back to an arithmetic share with one
//! elementwise Beaver product: `b = b0 + b1 - 2 * b0 * b1`.
//!
//! Nothing but Beaver-masked values is opened. The differences and the
//! equality bits stay shared.

use privlookup_protocol::Transport;

use crate::binary::BinaryShare;
use crate::context::PartyContext;
use crate::error::Result;
use crate::share::{Party, SecretShare};

/// Shifts of the AND-reduction tree over a 64-bit word
pub(crate) const AND_TREE_SHIFTS: [u32; 6] = [32, 16, 8, 4, 2, 1];

/// Equality test of a shared integer tensor against a public id list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObliviousEquality {
    candidates: Vec<u64>,
}

impl ObliviousEquality {
    pub fn new(candidates: Vec<u64>) -> Self {
        Self { candidates }
    }

    /// Candidates `0..vocab_size`
    pub fn vocabulary(vocab_size: usize) -> Self {
        Self::new((0..vocab_size as u64).collect())
    }

    pub fn candidates(&self) -> &[u64] {
        &self.candidates
    }

    /// `[X[..] == m[v]]` as 0/1 integers along a new trailing axis of
    /// length `candidates.len()`
    pub fn indicator<T: Transport>(&self, ctx: &mut PartyContext<T>, x: &SecretShare) -> Result<SecretShare> {
        let diff = x.broadcast_sub_public(ctx.party(), &self.candidates);
        Self::is_zero(ctx, &diff)
    }

    /// Occurrence counts of each candidate: the indicator summed over `axis`.
    /// The reduction is local.
    pub fn counts<T: Transport>(
        &self,
        ctx: &mut PartyContext<T>,
        x: &SecretShare,
        axis: usize,
    ) -> Result<SecretShare> {
        let indicator = self.indicator(ctx, x)?;
        indicator.sum_axis(axis)
    }

    /// `[D == 0]` as 0/1 integers at scale 0, elementwise
    pub fn is_zero<T: Transport>(ctx: &mut PartyContext<T>, d: &SecretShare) -> Result<SecretShare> {
        let party = ctx.party();
        let word = match party {
            Party::Zero => d.tensor().clone(),
            Party::One => d.tensor().neg(),
        };
        let mut z = BinaryShare::from_tensor(word).not(party);

        for shift in AND_TREE_SHIFTS {
            let shifted = z.shr(shift);
            z = ctx.beaver_and(&z, &shifted)?;
        }
        let bit = z.and_public(1);
        tracing::debug!(elements = d.len(), rounds = AND_TREE_SHIFTS.len(), "AND tree reduced");

        bit_to_arithmetic(ctx, &bit)
    }
}

/// Convert an XOR-shared bit to an additive share.
///
/// Each party's bit is an additive sharing of itself with a zero on the other
/// side, so `b0 * b1` is one Beaver product.
fn bit_to_arithmetic<T: Transport>(ctx: &mut PartyContext<T>, bit: &BinaryShare) -> Result<SecretShare> {
    let local = SecretShare::from_tensor(bit.tensor().clone(), 0);
    let zeros = SecretShare::from_tensor(privlookup_fixed_point::RingTensor::zeros(bit.shape().to_vec()), 0);
    let product = match ctx.party() {
        Party::Zero => ctx.beaver_mul(&local, &zeros)?,
        Party::One => ctx.beaver_mul(&zeros, &local)?,
    };
    local.sub(&product.mul_scalar(2))
}

#[cfg(test)]
mod tests {
    use privlookup_fixed_point::RingTensor;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::context::testing::*;
    use crate::dealer::TriplePlan;
    use crate::share::SharePair;

    fn shares(values: &[u32], shape: Vec<usize>, seed: u64) -> (SecretShare, SecretShare) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let tensor = RingTensor::from_u32(values, shape).unwrap();
        SharePair::split(&tensor, 0, &mut rng).unwrap().into_shares(Party::Zero)
    }

    fn run_counts(tokens: &[u32], shape: Vec<usize>, vocab: usize) -> RingTensor {
        let (x0, x1) = shares(tokens, shape.clone(), 7);
        let mut plan_shape = shape;
        plan_shape.push(vocab);
        let (ctx0, ctx1) = contexts(&TriplePlan::for_equality(&plan_shape), 20);
        let eq = ObliviousEquality::vocabulary(vocab);
        let eq1 = eq.clone();
        let axis = plan_shape.len() - 2;

        let (r0, r1) = run_pair(
            ctx0,
            ctx1,
            move |ctx| {
                let counts = eq.counts(ctx, &x0, axis).unwrap();
                assert_eq!(ctx.triples_remaining(), 0);
                open_share(ctx, &counts)
            },
            move |ctx| {
                let counts = eq1.counts(ctx, &x1, axis).unwrap();
                open_share(ctx, &counts)
            },
        );
        assert_eq!(r0, r1);
        r0
    }

    #[test]
    fn test_indicator_exact() {
        let (x0, x1) = shares(&[0, 3, 9], vec![3], 1);
        let (ctx0, ctx1) = contexts(&TriplePlan::for_equality(&[3, 10]), 21);
        let eq = ObliviousEquality::vocabulary(10);
        let eq1 = eq.clone();

        let (r0, _) = run_pair(
            ctx0,
            ctx1,
            move |ctx| {
                let e = eq.indicator(ctx, &x0).unwrap();
                assert_eq!(e.shape(), &[3, 10]);
                assert_eq!(ctx.rounds(), 7);
                open_share(ctx, &e)
            },
            move |ctx| {
                let e = eq1.indicator(ctx, &x1).unwrap();
                open_share(ctx, &e)
            },
        );

        let mut expected = vec![0u64; 30];
        expected[0] = 1;
        expected[10 + 3] = 1;
        expected[20 + 9] = 1;
        assert_eq!(r0.data(), expected.as_slice());
    }

    #[test]
    fn test_counts_repeated_tokens() {
        let counts = run_counts(&[2, 2, 5], vec![1, 3], 10);
        assert_eq!(counts.shape(), &[1, 10]);
        assert_eq!(counts.data(), &[0, 0, 2, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_counts_all_equal() {
        let counts = run_counts(&[4; 6], vec![2, 3], 6);
        assert_eq!(counts.data(), &[0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 3, 0]);
    }

    #[test]
    fn test_counts_all_distinct_with_boundaries() {
        let counts = run_counts(&[0, 1, 2, 3, 4, 5, 6, 7], vec![1, 8], 8);
        assert_eq!(counts.data(), &[1; 8]);
    }

    #[test]
    fn test_out_of_vocabulary_counts_nothing() {
        let counts = run_counts(&[8, 0], vec![1, 2], 8);
        assert_eq!(counts.data(), &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_zero_test_extremes() {
        // Differences near the ring boundaries must not alias to zero
        let d = RingTensor::from_raw(vec![0, 1, u64::MAX, 1 << 63, 1 << 32], vec![5]).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let (d0, d1) = SharePair::split(&d, 0, &mut rng).unwrap().into_shares(Party::Zero);
        let (ctx0, ctx1) = contexts(&TriplePlan::for_equality(&[5]), 22);

        let (r0, _) = run_pair(
            ctx0,
            ctx1,
            move |ctx| {
                let z = ObliviousEquality::is_zero(ctx, &d0).unwrap();
                open_share(ctx, &z)
            },
            move |ctx| {
                let z = ObliviousEquality::is_zero(ctx, &d1).unwrap();
                open_share(ctx, &z)
            },
        );
        assert_eq!(r0.data(), &[1, 0, 0, 0, 0]);
    }
}
