//! Beaver multiplication
//!
//! For `z = x ∘ y` with a triple `(a, b, c = a ∘ b)`:
//! 1. each party masks its shares: `e_i = x_i - a_i`, `f_i = y_i - b_i`
//! 2. `E = x - a` and `F = y - b` are opened (one round)
//! 3. `z_i = c_i + E ∘ b_i + a_i ∘ F`, and party 0 also adds `E ∘ F`
//!
//! `E` and `F` are blinded by the uniform `a` and `b`, so opening them
//! reveals nothing about `x` or `y`. The binary variant is the same over
//! GF(2) with XOR for addition and AND for multiplication.

use privlookup_fixed_point::RingTensor;
use privlookup_protocol::Transport;

use crate::binary::BinaryShare;
use crate::context::{Combine, PartyContext};
use crate::error::{Result, SharingError};
use crate::share::SecretShare;
use crate::triple::TripleRequest;

impl<T: Transport> PartyContext<T> {
    /// `[x * y]` elementwise; the result scale is the sum of both scales
    pub(crate) fn beaver_mul(&mut self, x: &SecretShare, y: &SecretShare) -> Result<SecretShare> {
        if x.shape() != y.shape() {
            return Err(SharingError::ShapeMismatch {
                expected: x.shape().to_vec(),
                got: y.shape().to_vec(),
            });
        }
        let triple = self.take_triple(&TripleRequest::elementwise(x.shape()))?;
        let masked = [x.tensor().sub(triple.a())?, y.tensor().sub(triple.b())?];
        let opened = self.open(triple.id(), &masked, Combine::Add)?;
        let (e, f) = (&opened[0], &opened[1]);

        let mut z = triple.c().add(&e.mul(triple.b())?)?.add(&triple.a().mul(f)?)?;
        if self.party().is_zero() {
            z = z.add(&e.mul(f)?)?;
        }
        Ok(SecretShare::from_tensor(z, x.frac_bits() + y.frac_bits()))
    }

    /// `[x @ y]` for `x: [m, k]`, `y: [k, n]`
    pub(crate) fn beaver_matmul(&mut self, x: &SecretShare, y: &SecretShare) -> Result<SecretShare> {
        let (m, k, n) = match (x.shape(), y.shape()) {
            (&[m, k], &[k2, n]) if k == k2 => (m, k, n),
            _ => {
                return Err(SharingError::ShapeMismatch {
                    expected: x.shape().to_vec(),
                    got: y.shape().to_vec(),
                })
            }
        };
        let triple = self.take_triple(&TripleRequest::matmul(m, k, n))?;
        let masked = [x.tensor().sub(triple.a())?, y.tensor().sub(triple.b())?];
        let opened = self.open(triple.id(), &masked, Combine::Add)?;
        let (e, f) = (&opened[0], &opened[1]);

        let mut z = triple
            .c()
            .add(&e.matmul(triple.b())?)?
            .add(&triple.a().matmul(f)?)?;
        if self.party().is_zero() {
            z = z.add(&e.matmul(f)?)?;
        }
        Ok(SecretShare::from_tensor(z, x.frac_bits() + y.frac_bits()))
    }

    /// `[x & y]` bitwise on XOR shares
    pub(crate) fn beaver_and(&mut self, x: &BinaryShare, y: &BinaryShare) -> Result<BinaryShare> {
        let triple = self.take_triple(&TripleRequest::binary(x.shape()))?;
        let masked = [x.tensor().xor(triple.a())?, y.tensor().xor(triple.b())?];
        let opened = self.open(triple.id(), &masked, Combine::Xor)?;
        let (e, f) = (&opened[0], &opened[1]);

        let mut z: RingTensor = triple.c().xor(&e.and(triple.b())?)?.xor(&f.and(triple.a())?)?;
        if self.party().is_zero() {
            z = z.xor(&e.and(f)?)?;
        }
        Ok(BinaryShare::from_tensor(z))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::context::testing::*;
    use crate::dealer::TriplePlan;
    use crate::share::{Party, SharePair};

    fn split(value: &RingTensor, frac_bits: u8, seed: u64) -> (SecretShare, SecretShare) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        SharePair::split(value, frac_bits, &mut rng).unwrap().into_shares(Party::Zero)
    }

    fn plan(requests: &[TripleRequest]) -> TriplePlan {
        let mut plan = TriplePlan::new();
        for r in requests {
            plan.push(r.clone());
        }
        plan
    }

    #[test]
    fn test_elementwise_mul() {
        let x = RingTensor::from_raw(vec![3, 5u64.wrapping_neg(), 0, 1 << 40], vec![4]).unwrap();
        let y = RingTensor::from_raw(vec![7, 6, 9, 3], vec![4]).unwrap();
        let expected = x.mul(&y).unwrap();
        let (x0, x1) = split(&x, 0, 1);
        let (y0, y1) = split(&y, 0, 2);

        let (ctx0, ctx1) = contexts(&plan(&[TripleRequest::elementwise(&[4])]), 10);
        let (r0, r1) = run_pair(
            ctx0,
            ctx1,
            move |ctx| {
                let z = ctx.beaver_mul(&x0, &y0).unwrap();
                open_share(ctx, &z)
            },
            move |ctx| {
                let z = ctx.beaver_mul(&x1, &y1).unwrap();
                open_share(ctx, &z)
            },
        );
        assert_eq!(r0, expected);
        assert_eq!(r1, expected);
    }

    #[test]
    fn test_binary_and() {
        let x = RingTensor::from_raw(vec![0xFFFF_0000_FFFF_0000, u64::MAX, 0], vec![3]).unwrap();
        let y = RingTensor::from_raw(vec![0x0F0F_0F0F_0F0F_0F0F, 12345, u64::MAX], vec![3]).unwrap();
        let expected = x.and(&y).unwrap();
        let mask_x = RingTensor::from_raw(vec![11, 22, 33], vec![3]).unwrap();
        let mask_y = RingTensor::from_raw(vec![44, 55, 66], vec![3]).unwrap();
        let x0 = BinaryShare::from_tensor(x.xor(&mask_x).unwrap());
        let x1 = BinaryShare::from_tensor(mask_x);
        let y0 = BinaryShare::from_tensor(y.xor(&mask_y).unwrap());
        let y1 = BinaryShare::from_tensor(mask_y);

        let (ctx0, ctx1) = contexts(&plan(&[TripleRequest::binary(&[3])]), 11);
        let (z0, z1) = run_pair(
            ctx0,
            ctx1,
            move |ctx| ctx.beaver_and(&x0, &y0).unwrap(),
            move |ctx| ctx.beaver_and(&x1, &y1).unwrap(),
        );
        assert_eq!(z0.xor(&z1).unwrap().tensor(), &expected);
    }

    #[test]
    fn test_matmul_consumes_one_round() {
        let a = RingTensor::from_u32(&[1, 2, 3, 4, 5, 6], vec![2, 3]).unwrap();
        let b = RingTensor::from_u32(&[1, 0, 0, 1, 2, 2], vec![3, 2]).unwrap();
        let expected = a.matmul(&b).unwrap();
        let (a0, a1) = split(&a, 0, 3);
        let (b0, b1) = split(&b, 0, 4);

        let (ctx0, ctx1) = contexts(&plan(&[TripleRequest::matmul(2, 3, 2)]), 12);
        let (r0, r1) = run_pair(
            ctx0,
            ctx1,
            move |ctx| {
                let z = ctx.beaver_matmul(&a0, &b0).unwrap();
                assert_eq!(ctx.rounds(), 1);
                open_share(ctx, &z)
            },
            move |ctx| {
                let z = ctx.beaver_matmul(&a1, &b1).unwrap();
                open_share(ctx, &z)
            },
        );
        assert_eq!(r0, expected);
        assert_eq!(r1, expected);
    }

    #[test]
    fn test_exhausted_supply() {
        let (x0, _) = split(&RingTensor::zeros(vec![2]), 0, 5);
        let (mut ctx0, _ctx1) = contexts(&TriplePlan::new(), 13);
        assert!(matches!(
            ctx0.beaver_mul(&x0, &x0),
            Err(SharingError::TripleExhausted(_))
        ));
    }
}
