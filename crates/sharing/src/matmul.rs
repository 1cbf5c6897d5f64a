//! Secure matrix product and the revealable result share

use privlookup_fixed_point::RingTensor;
use privlookup_protocol::Transport;

use crate::context::PartyContext;
use crate::error::Result;
use crate::share::SecretShare;

/// `[A @ B]` with one matrix-shaped Beaver triple and one round.
///
/// The raw product carries the sum of both operand scales. When that exceeds
/// the requested output scale the shares are truncated locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecureMatMul {
    output_frac_bits: Option<u8>,
}

impl SecureMatMul {
    /// Keep the full product scale
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncate the product down to `frac_bits` fractional bits
    pub fn with_output_scale(frac_bits: u8) -> Self {
        Self {
            output_frac_bits: Some(frac_bits),
        }
    }

    pub fn multiply<T: Transport>(
        &self,
        ctx: &mut PartyContext<T>,
        a: &SecretShare,
        b: &SecretShare,
    ) -> Result<ResultShare> {
        let product = ctx.beaver_matmul(a, b)?;
        let product = match self.output_frac_bits {
            Some(target) if product.frac_bits() > target => {
                let excess = product.frac_bits() - target;
                tracing::debug!(excess, "Truncating product shares");
                product.truncate(ctx.party(), excess)?
            }
            _ => product,
        };
        tracing::debug!(shape = ?product.shape(), frac_bits = product.frac_bits(), "Secure matmul done");
        Ok(ResultShare { share: product })
    }
}

/// A share of a value that may be revealed to both parties
#[derive(Debug)]
pub struct ResultShare {
    share: SecretShare,
}

impl ResultShare {
    pub fn shape(&self) -> &[usize] {
        self.share.shape()
    }

    pub fn frac_bits(&self) -> u8 {
        self.share.frac_bits()
    }

    /// Exchange shares with the peer and reconstruct. Both parties must call
    /// this; both obtain the same plaintext.
    pub fn reveal<T: Transport>(self, ctx: &mut PartyContext<T>) -> Result<RingTensor> {
        let value = ctx.reveal(&self.share)?;
        tracing::debug!(shape = ?value.shape(), "Revealed result");
        Ok(value)
    }
}
