//! PrivLookup Secret Sharing
//!
//! Two-party additive secret sharing over Z_2^64 and the protocols built on
//! it: Beaver multiplication, oblivious equality against public ids, and
//! secure matrix products.
//!
//! Party 0 and party 1 each hold one share: `X = X_0 + X_1 (mod 2^64)`.
//! Only [`ResultShare`] can be revealed.

mod beaver;
mod binary;
mod context;
mod dealer;
mod equality;
mod error;
mod matmul;
mod share;
mod triple;

pub use context::PartyContext;
pub use dealer::{TriplePlan, TripleSource, TripleStore, TrustedDealer};
pub use equality::ObliviousEquality;
pub use error::{Result, SharingError};
pub use matmul::{ResultShare, SecureMatMul};
pub use share::{Party, SecretShare, SharePair};
pub use triple::{TripleId, TripleKind, TripleRequest, TripleShare};
