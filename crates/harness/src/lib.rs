//! PrivLookup Test Harness
//!
//! Plaintext reference computation and an in-process runner that drives
//! both parties on two threads, for validating that the secure lookup
//! produces the same sums as the cleartext one.

mod error;
mod pipeline;
mod plaintext;

pub use error::{HarnessError, Result};
pub use pipeline::{short_supply, InProcessRunner, PartyResults, PartySetup, RunReport};
pub use plaintext::{PlaintextLookup, VERIFY_TOLERANCE};
