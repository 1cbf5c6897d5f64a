//! Secret sharing error types

use privlookup_protocol::ProtocolError;
use thiserror::Error;

use crate::triple::{TripleId, TripleKind};

#[derive(Error, Debug)]
pub enum SharingError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Scale mismatch: expected {expected}, got {got}")]
    ScaleMismatch { expected: u8, got: u8 },

    #[error("Triple supply exhausted while requesting a {0:?} triple")]
    TripleExhausted(TripleKind),

    #[error("Triple {0} was already consumed")]
    TripleReuse(TripleId),

    #[error("Triple mismatch: we consumed {ours}, peer consumed {theirs}")]
    TripleMismatch { ours: TripleId, theirs: TripleId },

    #[error("Unexpected input share: expected label {expected}, got {got}")]
    UnexpectedInput { expected: u32, got: u32 },

    #[error("Invalid party rank: {0}")]
    InvalidRank(u32),

    #[error("Triple bundle {0} was already loaded")]
    BundleSpent(String),

    #[error("Invalid triple bundle: {0}")]
    InvalidBundle(String),

    #[error("Fixed-point error: {0}")]
    FixedPoint(#[from] privlookup_fixed_point::FixedPointError),

    #[error("Transport error: {0}")]
    Transport(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SharingError>;
