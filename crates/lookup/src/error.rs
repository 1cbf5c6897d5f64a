//! Lookup error types
//!
//! Internally every step returns [`LookupError`]. A run surfaces exactly one
//! public failure, [`ProtocolAborted`], carrying the classified reason and
//! the state the run was in.

use std::fmt;

use privlookup_fixed_point::FixedPointError;
use privlookup_protocol::{ErrorCode, ProtocolError};
use privlookup_sharing::SharingError;
use thiserror::Error;

use crate::state::LookupState;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Ring overflow: worst-case accumulation {bound:e} exceeds 2^62")]
    RingOverflow { bound: f64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Peer numeric configuration differs from ours")]
    ConfigMismatch,

    #[error("Triple bundle mismatch: ours is {ours:#018x}, peer holds {theirs:#018x}")]
    BundleMismatch { ours: u64, theirs: u64 },

    #[error("Sharing error: {0}")]
    Sharing(#[from] SharingError),

    #[error("Fixed-point error: {0}")]
    FixedPoint(#[from] FixedPointError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LookupError>;

/// Why a run was aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Message loss, timeout, corruption, desynchronisation or a dropped
    /// connection. `code` is what the peer is told.
    Transport { code: ErrorCode, message: String },
    /// The triple supply ran out
    TripleExhaustion,
    /// A triple id was consumed twice or the parties consumed different triples
    TripleMisuse(String),
    /// Operand, triple or share shapes disagree
    ShapeMismatch(String),
    /// The configuration admits values that would wrap the ring
    RingOverflow,
    /// The parties do not agree on the numeric configuration
    ConfigMismatch,
    /// The local input or configuration is invalid
    InvalidInput(String),
    /// The peer aborted and told us why
    PeerAborted { code: ErrorCode, message: String },
}

impl AbortReason {
    /// Code sent to the peer in the abort frame
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AbortReason::Transport { code, .. } => *code,
            AbortReason::TripleExhaustion => ErrorCode::TripleExhausted,
            AbortReason::TripleMisuse(_) => ErrorCode::TripleMismatch,
            AbortReason::ShapeMismatch(_) => ErrorCode::ShapeMismatch,
            AbortReason::RingOverflow | AbortReason::ConfigMismatch => ErrorCode::ConfigMismatch,
            AbortReason::InvalidInput(_) => ErrorCode::InvalidInput,
            AbortReason::PeerAborted { code, .. } => *code,
        }
    }

    fn transport(code: ErrorCode, err: &impl ToString) -> Self {
        AbortReason::Transport {
            code,
            message: err.to_string(),
        }
    }

    fn from_protocol(err: &ProtocolError) -> Self {
        match err {
            ProtocolError::PeerAborted { code, message } => AbortReason::PeerAborted {
                code: *code,
                message: message.clone(),
            },
            other => AbortReason::transport(other.error_code(), other),
        }
    }
}

impl From<&LookupError> for AbortReason {
    fn from(err: &LookupError) -> Self {
        match err {
            LookupError::InvalidConfig(msg) | LookupError::InvalidInput(msg) => {
                AbortReason::InvalidInput(msg.clone())
            }
            LookupError::RingOverflow { .. } => AbortReason::RingOverflow,
            LookupError::ConfigMismatch => AbortReason::ConfigMismatch,
            LookupError::BundleMismatch { .. } => AbortReason::TripleMisuse(err.to_string()),
            LookupError::Protocol(e) => AbortReason::from_protocol(e),
            LookupError::Io(e) => AbortReason::transport(ErrorCode::Internal, e),
            LookupError::Json(e) => AbortReason::InvalidInput(e.to_string()),
            LookupError::FixedPoint(e) => from_fixed_point(e),
            LookupError::Sharing(e) => match e {
                SharingError::TripleExhausted(_) => AbortReason::TripleExhaustion,
                SharingError::TripleReuse(_) | SharingError::TripleMismatch { .. } => {
                    AbortReason::TripleMisuse(e.to_string())
                }
                SharingError::ShapeMismatch { .. } | SharingError::ScaleMismatch { .. } => {
                    AbortReason::ShapeMismatch(e.to_string())
                }
                SharingError::FixedPoint(fp) => from_fixed_point(fp),
                SharingError::Transport(pe) => AbortReason::from_protocol(pe),
                SharingError::UnexpectedInput { .. } => AbortReason::transport(ErrorCode::UnknownMsgType, e),
                SharingError::Io(_) => AbortReason::transport(ErrorCode::Internal, e),
                SharingError::InvalidRank(_) | SharingError::InvalidBundle(_) | SharingError::BundleSpent(_) => {
                    AbortReason::InvalidInput(e.to_string())
                }
            },
        }
    }
}

fn from_fixed_point(err: &FixedPointError) -> AbortReason {
    match err {
        FixedPointError::ShapeMismatch { .. }
        | FixedPointError::ScaleMismatch { .. }
        | FixedPointError::InvalidAxis { .. } => AbortReason::ShapeMismatch(err.to_string()),
        _ => AbortReason::InvalidInput(err.to_string()),
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Transport { message, .. } => write!(f, "transport failure: {message}"),
            AbortReason::TripleExhaustion => write!(f, "triple supply exhausted"),
            AbortReason::TripleMisuse(msg) => write!(f, "triple misuse: {msg}"),
            AbortReason::ShapeMismatch(msg) => write!(f, "shape mismatch: {msg}"),
            AbortReason::RingOverflow => write!(f, "configuration could overflow the ring"),
            AbortReason::ConfigMismatch => write!(f, "numeric configuration mismatch"),
            AbortReason::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            AbortReason::PeerAborted { code, message } => {
                write!(f, "peer aborted ({code:?}): {message}")
            }
        }
    }
}

/// The single failure a run reports. No partial result accompanies it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Protocol aborted in {stage}: {reason}")]
pub struct ProtocolAborted {
    pub reason: AbortReason,
    pub stage: LookupState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use privlookup_sharing::{TripleId, TripleKind};
    use std::time::Duration;

    #[test]
    fn test_classification() {
        let cases: Vec<(LookupError, AbortReason)> = vec![
            (
                SharingError::TripleExhausted(TripleKind::MatMul).into(),
                AbortReason::TripleExhaustion,
            ),
            (LookupError::ConfigMismatch, AbortReason::ConfigMismatch),
            (
                LookupError::BundleMismatch { ours: 1, theirs: 2 },
                AbortReason::TripleMisuse(
                    "Triple bundle mismatch: ours is 0x0000000000000001, peer holds 0x0000000000000002".into(),
                ),
            ),
            (LookupError::RingOverflow { bound: 1e30 }, AbortReason::RingOverflow),
        ];
        for (err, reason) in cases {
            assert_eq!(AbortReason::from(&err), reason);
        }

        let reuse: LookupError = SharingError::TripleReuse(TripleId(4)).into();
        assert!(matches!(AbortReason::from(&reuse), AbortReason::TripleMisuse(_)));

        let timeout: LookupError =
            SharingError::Transport(ProtocolError::Timeout(Duration::from_secs(1))).into();
        let reason = AbortReason::from(&timeout);
        assert!(matches!(reason, AbortReason::Transport { .. }));
        assert_eq!(reason.error_code(), ErrorCode::Timeout);

        let corrupt: LookupError = ProtocolError::PayloadCrcMismatch { expected: 1, got: 2 }.into();
        assert_eq!(AbortReason::from(&corrupt).error_code(), ErrorCode::BadCrc);

        let skipped: LookupError = ProtocolError::OutOfOrder { expected: 3, got: 4 }.into();
        assert_eq!(AbortReason::from(&skipped).error_code(), ErrorCode::OutOfOrder);
    }

    #[test]
    fn test_peer_abort_keeps_code() {
        let err: LookupError = ProtocolError::PeerAborted {
            code: ErrorCode::TripleExhausted,
            message: "empty".into(),
        }
        .into();
        let reason = AbortReason::from(&err);
        assert_eq!(reason.error_code(), ErrorCode::TripleExhausted);
        assert!(matches!(reason, AbortReason::PeerAborted { .. }));
    }

    #[test]
    fn test_display() {
        let aborted = ProtocolAborted {
            reason: AbortReason::TripleExhaustion,
            stage: LookupState::SecureMultiply,
        };
        assert_eq!(
            aborted.to_string(),
            "Protocol aborted in SECURE_MULTIPLY: triple supply exhausted"
        );
    }
}
