//! Run state machine
//!
//! `Init -> ShareInputs -> BuildCountVector -> SecureMultiply -> Reveal -> Done`,
//! with `Aborted` reachable from every non-terminal state.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupState {
    /// Validating configuration and binding the session
    Init,
    /// Exchanging shares of the token batch and the embedding table
    ShareInputs,
    /// Oblivious equality and the local reduction to word counts
    BuildCountVector,
    /// `counts @ embeddings` with one matrix triple
    SecureMultiply,
    /// Swapping final shares
    Reveal,
    Done,
    Aborted,
}

impl LookupState {
    /// The state a successful step leads to
    pub fn next(self) -> Option<Self> {
        match self {
            LookupState::Init => Some(LookupState::ShareInputs),
            LookupState::ShareInputs => Some(LookupState::BuildCountVector),
            LookupState::BuildCountVector => Some(LookupState::SecureMultiply),
            LookupState::SecureMultiply => Some(LookupState::Reveal),
            LookupState::Reveal => Some(LookupState::Done),
            LookupState::Done | LookupState::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LookupState::Done | LookupState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LookupState::Init => "INIT",
            LookupState::ShareInputs => "SHARE_INPUTS",
            LookupState::BuildCountVector => "BUILD_COUNT_VECTOR",
            LookupState::SecureMultiply => "SECURE_MULTIPLY",
            LookupState::Reveal => "REVEAL",
            LookupState::Done => "DONE",
            LookupState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for LookupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
