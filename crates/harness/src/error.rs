//! Harness error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Lookup error: {0}")]
    Lookup(#[from] privlookup_lookup::LookupError),

    #[error("{0}")]
    Aborted(#[from] privlookup_lookup::ProtocolAborted),

    #[error("Sharing error: {0}")]
    Sharing(#[from] privlookup_sharing::SharingError),

    #[error("Verification failed: {message}")]
    VerificationFailed { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Party {0} panicked")]
    PartyPanicked(u32),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
