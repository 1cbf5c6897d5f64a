//! PrivLookup Embedding Lookup
//!
//! Two mutually distrustful parties compute per-sentence sums of embeddings:
//! one holds the embedding table, the other the tokenized sentences. Neither
//! learns the other's input; both learn the sums.

mod config;
mod error;
mod inputs;
mod protocol;
mod state;

pub use config::{NumericConfig, Role, SessionConfig};
pub use error::{AbortReason, LookupError, ProtocolAborted, Result};
pub use inputs::{EmbeddingTable, RevealedResult, TokenBatch};
pub use protocol::{EmbeddingLookupProtocol, LocalInput, LookupOutput, PhaseTimings};
pub use state::LookupState;
