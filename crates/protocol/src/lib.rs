//! PrivLookup Protocol Crate
//!
//! Wire format and point-to-point transport for the two-party embedding
//! lookup: framing with CRC validation, typed payloads, and a sequenced
//! session channel over any [`Transport`].

mod channel;
mod constants;
mod error;
mod frame;
mod header;
mod messages;
mod transport;

pub use channel::PeerChannel;
pub use constants::*;
pub use error::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{generate_session_id, Header, SessionId};
pub use messages::*;
pub use transport::{MemoryTransport, TcpTransport, Transport};
