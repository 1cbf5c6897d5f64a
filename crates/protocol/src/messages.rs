//! Message payload types

mod abort;
mod opening;
mod session_hello;
mod tensor;

pub use abort::AbortPayload;
pub use opening::OpeningPayload;
pub use session_hello::SessionHelloPayload;
pub use tensor::{InputSharePayload, RevealPayload, WireTensor};

use crate::constants::MsgType;
use crate::error::Result;
use crate::frame::Frame;
use crate::header::Header;

/// Trait for message payloads that can be encoded/decoded
pub trait Payload: Sized {
    /// The message type for this payload
    const MSG_TYPE: MsgType;

    /// Encode the payload to bytes
    fn encode(&self) -> Vec<u8>;

    /// Decode the payload from bytes
    fn decode(data: &[u8]) -> Result<Self>;

    /// Create a frame from this payload and a header
    fn into_frame(self, header: Header) -> Frame {
        Frame::new(Self::MSG_TYPE, header, self.encode())
    }
}
