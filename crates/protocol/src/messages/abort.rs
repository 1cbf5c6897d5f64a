//! ABORT message payload

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{ErrorCode, MsgType};
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// ABORT payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortPayload {
    pub err_code: u32,
    /// Human-readable reason
    pub message: String,
}

impl AbortPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            err_code: code.to_u32(),
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_u32(self.err_code).unwrap_or(ErrorCode::Internal)
    }
}

impl Payload for AbortPayload {
    const MSG_TYPE: MsgType = MsgType::Abort;

    fn encode(&self) -> Vec<u8> {
        let msg_bytes = self.message.as_bytes();
        let msg_len = msg_bytes.len().min(u16::MAX as usize);
        let mut buf = Vec::with_capacity(8 + msg_len);

        buf.write_u32::<LittleEndian>(self.err_code).unwrap();
        buf.write_u16::<LittleEndian>(msg_len as u16).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // reserved
        buf.write_all(&msg_bytes[..msg_len]).unwrap();

        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(ProtocolError::InvalidPayloadLength);
        }

        let mut cursor = Cursor::new(data);
        let err_code = cursor.read_u32::<LittleEndian>()?;
        let message_len = cursor.read_u16::<LittleEndian>()? as usize;
        let _reserved = cursor.read_u16::<LittleEndian>()?;

        if data.len() < 8 + message_len {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut msg_bytes = vec![0u8; message_len];
        cursor.read_exact(&mut msg_bytes)?;

        Ok(Self {
            err_code,
            message: String::from_utf8_lossy(&msg_bytes).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_roundtrip() {
        let payload = AbortPayload::new(ErrorCode::TripleExhausted, "no triples left");
        let decoded = AbortPayload::decode(&payload.encode()).unwrap();
        assert_eq!(payload, decoded);
        assert_eq!(decoded.error_code(), ErrorCode::TripleExhausted);
    }

    #[test]
    fn test_unknown_code_maps_to_internal() {
        let payload = AbortPayload {
            err_code: 0xDEAD,
            message: String::new(),
        };
        assert_eq!(payload.error_code(), ErrorCode::Internal);
    }
}
