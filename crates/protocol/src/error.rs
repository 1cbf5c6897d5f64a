//! Protocol error types

use std::time::Duration;

use thiserror::Error;

use crate::constants::{ErrorCode, MsgType};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u16, got: u16 },

    #[error("Unknown message type: 0x{0:04X}")]
    UnknownMessageType(u16),

    #[error("Invalid header length: expected {expected}, got {got}")]
    InvalidHeaderLength { expected: u16, got: u16 },

    #[error("Header CRC mismatch: expected 0x{expected:08X}, got 0x{got:08X}")]
    HeaderCrcMismatch { expected: u32, got: u32 },

    #[error("Payload CRC mismatch: expected 0x{expected:08X}, got 0x{got:08X}")]
    PayloadCrcMismatch { expected: u32, got: u32 },

    #[error("Buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },

    #[error("Invalid payload length for message type")]
    InvalidPayloadLength,

    #[error("Frame too large: {len} bytes")]
    FrameTooLarge { len: usize },

    #[error("Session mismatch: frame belongs to another session")]
    SessionMismatch,

    #[error("Session not established")]
    SessionNotEstablished,

    #[error("Out-of-order frame: expected sequence {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Unexpected message: expected {expected:?}, got {got:?}")]
    UnexpectedMessage { expected: MsgType, got: MsgType },

    #[error("Peer aborted the run: {code:?} - {message}")]
    PeerAborted { code: ErrorCode, message: String },

    #[error("Timed out after {0:?} waiting for peer")]
    Timeout(Duration),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Abort code reported to the peer for this failure
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtocolError::VersionMismatch { .. } => ErrorCode::BadVersion,
            ProtocolError::HeaderCrcMismatch { .. } | ProtocolError::PayloadCrcMismatch { .. } => {
                ErrorCode::BadCrc
            }
            ProtocolError::UnknownMessageType(_) | ProtocolError::UnexpectedMessage { .. } => {
                ErrorCode::UnknownMsgType
            }
            ProtocolError::SessionMismatch | ProtocolError::SessionNotEstablished => {
                ErrorCode::SessionMismatch
            }
            ProtocolError::OutOfOrder { .. } => ErrorCode::OutOfOrder,
            ProtocolError::Timeout(_) => ErrorCode::Timeout,
            ProtocolError::PeerAborted { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
