//! Protocol constants

/// Protocol magic bytes: "PLKP"
pub const MAGIC: [u8; 4] = [0x50, 0x4C, 0x4B, 0x50];

/// Protocol version (v1)
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// Fixed header length in bytes (v1)
pub const HEADER_LEN: u16 = 48;

/// Session ID length in bytes
pub const SESSION_ID_LEN: usize = 16;

/// Largest payload the 32-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Bytes before the header: magic, version, type, lengths and CRCs
pub const PREAMBLE_LEN: usize = 22;

/// Upper bound on a single encoded frame, guards length prefixes read off the wire
pub const MAX_FRAME_LEN: usize = PREAMBLE_LEN + HEADER_LEN as usize + MAX_PAYLOAD_LEN;

/// Message type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MsgType {
    /// Numeric configuration and session binding (both directions, first message)
    SessionHello = 0x0001,
    /// Foreign share of a private input (owner → peer)
    InputShare = 0x0010,
    /// Masked values opened during a Beaver step (both directions)
    Opening = 0x0011,
    /// Share of the final result (both directions)
    Reveal = 0x0012,
    /// Pre-dealt correlated randomness for one party (dealer → party, at rest)
    TripleBundle = 0x0020,
    /// Run aborted by the sender
    Abort = 0x00F0,
}

impl MsgType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(MsgType::SessionHello),
            0x0010 => Some(MsgType::InputShare),
            0x0011 => Some(MsgType::Opening),
            0x0012 => Some(MsgType::Reveal),
            0x0020 => Some(MsgType::TripleBundle),
            0x00F0 => Some(MsgType::Abort),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Abort codes carried in an ABORT frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    BadVersion = 0x00000001,
    BadCrc = 0x00000002,
    UnknownMsgType = 0x00000003,
    SessionMismatch = 0x00000004,
    OutOfOrder = 0x00000005,
    ConfigMismatch = 0x00000006,
    TripleMismatch = 0x00000007,
    TripleExhausted = 0x00000008,
    ShapeMismatch = 0x00000009,
    InvalidInput = 0x0000000A,
    Timeout = 0x0000000B,
    Internal = 0x0000000C,
}

impl ErrorCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x00000001 => Some(ErrorCode::BadVersion),
            0x00000002 => Some(ErrorCode::BadCrc),
            0x00000003 => Some(ErrorCode::UnknownMsgType),
            0x00000004 => Some(ErrorCode::SessionMismatch),
            0x00000005 => Some(ErrorCode::OutOfOrder),
            0x00000006 => Some(ErrorCode::ConfigMismatch),
            0x00000007 => Some(ErrorCode::TripleMismatch),
            0x00000008 => Some(ErrorCode::TripleExhausted),
            0x00000009 => Some(ErrorCode::ShapeMismatch),
            0x0000000A => Some(ErrorCode::InvalidInput),
            0x0000000B => Some(ErrorCode::Timeout),
            0x0000000C => Some(ErrorCode::Internal),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }
}
