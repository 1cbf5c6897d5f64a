//! Common header (48 bytes)

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{HEADER_LEN, SESSION_ID_LEN};
use crate::error::{ProtocolError, Result};

/// Session identifier (16 bytes)
pub type SessionId = [u8; SESSION_ID_LEN];

/// Generate a fresh random session ID
pub fn generate_session_id() -> SessionId {
    *uuid::Uuid::new_v4().as_bytes()
}

/// Common header structure (48 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Session ID (all-zero before the session is bound)
    pub session_id: SessionId,
    /// Per-direction sequence number, starting at 0
    pub seq: u64,
    /// Rank of the sending party (0 or 1)
    pub sender: u32,
    /// Flags bitfield (v1 uses 0)
    pub flags: u32,
    /// Reserved (must be 0)
    pub reserved: [u8; 16],
}

impl Default for Header {
    fn default() -> Self {
        Self {
            session_id: [0u8; SESSION_ID_LEN],
            seq: 0,
            sender: 0,
            flags: 0,
            reserved: [0u8; 16],
        }
    }
}

impl Header {
    /// Create a new header for the given session, sequence and sender
    pub fn new(session_id: SessionId, seq: u64, sender: u32) -> Self {
        Self {
            session_id,
            seq,
            sender,
            ..Default::default()
        }
    }

    /// Header for frames that are not bound to a session (files at rest)
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Encode the header to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN as usize);
        self.write_to(&mut buf).expect("Vec write should not fail");
        buf
    }

    /// Write the header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.session_id)?;
        writer.write_u64::<LittleEndian>(self.seq)?;
        writer.write_u32::<LittleEndian>(self.sender)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_all(&self.reserved)?;
        Ok(())
    }

    /// Decode a header from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN as usize {
            return Err(ProtocolError::BufferTooShort {
                need: HEADER_LEN as usize,
                have: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);

        let mut session_id = [0u8; SESSION_ID_LEN];
        cursor.read_exact(&mut session_id)?;

        let seq = cursor.read_u64::<LittleEndian>()?;
        let sender = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;

        let mut reserved = [0u8; 16];
        cursor.read_exact(&mut reserved)?;

        Ok(Self {
            session_id,
            seq,
            sender,
            flags,
            reserved,
        })
    }

    /// Check if this header is not yet bound to a session
    pub fn is_unbound(&self) -> bool {
        self.session_id == [0u8; SESSION_ID_LEN]
    }
}
