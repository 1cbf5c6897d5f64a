//! Frame encoding/decoding
//!
//! Layout (little endian):
//! `magic(4) | version(2) | msg_type(2) | header_len(2) | payload_len(4) |
//! header_crc(4) | payload_crc(4) | header(48) | payload`

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{MsgType, HEADER_LEN, MAGIC, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, PREAMBLE_LEN, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};
use crate::header::Header;

/// A complete wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MsgType,
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: MsgType, header: Header, payload: Vec<u8>) -> Self {
        Self {
            msg_type,
            header,
            payload,
        }
    }

    /// Fail with `FrameTooLarge` if the payload overflows the length field
    pub fn check_len(&self) -> Result<()> {
        check_payload_len(self.payload.len())
    }

    /// Encode the frame to bytes. Callers sending over a wire check
    /// [`Frame::check_len`] first; the payload length is stored in 32 bits.
    pub fn encode(&self) -> Vec<u8> {
        let header_bytes = self.header.encode();
        let mut buf = Vec::with_capacity(self.encoded_size());

        buf.write_all(&MAGIC).unwrap();
        buf.write_u16::<LittleEndian>(PROTOCOL_VERSION).unwrap();
        buf.write_u16::<LittleEndian>(self.msg_type.to_u16()).unwrap();
        buf.write_u16::<LittleEndian>(HEADER_LEN).unwrap();
        buf.write_u32::<LittleEndian>(self.payload.len() as u32).unwrap();
        buf.write_u32::<LittleEndian>(crc32fast::hash(&header_bytes)).unwrap();
        buf.write_u32::<LittleEndian>(crc32fast::hash(&self.payload)).unwrap();
        buf.write_all(&header_bytes).unwrap();
        buf.write_all(&self.payload).unwrap();

        buf
    }

    /// Decode a frame from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < PREAMBLE_LEN {
            return Err(ProtocolError::BufferTooShort {
                need: PREAMBLE_LEN,
                have: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        let version = cursor.read_u16::<LittleEndian>()?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        let msg_type_raw = cursor.read_u16::<LittleEndian>()?;
        let msg_type =
            MsgType::from_u16(msg_type_raw).ok_or(ProtocolError::UnknownMessageType(msg_type_raw))?;

        let header_len = cursor.read_u16::<LittleEndian>()?;
        if header_len != HEADER_LEN {
            return Err(ProtocolError::InvalidHeaderLength {
                expected: HEADER_LEN,
                got: header_len,
            });
        }

        let payload_len = cursor.read_u32::<LittleEndian>()? as usize;
        let expected_header_crc = cursor.read_u32::<LittleEndian>()?;
        let expected_payload_crc = cursor.read_u32::<LittleEndian>()?;

        let total_needed = PREAMBLE_LEN + header_len as usize + payload_len;
        if data.len() < total_needed {
            return Err(ProtocolError::BufferTooShort {
                need: total_needed,
                have: data.len(),
            });
        }

        let header_end = PREAMBLE_LEN + header_len as usize;
        let header_bytes = &data[PREAMBLE_LEN..header_end];
        let actual_header_crc = crc32fast::hash(header_bytes);
        if actual_header_crc != expected_header_crc {
            return Err(ProtocolError::HeaderCrcMismatch {
                expected: expected_header_crc,
                got: actual_header_crc,
            });
        }
        let header = Header::decode(header_bytes)?;

        let payload = &data[header_end..header_end + payload_len];
        let actual_payload_crc = crc32fast::hash(payload);
        if actual_payload_crc != expected_payload_crc {
            return Err(ProtocolError::PayloadCrcMismatch {
                expected: expected_payload_crc,
                got: actual_payload_crc,
            });
        }

        Ok(Self {
            msg_type,
            header,
            payload: payload.to_vec(),
        })
    }

    /// Total encoded size of this frame
    pub fn encoded_size(&self) -> usize {
        PREAMBLE_LEN + HEADER_LEN as usize + self.payload.len()
    }

    /// Write the frame to a byte stream, prefixed with its encoded length
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.check_len()?;
        let bytes = self.encode();
        writer.write_u64::<LittleEndian>(bytes.len() as u64)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one length-prefixed frame from a byte stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let len = reader.read_u64::<LittleEndian>()? as usize;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge { len });
        }
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes)?;
        Self::decode(&bytes)
    }
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: PREAMBLE_LEN + HEADER_LEN as usize + len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opening_frame(payload: Vec<u8>) -> Frame {
        Frame::new(MsgType::Opening, Header::new([0x11; 16], 42, 1), payload)
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = opening_frame(vec![1, 2, 3, 4, 5]);
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_frame_empty_payload() {
        let frame = Frame::new(MsgType::SessionHello, Header::unbound(), vec![]);
        let encoded = frame.encode();
        assert_eq!(encoded.len(), frame.encoded_size());

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.msg_type, MsgType::SessionHello);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_invalid_magic() {
        let mut encoded = opening_frame(vec![]).encode();
        encoded[0] = 0xFF;
        assert!(matches!(Frame::decode(&encoded), Err(ProtocolError::InvalidMagic)));
    }

    #[test]
    fn test_version_mismatch() {
        let mut encoded = opening_frame(vec![]).encode();
        encoded[4] = 0x7F;
        assert!(matches!(
            Frame::decode(&encoded),
            Err(ProtocolError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_message_type() {
        let mut encoded = opening_frame(vec![]).encode();
        encoded[6] = 0xEE;
        encoded[7] = 0xEE;
        assert!(matches!(
            Frame::decode(&encoded),
            Err(ProtocolError::UnknownMessageType(0xEEEE))
        ));
    }

    #[test]
    fn test_header_crc_mismatch() {
        let mut encoded = opening_frame(vec![]).encode();
        // Flip a bit in the session id
        encoded[PREAMBLE_LEN] ^= 0x01;
        assert!(matches!(
            Frame::decode(&encoded),
            Err(ProtocolError::HeaderCrcMismatch { .. })
        ));
    }

    #[test]
    fn test_payload_crc_mismatch() {
        let mut encoded = opening_frame(vec![1, 2, 3]).encode();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(matches!(
            Frame::decode(&encoded),
            Err(ProtocolError::PayloadCrcMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_frame() {
        let encoded = opening_frame(vec![9; 32]).encode();
        let result = Frame::decode(&encoded[..encoded.len() - 4]);
        assert!(matches!(result, Err(ProtocolError::BufferTooShort { .. })));
    }

    #[test]
    fn test_stream_roundtrip() {
        let first = opening_frame(vec![7; 10]);
        let second = Frame::new(MsgType::Reveal, Header::new([0x22; 16], 0, 0), vec![8; 3]);

        let mut buf = Vec::new();
        first.write_to(&mut buf).unwrap();
        second.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(Frame::read_from(&mut cursor).unwrap(), first);
        assert_eq!(Frame::read_from(&mut cursor).unwrap(), second);
    }

    #[test]
    fn test_payload_over_length_field_rejected() {
        check_payload_len(MAX_PAYLOAD_LEN).unwrap();
        assert!(matches!(
            check_payload_len(MAX_PAYLOAD_LEN + 1),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
        opening_frame(vec![0; 16]).check_len().unwrap();
    }

    #[test]
    fn test_oversize_length_prefix_rejected() {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(MAX_FRAME_LEN as u64 + 1).unwrap();
        assert!(matches!(
            Frame::read_from(&mut Cursor::new(buf)),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
