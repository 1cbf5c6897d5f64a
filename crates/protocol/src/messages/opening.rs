//! OPENING payload: masked values exchanged in one Beaver round

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::constants::MsgType;
use crate::error::{ProtocolError, Result};
use crate::messages::{Payload, WireTensor};

/// One party's contribution to an opening.
///
/// `triple_id` names the correlated randomness the masks were drawn from;
/// both parties must be consuming the same triple in the same round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningPayload {
    pub triple_id: u64,
    pub values: Vec<WireTensor>,
}

impl OpeningPayload {
    pub fn new(triple_id: u64, values: Vec<WireTensor>) -> Self {
        Self { triple_id, values }
    }
}

impl Payload for OpeningPayload {
    const MSG_TYPE: MsgType = MsgType::Opening;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(self.triple_id).unwrap();
        buf.write_u16::<LittleEndian>(self.values.len() as u16).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // reserved
        for value in &self.values {
            value.write_into(&mut buf);
        }
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut cursor = Cursor::new(data);
        let triple_id = cursor.read_u64::<LittleEndian>()?;
        let count = cursor.read_u16::<LittleEndian>()? as usize;
        let _reserved = cursor.read_u16::<LittleEndian>()?;

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(WireTensor::read_from(&mut cursor)?);
        }
        if cursor.position() as usize != data.len() {
            return Err(ProtocolError::InvalidPayloadLength);
        }

        Ok(Self { triple_id, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_roundtrip() {
        let payload = OpeningPayload::new(
            17,
            vec![
                WireTensor::new(vec![2, 2], vec![1, 2, 3, 4]),
                WireTensor::new(vec![2, 1], vec![5, 6]),
            ],
        );
        let decoded = OpeningPayload::decode(&payload.encode()).unwrap();
        assert_eq!(payload, decoded);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut encoded = OpeningPayload::new(1, vec![WireTensor::new(vec![1], vec![1])]).encode();
        encoded.push(0);
        assert!(OpeningPayload::decode(&encoded).is_err());
    }
}
