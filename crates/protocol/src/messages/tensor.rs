//! INPUT_SHARE and REVEAL payloads, both carrying one tensor of ring elements

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::constants::MsgType;
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// A shaped vector of ring elements on the wire
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WireTensor {
    pub shape: Vec<usize>,
    pub data: Vec<u64>,
}

impl WireTensor {
    pub fn new(shape: Vec<usize>, data: Vec<u64>) -> Self {
        Self { shape, data }
    }

    fn encoded_len(&self) -> usize {
        2 + 8 * self.shape.len() + 8 + 8 * self.data.len()
    }

    /// Append this tensor to `buf`
    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.write_u16::<LittleEndian>(self.shape.len() as u16).unwrap();
        for &dim in &self.shape {
            buf.write_u64::<LittleEndian>(dim as u64).unwrap();
        }
        buf.write_u64::<LittleEndian>(self.data.len() as u64).unwrap();
        for &x in &self.data {
            buf.write_u64::<LittleEndian>(x).unwrap();
        }
    }

    /// Read one tensor from the cursor, checking lengths against the buffer
    pub fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let rank = cursor.read_u16::<LittleEndian>()? as usize;
        if remaining(cursor) < rank * 8 + 8 {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut shape = Vec::with_capacity(rank);
        for _ in 0..rank {
            shape.push(cursor.read_u64::<LittleEndian>()? as usize);
        }

        let len = cursor.read_u64::<LittleEndian>()? as usize;
        let expected: usize = shape.iter().product();
        if len != expected || remaining(cursor) / 8 < len {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(cursor.read_u64::<LittleEndian>()?);
        }

        Ok(Self { shape, data })
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

/// INPUT_SHARE payload: the peer's share of a private input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSharePayload {
    /// Which input this share belongs to (assigned by the caller)
    pub label: u32,
    /// Fixed-point fractional bits of the encoded input
    pub frac_bits: u8,
    pub tensor: WireTensor,
}

impl Payload for InputSharePayload {
    const MSG_TYPE: MsgType = MsgType::InputShare;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.tensor.encoded_len());
        buf.write_u32::<LittleEndian>(self.label).unwrap();
        buf.write_u8(self.frac_bits).unwrap();
        buf.extend_from_slice(&[0u8; 3]); // reserved
        self.tensor.write_into(&mut buf);
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut cursor = Cursor::new(data);
        let label = cursor.read_u32::<LittleEndian>()?;
        let frac_bits = cursor.read_u8()?;
        cursor.set_position(8);
        let tensor = WireTensor::read_from(&mut cursor)?;
        Ok(Self {
            label,
            frac_bits,
            tensor,
        })
    }
}

/// REVEAL payload: a party's share of the final result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealPayload {
    pub frac_bits: u8,
    pub tensor: WireTensor,
}

impl Payload for RevealPayload {
    const MSG_TYPE: MsgType = MsgType::Reveal;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.tensor.encoded_len());
        buf.write_u8(self.frac_bits).unwrap();
        buf.extend_from_slice(&[0u8; 3]); // reserved
        self.tensor.write_into(&mut buf);
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut cursor = Cursor::new(data);
        let frac_bits = cursor.read_u8()?;
        cursor.set_position(4);
        let tensor = WireTensor::read_from(&mut cursor)?;
        Ok(Self { frac_bits, tensor })
    }
}
