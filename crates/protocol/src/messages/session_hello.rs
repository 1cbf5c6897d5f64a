//! SESSION_HELLO payload: the numeric configuration each party runs with

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::constants::MsgType;
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// Encoded size in bytes
const HELLO_LEN: usize = 40;

/// SESSION_HELLO payload.
///
/// Both parties send one before any share crosses the wire; a run only
/// proceeds when the two payloads agree on every numeric field.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHelloPayload {
    /// Rank of the sender (0 = embedding owner, 1 = sentence owner)
    pub rank: u8,
    /// Ring bit-width
    pub ring_bits: u8,
    /// Fixed-point fractional bits
    pub frac_bits: u8,
    pub vocab_size: u32,
    pub num_dimensions: u32,
    pub words_per_sample: u32,
    pub samples_per_batch: u32,
    /// Declared bound on embedding magnitudes
    pub max_abs_embedding: f64,
    /// Dealer-chosen id of the triple bundle the sender draws from
    pub bundle_id: u64,
}

impl SessionHelloPayload {
    /// True when every numeric field matches. The rank is expected to
    /// differ; the bundle id is compared separately.
    pub fn agrees_with(&self, other: &Self) -> bool {
        self.ring_bits == other.ring_bits
            && self.frac_bits == other.frac_bits
            && self.vocab_size == other.vocab_size
            && self.num_dimensions == other.num_dimensions
            && self.words_per_sample == other.words_per_sample
            && self.samples_per_batch == other.samples_per_batch
            && self.max_abs_embedding.to_bits() == other.max_abs_embedding.to_bits()
    }
}

impl Payload for SessionHelloPayload {
    const MSG_TYPE: MsgType = MsgType::SessionHello;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HELLO_LEN);
        buf.write_u8(self.rank).unwrap();
        buf.write_u8(self.ring_bits).unwrap();
        buf.write_u8(self.frac_bits).unwrap();
        buf.write_u8(0).unwrap(); // reserved
        buf.write_u32::<LittleEndian>(self.vocab_size).unwrap();
        buf.write_u32::<LittleEndian>(self.num_dimensions).unwrap();
        buf.write_u32::<LittleEndian>(self.words_per_sample).unwrap();
        buf.write_u32::<LittleEndian>(self.samples_per_batch).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap(); // reserved
        buf.write_f64::<LittleEndian>(self.max_abs_embedding).unwrap();
        buf.write_u64::<LittleEndian>(self.bundle_id).unwrap();
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != HELLO_LEN {
            return Err(ProtocolError::InvalidPayloadLength);
        }
        let mut cursor = Cursor::new(data);
        let rank = cursor.read_u8()?;
        let ring_bits = cursor.read_u8()?;
        let frac_bits = cursor.read_u8()?;
        let _reserved = cursor.read_u8()?;
        let vocab_size = cursor.read_u32::<LittleEndian>()?;
        let num_dimensions = cursor.read_u32::<LittleEndian>()?;
        let words_per_sample = cursor.read_u32::<LittleEndian>()?;
        let samples_per_batch = cursor.read_u32::<LittleEndian>()?;
        let _reserved2 = cursor.read_u32::<LittleEndian>()?;
        let max_abs_embedding = cursor.read_f64::<LittleEndian>()?;
        let bundle_id = cursor.read_u64::<LittleEndian>()?;

        Ok(Self {
            rank,
            ring_bits,
            frac_bits,
            vocab_size,
            num_dimensions,
            words_per_sample,
            samples_per_batch,
            max_abs_embedding,
            bundle_id,
        })
    }
}
