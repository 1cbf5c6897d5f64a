//! Session and numeric configuration

use std::path::Path;
use std::time::Duration;

use privlookup_fixed_point::{FixedPointEncoder, MAX_FRAC_BITS, RING_BITS};
use privlookup_protocol::SessionHelloPayload;
use privlookup_sharing::Party;
use serde::{Deserialize, Serialize};

use crate::error::{LookupError, Result};

/// Largest accumulated magnitude a share sum may reach
const OVERFLOW_LIMIT: f64 = (1u64 << 62) as f64;

/// Which private input this process holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Rank 0, holds the embedding table
    EmbeddingOwner,
    /// Rank 1, holds the token batch
    SentenceOwner,
}

impl Role {
    pub fn from_rank(rank: u32) -> Option<Self> {
        Party::from_rank(rank).map(Self::from_party)
    }

    pub fn from_party(party: Party) -> Self {
        match party {
            Party::Zero => Role::EmbeddingOwner,
            Party::One => Role::SentenceOwner,
        }
    }

    pub fn party(self) -> Party {
        match self {
            Role::EmbeddingOwner => Party::Zero,
            Role::SentenceOwner => Party::One,
        }
    }

    pub fn rank(self) -> u32 {
        self.party().rank()
    }
}

/// Numeric parameters both parties must agree on before a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericConfig {
    /// Ring bit width (only 64 is supported)
    pub ring_bits: u8,
    /// Fixed-point fractional bits of the embedding table
    pub frac_bits: u8,
    pub vocab_size: usize,
    pub num_dimensions: usize,
    pub words_per_sample: usize,
    pub samples_per_batch: usize,
    /// Largest embedding magnitude the table owner may supply
    pub max_abs_embedding: f64,
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            ring_bits: RING_BITS as u8,
            frac_bits: 16,
            vocab_size: 519_820,
            num_dimensions: 32,
            words_per_sample: 16,
            samples_per_batch: 32,
            max_abs_embedding: 8.0,
        }
    }
}

impl NumericConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Override fields from `PRIVLOOKUP_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PRIVLOOKUP_FRAC_BITS") {
            if let Ok(v) = v.parse() {
                self.frac_bits = v;
            }
        }

        if let Ok(v) = std::env::var("PRIVLOOKUP_VOCAB_SIZE") {
            if let Ok(v) = v.parse() {
                self.vocab_size = v;
            }
        }

        if let Ok(v) = std::env::var("PRIVLOOKUP_DIMENSIONS") {
            if let Ok(v) = v.parse() {
                self.num_dimensions = v;
            }
        }

        if let Ok(v) = std::env::var("PRIVLOOKUP_WORDS_PER_SAMPLE") {
            if let Ok(v) = v.parse() {
                self.words_per_sample = v;
            }
        }

        if let Ok(v) = std::env::var("PRIVLOOKUP_SAMPLES_PER_BATCH") {
            if let Ok(v) = v.parse() {
                self.samples_per_batch = v;
            }
        }
    }

    /// Check that a run with this configuration cannot silently wrap the ring
    pub fn validate(&self) -> Result<()> {
        if self.ring_bits as u32 != RING_BITS {
            return Err(LookupError::InvalidConfig(format!(
                "ring_bits must be {RING_BITS}, got {}",
                self.ring_bits
            )));
        }
        if self.frac_bits > MAX_FRAC_BITS {
            return Err(LookupError::InvalidConfig(format!(
                "frac_bits must be at most {MAX_FRAC_BITS}, got {}",
                self.frac_bits
            )));
        }
        let dims = [
            ("vocab_size", self.vocab_size),
            ("num_dimensions", self.num_dimensions),
            ("words_per_sample", self.words_per_sample),
            ("samples_per_batch", self.samples_per_batch),
        ];
        for (name, value) in dims {
            if value == 0 {
                return Err(LookupError::InvalidConfig(format!("{name} must be non-zero")));
            }
            if value > u32::MAX as usize {
                return Err(LookupError::InvalidConfig(format!("{name} must fit in 32 bits")));
            }
        }
        if !self.max_abs_embedding.is_finite() || self.max_abs_embedding <= 0.0 {
            return Err(LookupError::InvalidConfig(
                "max_abs_embedding must be positive and finite".into(),
            ));
        }

        // A sentence sums at most `words_per_sample` rows, so no output
        // coordinate exceeds words * max|e| * 2^f in ring units.
        let bound = self.words_per_sample as f64 * self.max_abs_embedding * self.encoder()?.scale_factor();
        if bound >= OVERFLOW_LIMIT {
            return Err(LookupError::RingOverflow { bound });
        }
        Ok(())
    }

    pub fn encoder(&self) -> Result<FixedPointEncoder> {
        Ok(FixedPointEncoder::new(self.frac_bits)?)
    }

    /// Shape of the token batch: `[samples, words]`
    pub fn token_shape(&self) -> Vec<usize> {
        vec![self.samples_per_batch, self.words_per_sample]
    }

    /// Shape of the embedding table: `[vocab, dims]`
    pub fn table_shape(&self) -> Vec<usize> {
        vec![self.vocab_size, self.num_dimensions]
    }

    /// Shape of the revealed result: `[samples, dims]`
    pub fn result_shape(&self) -> Vec<usize> {
        vec![self.samples_per_batch, self.num_dimensions]
    }

    /// The hello this party sends when binding a session, drawing triples
    /// from bundle `bundle_id`
    pub fn hello(&self, role: Role, bundle_id: u64) -> SessionHelloPayload {
        SessionHelloPayload {
            rank: role.rank() as u8,
            ring_bits: self.ring_bits,
            frac_bits: self.frac_bits,
            vocab_size: self.vocab_size as u32,
            num_dimensions: self.num_dimensions as u32,
            words_per_sample: self.words_per_sample as u32,
            samples_per_batch: self.samples_per_batch as u32,
            max_abs_embedding: self.max_abs_embedding,
            bundle_id,
        }
    }
}

/// Everything one party needs to join a run
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub role: Role,
    /// Rank 0 listens on this address, rank 1 connects to it
    pub peer_address: String,
    pub peer_port: u16,
    /// How long to wait for any single peer message
    pub receive_timeout: Duration,
    pub numeric: NumericConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: Role::EmbeddingOwner,
            peer_address: "127.0.0.1".to_string(),
            peer_port: 29500,
            receive_timeout: Duration::from_secs(60),
            numeric: NumericConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(role: Role, numeric: NumericConfig) -> Self {
        Self {
            role,
            numeric,
            ..Default::default()
        }
    }

    /// Build from `PRIVLOOKUP_*` environment variables.
    ///
    /// `PRIVLOOKUP_CONFIG` names a JSON numeric configuration; individual
    /// numeric variables override it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(rank) = std::env::var("PRIVLOOKUP_RANK") {
            config.role = rank
                .parse::<u32>()
                .ok()
                .and_then(Role::from_rank)
                .ok_or_else(|| LookupError::InvalidConfig(format!("PRIVLOOKUP_RANK must be 0 or 1, got {rank}")))?;
        }

        if let Ok(addr) = std::env::var("PRIVLOOKUP_ADDR") {
            config.peer_address = addr;
        }

        if let Ok(port) = std::env::var("PRIVLOOKUP_PORT") {
            if let Ok(p) = port.parse() {
                config.peer_port = p;
            }
        }

        if let Ok(secs) = std::env::var("PRIVLOOKUP_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                config.receive_timeout = Duration::from_secs(s);
            }
        }

        if let Ok(path) = std::env::var("PRIVLOOKUP_CONFIG") {
            config.numeric = NumericConfig::from_file(path)?;
        }
        config.numeric.apply_env();

        Ok(config)
    }

    /// `address:port` of the rendezvous point
    pub fn peer_endpoint(&self) -> String {
        format!("{}:{}", self.peer_address, self.peer_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> NumericConfig {
        NumericConfig {
            vocab_size: 10,
            num_dimensions: 2,
            words_per_sample: 3,
            samples_per_batch: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate() {
        NumericConfig::default().validate().unwrap();
        small().validate().unwrap();
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = NumericConfig {
            num_dimensions: 0,
            ..small()
        };
        assert!(matches!(config.validate(), Err(LookupError::InvalidConfig(_))));
    }

    #[test]
    fn test_overflow_bound() {
        let config = NumericConfig {
            frac_bits: 40,
            words_per_sample: 1 << 16,
            max_abs_embedding: 100.0,
            ..small()
        };
        assert!(matches!(config.validate(), Err(LookupError::RingOverflow { .. })));
    }

    #[test]
    fn test_frac_bits_limit() {
        let config = NumericConfig {
            frac_bits: 41,
            ..small()
        };
        assert!(matches!(config.validate(), Err(LookupError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_partial() {
        let config = NumericConfig::from_json(r#"{"vocab_size": 100, "num_dimensions": 4}"#).unwrap();
        assert_eq!(config.vocab_size, 100);
        assert_eq!(config.num_dimensions, 4);
        assert_eq!(config.words_per_sample, 16);
        assert_eq!(config.frac_bits, 16);
    }

    #[test]
    fn test_json_roundtrip() {
        let json = serde_json::to_string(&small()).unwrap();
        assert_eq!(NumericConfig::from_json(&json).unwrap(), small());
    }

    #[test]
    fn test_hello_agreement() {
        let a = small().hello(Role::EmbeddingOwner, 7);
        let b = small().hello(Role::SentenceOwner, 7);
        assert!(a.agrees_with(&b));
        assert_eq!(b.bundle_id, 7);

        let other = NumericConfig {
            vocab_size: 11,
            ..small()
        };
        assert!(!a.agrees_with(&other.hello(Role::SentenceOwner, 7)));
    }

    #[test]
    fn test_roles() {
        assert_eq!(Role::from_rank(0), Some(Role::EmbeddingOwner));
        assert_eq!(Role::from_rank(1), Some(Role::SentenceOwner));
        assert_eq!(Role::from_rank(2), None);
        assert_eq!(Role::SentenceOwner.party(), Party::One);
    }
}
