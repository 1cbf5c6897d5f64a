//! Private inputs and the revealed output

use privlookup_fixed_point::{FixedPointEncoder, RingTensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::config::NumericConfig;
use crate::error::{LookupError, Result};

/// Tokenized sentences: `samples` rows of `words` vocabulary ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenBatchRepr")]
pub struct TokenBatch {
    samples: usize,
    words: usize,
    ids: Vec<u32>,
}

#[derive(Deserialize)]
struct TokenBatchRepr {
    samples: usize,
    words: usize,
    ids: Vec<u32>,
}

impl TryFrom<TokenBatchRepr> for TokenBatch {
    type Error = LookupError;

    fn try_from(repr: TokenBatchRepr) -> Result<Self> {
        Self::new(repr.ids, repr.samples, repr.words)
    }
}

impl TokenBatch {
    /// Row-major ids, `samples * words` of them
    pub fn new(ids: Vec<u32>, samples: usize, words: usize) -> Result<Self> {
        if ids.len() != samples * words {
            return Err(LookupError::InvalidInput(format!(
                "token batch has {} ids, expected {samples} x {words}",
                ids.len()
            )));
        }
        Ok(Self { samples, words, ids })
    }

    /// One sentence per row; all rows must have the same length
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let words = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != words) {
            return Err(LookupError::InvalidInput("ragged token batch".into()));
        }
        Self::new(rows.concat(), rows.len(), words)
    }

    /// Uniform ids in `[0, vocab_size)`
    pub fn random(samples: usize, words: usize, vocab_size: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let ids = (0..samples * words)
            .map(|_| rng.gen_range(0..vocab_size as u32))
            .collect();
        Self { samples, words, ids }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn row(&self, sample: usize) -> &[u32] {
        &self.ids[sample * self.words..(sample + 1) * self.words]
    }

    /// Shape and id range must match the configuration
    pub fn validate(&self, config: &NumericConfig) -> Result<()> {
        if self.samples != config.samples_per_batch || self.words != config.words_per_sample {
            return Err(LookupError::InvalidInput(format!(
                "token batch is {} x {}, configuration expects {} x {}",
                self.samples, self.words, config.samples_per_batch, config.words_per_sample
            )));
        }
        if let Some(&bad) = self.ids.iter().find(|&&id| id as usize >= config.vocab_size) {
            return Err(LookupError::InvalidInput(format!(
                "token id {bad} outside vocabulary of {}",
                config.vocab_size
            )));
        }
        Ok(())
    }

    /// Ids as ring integers at scale 0
    pub fn to_ring(&self) -> Result<RingTensor> {
        Ok(RingTensor::from_u32(&self.ids, vec![self.samples, self.words])?)
    }
}

/// Dense `[vocab_size, num_dimensions]` table of real embeddings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EmbeddingTableRepr")]
pub struct EmbeddingTable {
    vocab_size: usize,
    num_dimensions: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct EmbeddingTableRepr {
    vocab_size: usize,
    num_dimensions: usize,
    data: Vec<f64>,
}

impl TryFrom<EmbeddingTableRepr> for EmbeddingTable {
    type Error = LookupError;

    fn try_from(repr: EmbeddingTableRepr) -> Result<Self> {
        Self::new(repr.data, repr.vocab_size, repr.num_dimensions)
    }
}

impl EmbeddingTable {
    /// Row-major values
    pub fn new(data: Vec<f64>, vocab_size: usize, num_dimensions: usize) -> Result<Self> {
        if data.len() != vocab_size * num_dimensions {
            return Err(LookupError::InvalidInput(format!(
                "embedding table has {} values, expected {vocab_size} x {num_dimensions}",
                data.len()
            )));
        }
        Ok(Self {
            vocab_size,
            num_dimensions,
            data,
        })
    }

    /// Values uniform in `[-1, 1)`
    pub fn random(vocab_size: usize, num_dimensions: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let data = (0..vocab_size * num_dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        Self {
            vocab_size,
            num_dimensions,
            data,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Embedding of one vocabulary id
    pub fn row(&self, id: usize) -> &[f64] {
        &self.data[id * self.num_dimensions..(id + 1) * self.num_dimensions]
    }

    /// Shape and magnitudes must match the configuration
    pub fn validate(&self, config: &NumericConfig) -> Result<()> {
        if self.vocab_size != config.vocab_size || self.num_dimensions != config.num_dimensions {
            return Err(LookupError::InvalidInput(format!(
                "embedding table is {} x {}, configuration expects {} x {}",
                self.vocab_size, self.num_dimensions, config.vocab_size, config.num_dimensions
            )));
        }
        if let Some(&bad) = self
            .data
            .iter()
            .find(|v| !v.is_finite() || v.abs() > config.max_abs_embedding)
        {
            return Err(LookupError::InvalidInput(format!(
                "embedding value {bad} exceeds max_abs_embedding {}",
                config.max_abs_embedding
            )));
        }
        Ok(())
    }

    /// Fixed-point encode the table
    pub fn to_ring(&self, encoder: &FixedPointEncoder) -> Result<RingTensor> {
        Ok(RingTensor::from_f64(
            &self.data,
            vec![self.vocab_size, self.num_dimensions],
            encoder,
        )?)
    }
}

/// Per-sentence sums of embeddings, `[samples, dims]`, known to both parties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RevealedResultRepr")]
pub struct RevealedResult {
    samples: usize,
    num_dimensions: usize,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RevealedResultRepr {
    samples: usize,
    num_dimensions: usize,
    values: Vec<f64>,
}

impl TryFrom<RevealedResultRepr> for RevealedResult {
    type Error = LookupError;

    fn try_from(repr: RevealedResultRepr) -> Result<Self> {
        Self::new(repr.values, repr.samples, repr.num_dimensions)
    }
}

impl RevealedResult {
    pub fn new(values: Vec<f64>, samples: usize, num_dimensions: usize) -> Result<Self> {
        if values.len() != samples * num_dimensions {
            return Err(LookupError::InvalidInput(format!(
                "result has {} values, expected {samples} x {num_dimensions}",
                values.len()
            )));
        }
        Ok(Self {
            samples,
            num_dimensions,
            values,
        })
    }

    /// Decode a revealed ring tensor of shape `[samples, dims]`
    pub fn from_ring(tensor: &RingTensor, encoder: &FixedPointEncoder) -> Result<Self> {
        match tensor.shape() {
            &[samples, dims] => Self::new(tensor.to_f64_vec(encoder), samples, dims),
            other => Err(LookupError::InvalidInput(format!(
                "revealed tensor has shape {other:?}, expected a matrix"
            ))),
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, sample: usize) -> &[f64] {
        &self.values[sample * self.num_dimensions..(sample + 1) * self.num_dimensions]
    }

    /// Largest absolute elementwise difference, or infinity on a shape mismatch
    pub fn max_abs_diff(&self, other: &RevealedResult) -> f64 {
        if self.samples != other.samples || self.num_dimensions != other.num_dimensions {
            return f64::INFINITY;
        }
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Same shape and every value within `atol`
    pub fn approx_eq(&self, other: &RevealedResult, atol: f64) -> bool {
        self.max_abs_diff(other) <= atol
    }
}
