//! Plaintext reference implementation
//!
//! Non-secure computation of the same sums, used to verify the secure run.
//! Two routes are provided: word counts followed by a matrix product (the
//! same shape of computation the secure protocol performs) and a direct
//! gather-and-sum of embedding rows (the ground truth).

use privlookup_lookup::{EmbeddingTable, RevealedResult, TokenBatch};

use crate::error::{HarnessError, Result};

/// Absolute tolerance for comparing a revealed result with the reference
pub const VERIFY_TOLERANCE: f64 = 1e-3;

/// Cleartext lookup against a known table
pub struct PlaintextLookup<'a> {
    table: &'a EmbeddingTable,
}

impl<'a> PlaintextLookup<'a> {
    pub fn new(table: &'a EmbeddingTable) -> Self {
        Self { table }
    }

    /// `[samples, vocab]` occurrence counts, row-major
    pub fn word_counts(&self, batch: &TokenBatch) -> Vec<u32> {
        let vocab = self.table.vocab_size();
        let mut counts = vec![0u32; batch.samples() * vocab];
        for s in 0..batch.samples() {
            let row = &mut counts[s * vocab..(s + 1) * vocab];
            for (v, count) in row.iter_mut().enumerate() {
                *count = batch.row(s).iter().filter(|&&id| id as usize == v).count() as u32;
            }
        }
        counts
    }

    /// `counts @ table`
    pub fn count_then_multiply(&self, batch: &TokenBatch) -> Result<RevealedResult> {
        let vocab = self.table.vocab_size();
        let dims = self.table.num_dimensions();
        let counts = self.word_counts(batch);

        let mut out = vec![0.0f64; batch.samples() * dims];
        for s in 0..batch.samples() {
            for v in 0..vocab {
                let c = counts[s * vocab + v];
                if c == 0 {
                    continue;
                }
                for (o, e) in out[s * dims..(s + 1) * dims].iter_mut().zip(self.table.row(v)) {
                    *o += c as f64 * e;
                }
            }
        }
        Ok(RevealedResult::new(out, batch.samples(), dims)?)
    }

    /// Sum of the embedding rows each sentence indexes
    pub fn gather_sum(&self, batch: &TokenBatch) -> Result<RevealedResult> {
        let dims = self.table.num_dimensions();
        let mut out = vec![0.0f64; batch.samples() * dims];
        for s in 0..batch.samples() {
            for &id in batch.row(s) {
                if id as usize >= self.table.vocab_size() {
                    return Err(HarnessError::InvalidInput(format!("token id {id} outside vocabulary")));
                }
                for (o, e) in out[s * dims..(s + 1) * dims].iter_mut().zip(self.table.row(id as usize)) {
                    *o += e;
                }
            }
        }
        Ok(RevealedResult::new(out, batch.samples(), dims)?)
    }

    /// Compare a revealed result against the ground truth
    pub fn verify(&self, batch: &TokenBatch, result: &RevealedResult, atol: f64) -> Result<()> {
        let expected = self.gather_sum(batch)?;
        let diff = expected.max_abs_diff(result);
        if diff > atol {
            return Err(HarnessError::VerificationFailed {
                message: format!("max abs difference {diff:e} exceeds tolerance {atol:e}"),
            });
        }
        tracing::info!(max_abs_diff = diff, "Result matches plaintext reference");
        Ok(())
    }
}
