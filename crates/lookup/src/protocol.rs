//! Two-party embedding lookup
//!
//! Rank 0 owns the embedding table, rank 1 owns the token batch. Both run the
//! same state machine over a shared session:
//!
//! 1. exchange hellos and check the numeric configuration and triple bundle agree
//! 2. each party shares its private input with the other
//! 3. word counts `[samples, vocab]` by oblivious equality of every token
//!    against every vocabulary id, summed over the words axis
//! 4. `counts @ embeddings` by one Beaver matrix product
//! 5. both parties reveal, and both learn `[samples, dims]`
//!
//! Any failure aborts the whole run: remaining triples are discarded and the
//! peer is told. A run never returns a partial result.

use std::time::{Duration, Instant};

use privlookup_protocol::{PeerChannel, Transport};
use privlookup_sharing::{ObliviousEquality, PartyContext, SecretShare, SecureMatMul, SharingError, TripleSource};

use crate::config::{Role, SessionConfig};
use crate::error::{AbortReason, LookupError, ProtocolAborted, Result};
use crate::inputs::{EmbeddingTable, RevealedResult, TokenBatch};
use crate::state::LookupState;

const EMBEDDINGS_LABEL: u32 = 1;
const TOKENS_LABEL: u32 = 2;

/// The private input this party brings
#[derive(Debug, Clone)]
pub enum LocalInput {
    Embeddings(EmbeddingTable),
    Tokens(TokenBatch),
}

impl LocalInput {
    fn role(&self) -> Role {
        match self {
            LocalInput::Embeddings(_) => Role::EmbeddingOwner,
            LocalInput::Tokens(_) => Role::SentenceOwner,
        }
    }
}

/// Wall-clock time spent in each phase
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    /// Sharing inputs and building the word-count vectors
    pub word_count: Duration,
    /// Secure matrix multiplication
    pub matmul: Duration,
    /// Whole run, including session setup and reveal
    pub total: Duration,
}

/// A completed run
#[derive(Debug, Clone)]
pub struct LookupOutput {
    pub result: RevealedResult,
    pub timings: PhaseTimings,
    /// Beaver and reveal rounds, excluding session setup and input sharing
    pub rounds: u64,
    pub triples_consumed: usize,
}

pub struct EmbeddingLookupProtocol<T: Transport> {
    session: SessionConfig,
    transport: T,
    triples: Box<dyn TripleSource>,
    seed: Option<u64>,
}

impl<T: Transport> EmbeddingLookupProtocol<T> {
    pub fn new(session: SessionConfig, transport: T, triples: Box<dyn TripleSource>) -> Self {
        Self {
            session,
            transport,
            triples,
            seed: None,
        }
    }

    /// Seed the blinding randomness (tests and reproducible benchmarks)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Run to completion. Consumes the protocol: a channel and triple supply
    /// serve exactly one run.
    pub fn run(self, input: LocalInput) -> std::result::Result<LookupOutput, ProtocolAborted> {
        let role = self.session.role;
        let span = tracing::info_span!("lookup", ?role);
        let _enter = span.enter();

        let channel = PeerChannel::new(self.transport, role.rank());
        let mut ctx = match PartyContext::new(channel, self.triples) {
            Ok(ctx) => ctx,
            Err(e) => {
                return Err(ProtocolAborted {
                    reason: AbortReason::from(&LookupError::from(e)),
                    stage: LookupState::Init,
                })
            }
        };
        if let Some(seed) = self.seed {
            ctx = ctx.with_seed(seed);
        }

        let mut run = Run {
            session: &self.session,
            state: LookupState::Init,
        };
        match run.execute(&mut ctx, input) {
            Ok(output) => Ok(output),
            Err(err) => {
                let reason = AbortReason::from(&err);
                let stage = run.state;
                let dropped = ctx.discard_triples();
                if !matches!(reason, AbortReason::PeerAborted { .. }) {
                    ctx.abort(reason.error_code(), &err.to_string());
                }
                tracing::warn!(%stage, %reason, dropped, "Lookup aborted");
                tracing::debug!(from = %stage, to = %LookupState::Aborted, "State transition");
                Err(ProtocolAborted { reason, stage })
            }
        }
    }
}

/// State of one run in progress
struct Run<'a> {
    session: &'a SessionConfig,
    state: LookupState,
}

impl<'a> Run<'a> {
    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            tracing::debug!(from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    fn execute<T: Transport>(&mut self, ctx: &mut PartyContext<T>, input: LocalInput) -> Result<LookupOutput> {
        let session: &'a SessionConfig = self.session;
        let numeric = &session.numeric;
        let role = session.role;
        let start = Instant::now();

        // INIT
        numeric.validate()?;
        let encoder = numeric.encoder()?;
        let ours = numeric.hello(role, ctx.bundle_id());
        let theirs = ctx.channel().establish(ours.clone())?;
        if !ours.agrees_with(&theirs) {
            return Err(LookupError::ConfigMismatch);
        }
        if ours.bundle_id != theirs.bundle_id {
            return Err(LookupError::BundleMismatch {
                ours: ours.bundle_id,
                theirs: theirs.bundle_id,
            });
        }
        if input.role() != role {
            return Err(LookupError::InvalidInput(format!(
                "{role:?} must supply {}",
                match role {
                    Role::EmbeddingOwner => "an embedding table",
                    Role::SentenceOwner => "a token batch",
                }
            )));
        }
        match &input {
            LocalInput::Embeddings(table) => table.validate(numeric)?,
            LocalInput::Tokens(batch) => batch.validate(numeric)?,
        }
        tracing::info!(
            vocab = numeric.vocab_size,
            dims = numeric.num_dimensions,
            samples = numeric.samples_per_batch,
            words = numeric.words_per_sample,
            "Session established"
        );
        self.advance();

        // SHARE_INPUTS: send ours first, then receive the peer's
        let phase = Instant::now();
        let (tokens, table) = match input {
            LocalInput::Embeddings(table) => {
                let table = ctx.share_input(&table.to_ring(&encoder)?, numeric.frac_bits, EMBEDDINGS_LABEL)?;
                let tokens = ctx.receive_input(TOKENS_LABEL, &numeric.token_shape())?;
                (tokens, table)
            }
            LocalInput::Tokens(batch) => {
                let tokens = ctx.share_input(&batch.to_ring()?, 0, TOKENS_LABEL)?;
                let table = ctx.receive_input(EMBEDDINGS_LABEL, &numeric.table_shape())?;
                (tokens, table)
            }
        };
        expect_scale(&tokens, 0)?;
        expect_scale(&table, numeric.frac_bits)?;
        self.advance();

        // BUILD_COUNT_VECTOR
        let counts = ObliviousEquality::vocabulary(numeric.vocab_size).counts(ctx, &tokens, 1)?;
        let word_count = phase.elapsed();
        tracing::info!(elapsed = ?word_count, "Word-count vectors built");
        self.advance();

        // SECURE_MULTIPLY
        let phase = Instant::now();
        let product = SecureMatMul::with_output_scale(numeric.frac_bits).multiply(ctx, &counts, &table)?;
        let matmul = phase.elapsed();
        tracing::info!(elapsed = ?matmul, "Secure matmul done");
        self.advance();

        // REVEAL
        let revealed = product.reveal(ctx)?;
        let result = RevealedResult::from_ring(&revealed, &encoder)?;
        self.advance();

        let timings = PhaseTimings {
            word_count,
            matmul,
            total: start.elapsed(),
        };
        tracing::info!(
            word_count = ?timings.word_count,
            matmul = ?timings.matmul,
            total = ?timings.total,
            "Lookup done"
        );

        Ok(LookupOutput {
            result,
            timings,
            rounds: ctx.rounds(),
            triples_consumed: ctx.consumed_triples().count(),
        })
    }
}

fn expect_scale(share: &SecretShare, frac_bits: u8) -> Result<()> {
    if share.frac_bits() != frac_bits {
        return Err(SharingError::ScaleMismatch {
            expected: frac_bits,
            got: share.frac_bits(),
        }
        .into());
    }
    Ok(())
}
