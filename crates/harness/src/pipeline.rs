//! In-process two-party run
//!
//! Both parties run on their own thread over an in-memory transport pair,
//! with triples from a trusted dealer. Failure cases can hand each party a
//! custom session and triple supply through [`InProcessRunner::run_pair`].

use std::thread;
use std::time::Duration;

use privlookup_lookup::{
    EmbeddingLookupProtocol, EmbeddingTable, LocalInput, LookupOutput, NumericConfig, ProtocolAborted,
    RevealedResult, Role, SessionConfig, TokenBatch,
};
use privlookup_protocol::MemoryTransport;
use privlookup_sharing::{TriplePlan, TripleSource, TripleStore, TrustedDealer};

use crate::error::{HarnessError, Result};

/// Everything one party brings to a run
pub struct PartySetup {
    pub session: SessionConfig,
    pub input: LocalInput,
    pub triples: Box<dyn TripleSource>,
}

/// Outcome of both parties, successful or not
#[derive(Debug)]
pub struct PartyResults {
    pub embedding_owner: std::result::Result<LookupOutput, ProtocolAborted>,
    pub sentence_owner: std::result::Result<LookupOutput, ProtocolAborted>,
}

impl PartyResults {
    /// Both parties must have finished; the first abort is returned otherwise
    pub fn into_report(self) -> Result<RunReport> {
        Ok(RunReport {
            embedding_owner: self.embedding_owner?,
            sentence_owner: self.sentence_owner?,
        })
    }
}

/// A run both parties completed
#[derive(Debug)]
pub struct RunReport {
    pub embedding_owner: LookupOutput,
    pub sentence_owner: LookupOutput,
}

impl RunReport {
    /// The revealed sums (both parties hold the same values)
    pub fn result(&self) -> &RevealedResult {
        &self.embedding_owner.result
    }

    /// Whether both parties revealed bit-identical results
    pub fn parties_agree(&self) -> bool {
        self.embedding_owner.result == self.sentence_owner.result
    }
}

pub struct InProcessRunner {
    numeric: NumericConfig,
    timeout: Duration,
    dealer_seed: Option<u64>,
    blinding_seed: Option<u64>,
}

impl InProcessRunner {
    pub fn new(numeric: NumericConfig) -> Self {
        Self {
            numeric,
            timeout: Duration::from_secs(30),
            dealer_seed: None,
            blinding_seed: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deterministic triples
    pub fn with_dealer_seed(mut self, seed: u64) -> Self {
        self.dealer_seed = Some(seed);
        self
    }

    /// Deterministic input blinding
    pub fn with_blinding_seed(mut self, seed: u64) -> Self {
        self.blinding_seed = Some(seed);
        self
    }

    pub fn numeric(&self) -> &NumericConfig {
        &self.numeric
    }

    /// Triples a full lookup consumes under this configuration
    pub fn plan(&self) -> TriplePlan {
        TriplePlan::for_lookup(
            self.numeric.samples_per_batch,
            self.numeric.words_per_sample,
            self.numeric.vocab_size,
            self.numeric.num_dimensions,
        )
    }

    /// A fresh dealer for this runner
    pub fn dealer(&self) -> TrustedDealer {
        match self.dealer_seed {
            Some(seed) => TrustedDealer::from_seed(seed),
            None => TrustedDealer::new(),
        }
    }

    /// Session configuration for one role
    pub fn session(&self, role: Role) -> SessionConfig {
        SessionConfig {
            receive_timeout: self.timeout,
            ..SessionConfig::new(role, self.numeric.clone())
        }
    }

    /// Deal triples and run a full lookup
    pub fn run(&self, table: EmbeddingTable, batch: TokenBatch) -> Result<RunReport> {
        let (zero, one) = self.dealer().deal(&self.plan())?;
        let results = self.run_pair(
            PartySetup {
                session: self.session(Role::EmbeddingOwner),
                input: LocalInput::Embeddings(table),
                triples: Box::new(zero),
            },
            PartySetup {
                session: self.session(Role::SentenceOwner),
                input: LocalInput::Tokens(batch),
                triples: Box::new(one),
            },
        )?;
        results.into_report()
    }

    /// Run both parties with caller-supplied setups and collect both outcomes
    pub fn run_pair(&self, zero: PartySetup, one: PartySetup) -> Result<PartyResults> {
        let (t0, t1) = MemoryTransport::pair(self.timeout);

        thread::scope(|scope| {
            let h0 = scope.spawn(|| self.run_party(zero, t0, 0));
            let h1 = scope.spawn(|| self.run_party(one, t1, 1));

            let embedding_owner = h0.join().map_err(|_| HarnessError::PartyPanicked(0))?;
            let sentence_owner = h1.join().map_err(|_| HarnessError::PartyPanicked(1))?;
            Ok(PartyResults {
                embedding_owner,
                sentence_owner,
            })
        })
    }

    fn run_party(
        &self,
        setup: PartySetup,
        transport: MemoryTransport,
        rank: u64,
    ) -> std::result::Result<LookupOutput, ProtocolAborted> {
        let mut protocol = EmbeddingLookupProtocol::new(setup.session, transport, setup.triples);
        if let Some(seed) = self.blinding_seed {
            protocol = protocol.with_seed(seed.wrapping_add(rank));
        }
        protocol.run(setup.input)
    }
}

/// Deal the full lookup plan but keep only the first `keep` triples for party 0
pub fn short_supply(runner: &InProcessRunner, keep: usize) -> Result<(TripleStore, TripleStore)> {
    let mut dealer = runner.dealer();
    let mut zero = TripleStore::new(privlookup_sharing::Party::Zero);
    let mut one = TripleStore::new(privlookup_sharing::Party::One);
    for (i, request) in runner.plan().requests().iter().enumerate() {
        let (s0, s1) = dealer.deal_one(request)?;
        if i < keep {
            zero.push(s0);
        }
        one.push(s1);
    }
    Ok((zero, one))
}
