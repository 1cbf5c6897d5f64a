//! PrivLookup command line
//!
//! # Usage
//!
//! ```bash
//! # Deal triples for one run
//! privlookup deal ./bundles
//!
//! # Join a run over TCP as PRIVLOOKUP_RANK
//! PRIVLOOKUP_RANK=0 privlookup party ./bundles/party0.triples table.json
//! PRIVLOOKUP_RANK=1 privlookup party ./bundles/party1.triples tokens.json
//!
//! # Both parties in-process, checked against plaintext
//! privlookup demo
//! ```
//!
//! Numeric parameters come from `PRIVLOOKUP_CONFIG` (JSON) and the
//! `PRIVLOOKUP_*` overrides. `party` reads its input as JSON (an embedding
//! table for rank 0, a token batch for rank 1) or, without one, generates a
//! random input from `--input-seed`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use privlookup_harness::{InProcessRunner, PlaintextLookup, VERIFY_TOLERANCE};
use privlookup_lookup::{
    EmbeddingLookupProtocol, EmbeddingTable, LocalInput, LookupOutput, NumericConfig, Role, SessionConfig,
    TokenBatch,
};
use privlookup_protocol::TcpTransport;
use privlookup_sharing::{TriplePlan, TripleStore, TrustedDealer};

const CONNECT_ATTEMPTS: u32 = 50;

#[derive(Parser)]
#[command(name = "privlookup")]
#[command(version)]
#[command(about = "Two-party private embedding lookup")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deal Beaver triples for one run into party0.triples and party1.triples
    Deal {
        /// Directory the two bundles are written to
        out_dir: PathBuf,

        /// Seed for reproducible triples
        #[arg(long, env = "PRIVLOOKUP_DEALER_SEED")]
        dealer_seed: Option<u64>,
    },

    /// Join a run over TCP as the party PRIVLOOKUP_RANK names
    Party {
        /// This party's triple bundle, consumed by the run
        triples: PathBuf,

        /// JSON embedding table (rank 0) or token batch (rank 1)
        input: Option<PathBuf>,

        /// Seed for the random input used when no input file is given
        #[arg(long, env = "PRIVLOOKUP_INPUT_SEED", default_value = "0")]
        input_seed: u64,

        /// Write the revealed sums here as JSON
        #[arg(short, long, env = "PRIVLOOKUP_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Run both parties in-process and check against plaintext
    Demo {
        /// Seed for the random table and batch
        #[arg(long, env = "PRIVLOOKUP_INPUT_SEED", default_value = "0")]
        input_seed: u64,
    },
}

/// Format duration in human-readable form
fn format_duration(d: Duration) -> String {
    if d.as_micros() < 1000 {
        format!("{}µs", d.as_micros())
    } else if d.as_millis() < 1000 {
        format!("{:.2}ms", d.as_micros() as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_millis() as f64 / 1000.0)
    }
}

fn numeric_from_env() -> anyhow::Result<NumericConfig> {
    let mut numeric = match std::env::var("PRIVLOOKUP_CONFIG") {
        Ok(path) => NumericConfig::from_file(&path).with_context(|| format!("reading {path}"))?,
        Err(_) => NumericConfig::default(),
    };
    numeric.apply_env();
    Ok(numeric)
}

fn deal(out_dir: &Path, dealer_seed: Option<u64>) -> anyhow::Result<()> {
    let numeric = numeric_from_env()?;
    numeric.validate()?;

    let plan = TriplePlan::for_lookup(
        numeric.samples_per_batch,
        numeric.words_per_sample,
        numeric.vocab_size,
        numeric.num_dimensions,
    );
    let mut dealer = match dealer_seed {
        Some(seed) => TrustedDealer::from_seed(seed),
        None => TrustedDealer::new(),
    };
    let (zero, one) = dealer.deal(&plan)?;

    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    zero.save(out_dir.join("party0.triples"))?;
    one.save(out_dir.join("party1.triples"))?;
    tracing::info!(triples = plan.len(), dir = %out_dir.display(), "Triple bundles written");
    Ok(())
}

fn load_input(role: Role, numeric: &NumericConfig, path: Option<&Path>, seed: u64) -> anyhow::Result<LocalInput> {
    let input = match (role, path) {
        (Role::EmbeddingOwner, Some(path)) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            LocalInput::Embeddings(serde_json::from_str::<EmbeddingTable>(&json)?)
        }
        (Role::SentenceOwner, Some(path)) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            LocalInput::Tokens(serde_json::from_str::<TokenBatch>(&json)?)
        }
        (Role::EmbeddingOwner, None) => {
            LocalInput::Embeddings(EmbeddingTable::random(numeric.vocab_size, numeric.num_dimensions, seed))
        }
        (Role::SentenceOwner, None) => LocalInput::Tokens(TokenBatch::random(
            numeric.samples_per_batch,
            numeric.words_per_sample,
            numeric.vocab_size,
            seed,
        )),
    };
    Ok(input)
}

fn print_output(output: &LookupOutput) {
    println!("Revealed [{} x {}]:", output.result.samples(), output.result.num_dimensions());
    for s in 0..output.result.samples().min(8) {
        let row: Vec<String> = output.result.row(s).iter().map(|v| format!("{v:+.4}")).collect();
        println!("  [{s}] {}", row.join(" "));
    }
    println!(
        "Word count {}, matmul {}, total {} ({} rounds, {} triples)",
        format_duration(output.timings.word_count),
        format_duration(output.timings.matmul),
        format_duration(output.timings.total),
        output.rounds,
        output.triples_consumed,
    );
}

fn party(triples: &Path, input: Option<&Path>, input_seed: u64, output_path: Option<&Path>) -> anyhow::Result<()> {
    let session = SessionConfig::from_env()?;
    let role = session.role;
    let local = load_input(role, &session.numeric, input, input_seed)?;
    let store = TripleStore::load(triples).with_context(|| format!("loading {}", triples.display()))?;
    if store.party() != role.party() {
        bail!("{} holds triples for rank {}", triples.display(), store.party().rank());
    }

    let endpoint = session.peer_endpoint();
    let transport = match role {
        Role::EmbeddingOwner => {
            tracing::info!(%endpoint, "Waiting for peer");
            TcpTransport::listen(endpoint.as_str(), session.receive_timeout)?
        }
        Role::SentenceOwner => {
            tracing::info!(%endpoint, "Connecting to peer");
            TcpTransport::connect(endpoint.as_str(), session.receive_timeout, CONNECT_ATTEMPTS)?
        }
    };

    let output = EmbeddingLookupProtocol::new(session, transport, Box::new(store)).run(local)?;
    print_output(&output);

    if let Some(path) = output_path {
        std::fs::write(path, serde_json::to_string_pretty(&output.result)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn demo(seed: u64) -> anyhow::Result<()> {
    let mut numeric = NumericConfig {
        vocab_size: 1000,
        num_dimensions: 32,
        words_per_sample: 16,
        samples_per_batch: 4,
        ..Default::default()
    };
    numeric.apply_env();
    numeric.validate()?;

    let table = EmbeddingTable::random(numeric.vocab_size, numeric.num_dimensions, seed);
    let batch = TokenBatch::random(
        numeric.samples_per_batch,
        numeric.words_per_sample,
        numeric.vocab_size,
        seed.wrapping_add(1),
    );

    println!(
        "=== PrivLookup demo: vocab {}, dims {}, {} x {} tokens ===\n",
        numeric.vocab_size, numeric.num_dimensions, numeric.samples_per_batch, numeric.words_per_sample
    );
    let runner = InProcessRunner::new(numeric);
    let report = runner.run(table.clone(), batch.clone())?;
    print_output(&report.embedding_owner);

    PlaintextLookup::new(&table).verify(&batch, report.result(), VERIFY_TOLERANCE)?;
    if !report.parties_agree() {
        bail!("parties revealed different results");
    }
    println!("\nMatches plaintext reference within {VERIFY_TOLERANCE:e}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "privlookup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Deal { out_dir, dealer_seed } => deal(&out_dir, dealer_seed),
        Command::Party {
            triples,
            input,
            input_seed,
            output,
        } => party(&triples, input.as_deref(), input_seed, output.as_deref()),
        Command::Demo { input_seed } => demo(input_seed),
    }
}
