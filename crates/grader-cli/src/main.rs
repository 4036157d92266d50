//! # grader CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grader_cli::keys::{run_key, KeyArgs};
use grader_cli::payload::{run_envelope, run_hash, EnvelopeArgs, HashArgs};
use grader_cli::request::{run_request, RequestArgs};

/// Client tooling for the grader submission protocol.
///
/// Generates P-256 keys, prints signed request bodies for the grader API,
/// and computes canonical payload digests.
#[derive(Parser, Debug)]
#[command(name = "grader", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// P-256 key generation and inspection.
    Key(KeyArgs),

    /// Print the signed JSON body for an API endpoint.
    Request(RequestArgs),

    /// Print a signed envelope for a typed payload.
    Envelope(EnvelopeArgs),

    /// Print the canonical digest of a payload.
    Hash(HashArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Key(args) => run_key(&args),
        Commands::Request(args) => run_request(&args),
        Commands::Envelope(args) => run_envelope(&args),
        Commands::Hash(args) => run_hash(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
