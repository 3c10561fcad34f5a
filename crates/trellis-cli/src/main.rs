//! Gate adapter: the command-line surface over the governance pipeline.
//!
//! Exit codes are the contract with CI:
//! 0 accepted/valid, 1 structural rejection, 2 severity ceiling breached,
//! 3 fitness floor or regression, 4 stale generation or unusable input.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;
use trellis_pipeline::{AuditLog, PipelineError};
use trellis_types::Generation;

mod commands;
mod config;

use commands::EXIT_INPUT;
use config::{Engine, GovernanceConfig};

#[derive(Parser)]
#[command(name = "trellis", version)]
#[command(about = "Component compatibility and mutation governance gate")]
struct Cli {
    /// Governance configuration file (JSON). Omit for the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append-only audit log backing the pipeline.
    #[arg(long, global = true, default_value = "trellis-audit.jsonl")]
    log: PathBuf,

    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a graph snapshot against the taxonomy and compatibility table.
    Validate {
        /// JSON file with a `components` list.
        graph_file: PathBuf,
    },
    /// Score a graph snapshot and print the penalty breakdown.
    Score {
        /// JSON file with a `components` list.
        graph_file: PathBuf,
    },
    /// Submit a mutation to the governance pipeline.
    Propose {
        /// Generation the mutation was authored against.
        base_generation: u64,
        /// JSON file with an `ops` list.
        mutation_file: PathBuf,
    },
    /// Print the audit log.
    History {
        /// Only records with a base generation at or after this one.
        #[arg(long)]
        since: Option<u64>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_INPUT)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let engine = load_engine(cli.config.as_deref())?;
    match cli.command {
        Command::Validate { graph_file } => {
            let graph = commands::load_graph(&graph_file)?;
            Ok(commands::run_validate(&engine, &graph, cli.json))
        }
        Command::Score { graph_file } => {
            let graph = commands::load_graph(&graph_file)?;
            Ok(commands::run_score(&engine, &graph, cli.json))
        }
        Command::Propose {
            base_generation,
            mutation_file,
        } => {
            let mutation =
                commands::load_mutation(&mutation_file, Generation(base_generation))?;
            let log = AuditLog::open(&cli.log)?;
            match commands::run_propose(engine, log, mutation, cli.json) {
                Ok(code) => Ok(code),
                // Stale submissions are an input-class failure, not a verdict.
                Err(err @ PipelineError::StaleGeneration { .. }) => {
                    eprintln!("error: {err}");
                    Ok(EXIT_INPUT)
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::History { since } => {
            let log = AuditLog::open(&cli.log)?;
            Ok(commands::run_history(&log, since.map(Generation), cli.json))
        }
    }
}

fn load_engine(path: Option<&std::path::Path>) -> Result<Engine> {
    let config = match path {
        Some(path) => GovernanceConfig::load(path)?,
        None => GovernanceConfig::default(),
    };
    config.build()
}
