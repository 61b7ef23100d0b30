//! RLQT CLI
//!
//! Validates and runs LQL queries locally, with the same engine the server
//! hosts.
//!
//! # Usage
//!
//! ```bash
//! rlqt --help
//! rlqt validate ':errors | limit 10'
//! rlqt query '@24h :tls_issues' --entries entries.json --limit 20
//! rlqt autocomplete
//! rlqt presets
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lql::engine::Engine;
use lql::models::LogEntry;
use lql::query::ValidationOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// RLQT CLI - RabbitMQ log query tool
#[derive(Parser)]
#[command(name = "rlqt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Reject labels that are not in the catalogue
    #[arg(long, global = true, env = "LQT_STRICT_LABELS")]
    strict_labels: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a query and print the validation result as JSON
    Validate {
        /// LQL query text
        query: String,
    },
    /// Print the autocomplete metadata as JSON
    Autocomplete,
    /// Run a query over a JSON array of log entries
    Query {
        /// LQL query text
        query: String,
        /// JSON file holding an array of log entries
        #[arg(short, long, env = "LQT_ENTRIES_FILE")]
        entries: PathBuf,
        /// Print at most this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List the built-in presets
    Presets,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    if run(cli, &mut stdout)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Runs a command, writing its output to `out`. Returns false when the
/// command completed but the query it checked was invalid.
fn run(cli: Cli, out: &mut impl Write) -> Result<bool> {
    let options = if cli.strict_labels {
        ValidationOptions::strict()
    } else {
        ValidationOptions::default()
    };
    let engine = Engine::builtin()
        .context("Failed to load the built-in catalogue")?
        .with_options(options);

    match cli.command {
        Some(Commands::Validate { query }) => {
            let result = engine.validate(&query);
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
            return Ok(result.valid);
        }
        Some(Commands::Autocomplete) => {
            let metadata = engine.autocomplete_data();
            writeln!(out, "{}", serde_json::to_string_pretty(&metadata)?)?;
        }
        Some(Commands::Query {
            query,
            entries,
            limit,
        }) => {
            let entries = read_entries(&entries)?;
            let output = engine
                .query(&query, entries, limit.unwrap_or(usize::MAX))
                .with_context(|| format!("Query {query:?} was rejected"))?;
            tracing::debug!(
                total = output.total,
                returned = output.entries.len(),
                "Query finished"
            );
            writeln!(out, "{}", serde_json::to_string_pretty(&output.entries)?)?;
        }
        Some(Commands::Presets) => {
            for preset in engine.catalogue().presets() {
                writeln!(out, ":{:<22} {}", preset.name, preset.description)?;
                writeln!(out, "  {:<22} {}", "", preset.source)?;
            }
        }
        None => {
            writeln!(out, "RLQT CLI v{}", env!("CARGO_PKG_VERSION"))?;
            writeln!(out, "Use --help for usage information")?;
        }
    }

    Ok(true)
}

fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entries: Vec<LogEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of log entries", path.display()))?;
    tracing::debug!(path = %path.display(), count = entries.len(), "Loaded entries");
    Ok(entries)
}
