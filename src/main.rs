//! # Memoria Archivist CLI (`archivist`)
//!
//! Final stage of the pipeline. Reads the labeled envelope produced by the
//! labeling stage and archives it.
//!
//! ## Usage
//!
//! ```bash
//! archivist --config ./config/archivist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `archivist store` | Archive one envelope (stdin or `--input`) |
//! | `archivist next-id` | Print the id the next fragment would get |
//! | `archivist status` | Compare fragment files with the index |
//! | `archivist export` | Write gallery data (JSON or JS) |
//!
//! Exit status is 0 on success and 1 on any failure, including bad
//! arguments. The absolute archived path is the only thing `store` prints
//! to stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use memoria::archivist::Archivist;
use memoria::config;
use memoria::envelope::read_envelope;
use memoria::export::{self, ExportFormat};
use memoria::status;

/// Memoria Archivist: numbered, version-controlled archive of code fragments.
#[derive(Parser)]
#[command(name = "archivist", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/archivist.toml`; if that file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive one labeled fragment.
    ///
    /// Reads a JSON envelope with `file_content`, `repo_url`, `file_path`,
    /// `timestamp`, `generated_title` and optional `search_keyword`, writes
    /// the fragment, updates the index and commits both.
    Store {
        /// Read the envelope from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Print the id the next stored fragment would receive.
    NextId,

    /// Report fragment files, index entries and any discrepancies.
    Status,

    /// Export archived fragments for the static gallery.
    Export {
        /// Output format: `json` or `js` (assigns `FRAGMENTS_DATA`).
        #[arg(long, default_value = "json")]
        format: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("memoria=info,archivist=info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Store { input } => {
            let envelope = match input {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open input: {}", path.display()))?;
                    read_envelope(BufReader::new(file))?
                }
                None => read_envelope(std::io::stdin().lock())?,
            };
            let outcome = Archivist::from_config(&cfg).store(envelope)?;
            let shown = std::fs::canonicalize(&outcome.archived_path)
                .unwrap_or(outcome.archived_path);
            println!("{}", shown.display());
        }
        Commands::NextId => {
            let id = Archivist::from_config(&cfg).peek_next_id()?;
            println!("{}", id);
        }
        Commands::Status => {
            let report = status::archive_status(&cfg)?;
            status::print_status(&report);
        }
        Commands::Export { format, output } => {
            let format = ExportFormat::parse(&format)?;
            export::run_export(&cfg, format, output.as_deref())?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version arrive here too and are not failures.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
