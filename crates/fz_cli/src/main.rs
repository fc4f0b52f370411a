//! fz CLI
//!
//! Command-line tools for fz backing stores.
//!
//! # Commands
//!
//! - `inspect` - Display table statistics and store contents
//! - `verify` - Load everything and check Log integrity and chains
//! - `history` - Show the chunks and entries of one Node
//! - `interval` - List the entries of a time window
//! - `lists` - Show the Named Lists

mod commands;
mod error;

use clap::{Parser, Subcommand, ValueEnum};
use error::{CliError, CliResult};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// fz command-line store tools.
#[derive(Parser)]
#[command(name = "fz")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the backing-store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display table statistics and store contents
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Verify rows, Log integrity and chain threading
    Verify,

    /// Show the history of one Node
    History {
        /// Node id (YYYYMMDDHHMM or YYYYMMDDHHMM.m)
        #[arg(short, long)]
        node: String,

        /// Show only the newest N chunks
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// List entries from --from up to, not including, --before
    Interval {
        /// First minute (YYYYMMDDHHMM)
        #[arg(long)]
        from: String,

        /// End minute, exclusive (YYYYMMDDHHMM)
        #[arg(long)]
        before: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show the Named Lists
    Lists,

    /// Show version information
    Version,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> CliResult<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = |command: &'static str| cli.path.clone().ok_or(CliError::MissingPath(command));
    match &cli.command {
        Commands::Inspect { format } => {
            commands::inspect::run(&path("inspect")?, *format)?;
        }
        Commands::Verify => {
            commands::verify::run(&path("verify")?)?;
        }
        Commands::History { node, limit } => {
            commands::history::run(&path("history")?, node, *limit)?;
        }
        Commands::Interval {
            from,
            before,
            format,
        } => {
            commands::interval::run(&path("interval")?, from, before, *format)?;
        }
        Commands::Lists => {
            commands::lists::run(&path("lists")?)?;
        }
        Commands::Version => {
            println!("fz CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("fz Core v{}", fz_core::VERSION);
        }
    }

    Ok(())
}
