//! Binary entry point for ledgerio.
//!
//! This binary provides the CLI interface for importing and exporting
//! dossier entities and for managing stream formats.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{FormatAction, cmd_export, cmd_format, cmd_import};
use ledgerio::config::LedgerioConfig;
use ledgerio::observability;
use std::path::PathBuf;
use std::process::ExitCode;

/// Ledgerio - bulk import and export of bookkeeping entities.
#[derive(Parser)]
#[command(name = "ledgerio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "LEDGERIO_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Import a delimited file into the dossier.
    Import {
        /// File to import.
        file: PathBuf,

        /// Entity type: account, class or bat.
        #[arg(short, long)]
        entity: String,

        /// Import stream format name.
        #[arg(short, long)]
        format: Option<String>,

        /// Duplicate policy: abort, replace or ignore.
        #[arg(short, long)]
        policy: Option<String>,

        /// Delete the whole table before inserting.
        #[arg(long)]
        wipe: bool,

        /// Halt each phase after its first error.
        #[arg(long)]
        stop_on_error: bool,

        /// Print the session report as JSON.
        #[arg(long)]
        json: bool,

        /// Dossier database path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Export a dossier table to a delimited file.
    Export {
        /// Output file.
        file: PathBuf,

        /// Entity type: account, class or bat.
        #[arg(short, long)]
        entity: String,

        /// Export stream format name.
        #[arg(short, long)]
        format: Option<String>,

        /// Dossier database path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Manage saved stream formats.
    Format {
        #[command(subcommand)]
        action: FormatAction,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = config.logging.clone().with_env_overrides(cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &LedgerioConfig) -> ledgerio::Result<()> {
    match command {
        Commands::Import {
            file,
            entity,
            format,
            policy,
            wipe,
            stop_on_error,
            json,
            db,
        } => cmd_import(
            config,
            file,
            entity,
            format,
            policy,
            wipe,
            stop_on_error,
            json,
            db,
        ),

        Commands::Export {
            file,
            entity,
            format,
            db,
        } => cmd_export(config, file, entity, format, db),

        Commands::Format { action } => cmd_format(config, action),
    }
}

/// Loads configuration.
fn load_config(path: Option<&std::path::Path>) -> ledgerio::Result<LedgerioConfig> {
    match path {
        Some(path) => LedgerioConfig::load_from_file(path),
        None => Ok(LedgerioConfig::load_default()),
    }
}
