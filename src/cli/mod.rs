//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

use commands::{audit, export, init, status, sync};

#[derive(Parser)]
#[command(name = "sitemirror")]
#[command(about = "Keep a local mirror of remote files and listings in sync")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the database and mirror (overrides config file)
    #[arg(long, short = 'd', global = true, env = "SITEMIRROR_DATA_DIR")]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run a reconciliation pass for one or more targets
    Sync {
        /// Targets to sync (can specify multiple, or use --all)
        targets: Vec<String>,
        /// Sync all configured targets
        #[arg(short, long)]
        all: bool,
        /// Artifacts processed concurrently (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Print pass summaries as JSON
        #[arg(long)]
        json: bool,
        /// Cancel a pass after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show record counts and freshness per target
    Status {
        /// Target to show (optional)
        target: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the records of a target
    Ls {
        target: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare records against mirrored files
    Audit {
        target: String,
        /// Delete mirrored files that have no record
        #[arg(long)]
        fix: bool,
        /// Re-hash every mirrored file
        #[arg(long)]
        verify: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the records of a target as JSON
    Export {
        target: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List configured targets
    Targets,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await,
        Commands::Sync {
            targets,
            all,
            workers,
            json,
            timeout,
        } => {
            let options = sync::SyncOptions {
                workers,
                json,
                timeout: timeout.or(settings.pass_timeout),
            };
            sync::cmd_sync(&settings, &config, &targets, all, options).await
        }
        Commands::Status { target, json } => {
            status::cmd_status(&settings, &config, target.as_deref(), json).await
        }
        Commands::Ls { target, json } => status::cmd_ls(&settings, &target, json).await,
        Commands::Audit {
            target,
            fix,
            verify,
            json,
        } => audit::cmd_audit(&settings, &target, fix, verify, json).await,
        Commands::Export { target, output } => {
            export::cmd_export(&settings, &target, output.as_deref()).await
        }
        Commands::Targets => status::cmd_targets(&config),
    }
}
