mod commands;
mod config;
mod logging;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use churn_core::AccountIdentity;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "churnwatch")]
#[command(version)]
#[command(about = "Captures follower lists and reports who unfollowed", long_about = None)]
struct Cli {
    /// Path to the RON config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Account handle (falls back to `account` in the config file)
    #[arg(short, long, global = true)]
    account: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch both lists and store a new snapshot
    Capture {
        /// Session file written by the login helper
        #[arg(long)]
        session: PathBuf,
    },

    /// Show the latest counts and churn since the previous snapshot
    Report,

    /// List recent snapshots, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show whether a capture is running
    Status,

    /// Clear a stuck run lock
    Cancel,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        config.log_level.into()
    };
    logging::initialize(config.log_destination, level);

    let handle = cli
        .account
        .or_else(|| config.account.clone())
        .context("no account given; pass --account or set `account` in the config file")?;
    let account = AccountIdentity::new(handle)?;

    match cli.command {
        Commands::Capture { session } => commands::capture(&config, &account, session),
        Commands::Report => commands::report(&config, &account),
        Commands::History { limit } => commands::history(&config, &account, limit),
        Commands::Status => commands::status(&config, &account),
        Commands::Cancel => commands::cancel(&config, &account),
    }
}
