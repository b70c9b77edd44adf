//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod db;
mod lookup;
mod warmup;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "campus-cache")]
#[command(about = "Scrape-through cache for campus course, student and contact lookups")]
#[command(version)]
pub struct Cli {
    /// SQLite database file (overrides SQLITE_PATH and the config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

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
    /// Fill the cache from the upstream sites
    Warmup {
        /// Comma separated modules: students, contacts, courses, stickers, programs
        #[arg(long)]
        modules: Option<String>,
        /// Purge every table before filling
        #[arg(long)]
        reset: bool,
        /// Worker pool size (default: SCRAPER_WORKERS or 4)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Give up after this long, e.g. 30m (default: WARMUP_TIMEOUT or 30m)
        #[arg(long)]
        timeout: Option<String>,
    },

    /// Delete every cached row
    Purge,

    /// Show cached row counts per table
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a query the way the chat bot would, printing JSON records
    Lookup {
        /// Query text, e.g. `1141U0010` or `課程 微積分`
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

/// Parse arguments, load settings and run the selected command.
pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(database) = cli.database {
        settings.database_path = database;
    }
    tracing::debug!("Using database {}", settings.database_path.display());

    match cli.command {
        Commands::Warmup {
            modules,
            reset,
            workers,
            timeout,
        } => {
            let args = warmup::WarmupArgs {
                modules,
                reset,
                workers,
                timeout,
            };
            warmup::cmd_warmup(&settings, args).await
        }
        Commands::Purge => db::cmd_purge(&settings),
        Commands::Stats { json } => db::cmd_stats(&settings, json),
        Commands::Lookup { text } => lookup::cmd_lookup(&settings, &text.join(" ")).await,
    }
}

/// Live scraper wired from settings.
fn campus_scraper(settings: &Settings) -> anyhow::Result<crate::scrapers::CampusScraper> {
    let http = crate::scrapers::HttpClient::new(&settings.http_config())?;
    Ok(crate::scrapers::CampusScraper::new(
        http,
        &settings.endpoints,
        settings.program_folders()?,
    ))
}

/// Cancellation token fired by Ctrl-C.
fn interrupt_token() -> tokio_util::sync::CancellationToken {
    let token = tokio_util::sync::CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            on_signal.cancel();
        }
    });
    token
}
