//! campus-cache command-line entry point.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campus_cache::cli;

const DEFAULT_FILTER: &str = "campus_cache=info";

/// RUST_LOG wins, then LOG_LEVEL, then the crate default. `-v` forces debug.
fn env_filter() -> EnvFilter {
    if cli::is_verbose() {
        return EnvFilter::new("campus_cache=debug");
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    match std::env::var("LOG_LEVEL") {
        Ok(level) if !level.trim().is_empty() => {
            EnvFilter::try_new(format!("campus_cache={}", level.trim().to_lowercase()))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        _ => EnvFilter::new(DEFAULT_FILTER),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
