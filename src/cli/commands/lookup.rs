//! One-shot query through the cache.

use std::process::ExitCode;
use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::services::{QueryError, QueryService};

pub async fn cmd_lookup(settings: &Settings, text: &str) -> anyhow::Result<ExitCode> {
    let store = settings.open_store()?;
    let source = Arc::new(super::campus_scraper(settings)?);
    let service = QueryService::new(store, source);
    let cancel = super::interrupt_token();

    match service.answer(&cancel, text).await {
        Ok(answer) => {
            if answer.is_empty() {
                eprintln!("{} No records for {:?}", style("!").yellow(), text);
            }
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(QueryError::NotFound) => {
            eprintln!("{} Nothing found for {:?}", style("!").yellow(), text);
            Ok(ExitCode::FAILURE)
        }
        Err(e @ (QueryError::Invalid(_) | QueryError::Unavailable(_) | QueryError::Cancelled)) => {
            eprintln!("{} {}", style("✗").red(), e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
