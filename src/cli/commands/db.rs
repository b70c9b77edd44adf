//! Cache maintenance commands.

use std::process::ExitCode;

use console::style;

use crate::config::Settings;
use crate::repository::StoreCounts;

/// Delete every cached row.
pub fn cmd_purge(settings: &Settings) -> anyhow::Result<ExitCode> {
    let store = settings.open_store()?;
    let purged = store.purge_all()?;
    println!(
        "{} Purged {} rows from {}",
        style("✓").green(),
        purged.total(),
        settings.database_path.display()
    );
    print_counts(&purged);
    Ok(ExitCode::SUCCESS)
}

/// Show per-table row counts.
pub fn cmd_stats(settings: &Settings, json: bool) -> anyhow::Result<ExitCode> {
    let store = settings.open_store()?;
    let counts = store.counts()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} Cache statistics", style("→").cyan());
    println!("  Database: {}", settings.database_path.display());
    println!("  TTL: {}s", settings.cache_ttl.as_secs());
    print_counts(&counts);
    Ok(ExitCode::SUCCESS)
}

fn print_counts(counts: &StoreCounts) {
    let rows = [
        ("students", counts.students),
        ("contacts", counts.contacts),
        ("courses", counts.courses),
        ("historical_courses", counts.historical_courses),
        ("stickers", counts.stickers),
        ("programs", counts.programs),
    ];
    for (table, count) in rows {
        println!("  {:<20} {:>8}", table, count);
    }
    println!("  {:<20} {:>8}", style("total").bold(), counts.total());
}
