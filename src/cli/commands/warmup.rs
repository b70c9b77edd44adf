//! Warmup command.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use console::style;

use crate::config::{parse_duration, Settings};
use crate::models::campus_today;
use crate::services::{parse_modules, Module, Warmup};

pub struct WarmupArgs {
    pub modules: Option<String>,
    pub reset: bool,
    pub workers: Option<usize>,
    pub timeout: Option<String>,
}

/// Fill the cache. Exits with 1 when any module reported errors.
pub async fn cmd_warmup(settings: &Settings, args: WarmupArgs) -> anyhow::Result<ExitCode> {
    let mut options = settings.warmup_options();
    options.reset = args.reset;
    if let Some(csv) = &args.modules {
        options.modules = parse_modules(csv)?;
    }
    if let Some(workers) = args.workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        options.workers = workers;
    }
    if let Some(timeout) = &args.timeout {
        options.timeout =
            parse_duration(timeout).ok_or_else(|| anyhow!("invalid --timeout {timeout:?}"))?;
    }
    if options.modules.is_empty() {
        bail!("no warmup modules selected");
    }

    let store = settings.open_store()?;
    let source = Arc::new(super::campus_scraper(settings)?);
    let plan = settings.warmup_plan(campus_today());
    let cancel = super::interrupt_token();

    println!(
        "{} Warming {} into {}{}",
        style("→").cyan(),
        options
            .modules
            .iter()
            .map(Module::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        settings.database_path.display(),
        if options.reset { " (reset)" } else { "" }
    );

    let summary = Warmup::new(store, source)
        .run(&cancel, &options, &plan)
        .await?;

    for (module, counts) in &summary.modules {
        let mark = if counts.failed > 0 {
            style("!").yellow()
        } else {
            style("✓").green()
        };
        println!(
            "  {} {:<10} {:>6} written  {:>4} failed  ({} tasks)",
            mark, module, counts.written, counts.failed, counts.tasks
        );
    }
    if summary.purged > 0 {
        println!("  purged {} rows first", summary.purged);
    }
    if summary.skipped > 0 {
        println!("  {} {} tasks not started", style("!").yellow(), summary.skipped);
    }
    if summary.timed_out {
        println!("  {} timed out after {:?}", style("✗").red(), options.timeout);
    }
    println!("  finished in {:.1}s", summary.elapsed.as_secs_f64());

    Ok(if summary.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
