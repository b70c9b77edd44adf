//! Warmup pipeline: fill the cache ahead of user queries.
//!
//! Tasks are queued on a bounded channel sized to the task count and drained
//! by a fixed pool of workers. A task failure is logged and counted; it never
//! stops the pool. The whole run shares one cancellation token which the
//! timeout fires.

mod plan;
mod summary;

pub use plan::{parse_modules, Module, UnknownModule, WarmupPlan, WarmupTask, STUDENT_YEAR_SPAN};
pub use summary::{ModuleSummary, WarmupSummary};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::EducationCode;
use crate::repository::{CourseTable, Store, StoreError};
use crate::scrapers::{CampusSource, ScrapeError};
use summary::Counters;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct WarmupOptions {
    pub modules: Vec<Module>,
    pub workers: usize,
    pub timeout: Duration,
    /// Purge every table before filling.
    pub reset: bool,
}

impl Default for WarmupOptions {
    fn default() -> Self {
        Self {
            modules: Module::DEFAULT.to_vec(),
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            reset: false,
        }
    }
}

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Records written and sub-fetches failed by one task.
#[derive(Debug, Default, Clone, Copy)]
struct Outcome {
    written: usize,
    failed: usize,
}

impl Outcome {
    fn written(written: usize) -> Self {
        Self { written, failed: 0 }
    }

    fn add(&mut self, other: Outcome) {
        self.written += other.written;
        self.failed += other.failed;
    }
}

pub struct Warmup {
    store: Store,
    source: Arc<dyn CampusSource>,
}

impl Warmup {
    pub fn new(store: Store, source: Arc<dyn CampusSource>) -> Self {
        Self { store, source }
    }

    /// Run the selected modules. Only a failed purge is returned as an error;
    /// everything else ends up in the summary.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        options: &WarmupOptions,
        plan: &WarmupPlan,
    ) -> Result<WarmupSummary, StoreError> {
        let started = Instant::now();
        let mut summary = WarmupSummary::default();

        if options.reset {
            let purged = self.store.purge_all()?;
            info!("Purged {} cached rows before warmup", purged.total());
            summary.purged = purged.total();
        }

        let tasks = plan.tasks(&options.modules);
        if options.modules.contains(&Module::Stickers) && plan.sticker_sources.is_empty() {
            warn!("Sticker warmup selected but no sticker sources are configured");
        }
        let total = tasks.len();
        let counters = Arc::new(Counters::new(&options.modules));
        if total == 0 {
            summary.modules = counters.snapshot();
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        let (tx, rx) = mpsc::channel(total);
        for task in tasks {
            // Capacity equals the task count, so this never waits
            if tx.send(task).await.is_err() {
                break;
            }
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));

        let run_cancel = cancel.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = {
            let run_cancel = run_cancel.clone();
            let timed_out = timed_out.clone();
            let timeout = options.timeout;
            tokio::spawn(async move {
                tokio::select! {
                    _ = run_cancel.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        warn!("Warmup timed out after {:?}", timeout);
                        timed_out.store(true, Ordering::SeqCst);
                        run_cancel.cancel();
                    }
                }
            })
        };

        let workers = options.workers.clamp(1, total);
        info!(
            "Warming {} tasks ({}) with {} workers",
            total,
            options
                .modules
                .iter()
                .map(Module::as_str)
                .collect::<Vec<_>>()
                .join(","),
            workers
        );

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker {
                id,
                store: self.store.clone(),
                source: self.source.clone(),
                counters: counters.clone(),
            };
            handles.push(tokio::spawn(worker.run(rx.clone(), run_cancel.clone())));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Warmup worker panicked: {}", e);
            }
        }

        summary.timed_out = timed_out.load(Ordering::SeqCst);
        summary.cancelled = cancel.is_cancelled();
        run_cancel.cancel();
        timer.abort();

        summary.skipped = rx.lock().await.len();
        summary.modules = counters.snapshot();
        summary.elapsed = started.elapsed();
        info!(
            "Warmup finished in {:.1}s: {} written, {} failed, {} skipped",
            summary.elapsed.as_secs_f64(),
            summary.total_written(),
            summary.total_failed(),
            summary.skipped
        );
        Ok(summary)
    }
}

struct Worker {
    id: usize,
    store: Store,
    source: Arc<dyn CampusSource>,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self, rx: Arc<Mutex<mpsc::Receiver<WarmupTask>>>, cancel: CancellationToken) {
        loop {
            let task = {
                let mut rx = rx.lock().await;
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    task = rx.recv() => task,
                }
            };
            let Some(task) = task else {
                break;
            };

            let module = task.module();
            match self.execute(&cancel, &task).await {
                Ok(outcome) => {
                    debug!(
                        "Worker {} finished {}: {} written",
                        self.id, task, outcome.written
                    );
                    self.counters.record(module, outcome.written, outcome.failed);
                }
                Err(_) if cancel.is_cancelled() => {
                    debug!("Worker {} interrupted during {}", self.id, task);
                    self.counters.record(module, 0, 1);
                    break;
                }
                Err(e) => {
                    warn!("Warmup task {} failed: {}", task, e);
                    self.counters.record(module, 0, 1);
                }
            }
        }
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        task: &WarmupTask,
    ) -> Result<Outcome, TaskError> {
        match task {
            WarmupTask::Students { year, department } => {
                let students = self.source.students_cohort(cancel, *year, department).await?;
                Ok(Outcome::written(self.store.save_students(&students)?))
            }
            WarmupTask::Contacts(kind) => {
                let links = self.source.directory_links(cancel, *kind).await?;
                let mut outcome = Outcome::default();
                for link in links {
                    outcome.add(self.organization(cancel, &link).await?);
                }
                Ok(outcome)
            }
            WarmupTask::Courses(semester) => {
                let mut outcome = Outcome::default();
                for code in EducationCode::ALL {
                    let fetched = self
                        .source
                        .courses_by_code(cancel, *semester, &code.to_string())
                        .await;
                    match fetched {
                        Ok(courses) => outcome.add(Outcome::written(
                            self.store.save_courses(CourseTable::Current, &courses)?,
                        )),
                        Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled.into()),
                        Err(e) => {
                            warn!("Courses {} {} failed: {}", semester, code, e);
                            outcome.failed += 1;
                        }
                    }
                }
                Ok(outcome)
            }
            WarmupTask::Stickers(url) => {
                let stickers = self.source.stickers(cancel, url).await?;
                Ok(Outcome::written(self.store.save_stickers(&stickers)?))
            }
            WarmupTask::Programs => {
                let programs = self.source.programs(cancel).await?;
                Ok(Outcome::written(self.store.save_programs(&programs)?))
            }
        }
    }

    /// One organization page of the directory. Fetch and write failures count
    /// against the task without aborting it; cancellation does abort.
    async fn organization(
        &self,
        cancel: &CancellationToken,
        link: &str,
    ) -> Result<Outcome, TaskError> {
        let failed = Outcome {
            written: 0,
            failed: 1,
        };
        match self.source.contacts_at(cancel, link).await {
            Ok(contacts) => match self.store.save_contacts(&contacts) {
                Ok(written) => Ok(Outcome::written(written)),
                Err(e) => {
                    warn!("Saving contacts from {} failed: {}", link, e);
                    Ok(failed)
                }
            },
            Err(ScrapeError::Cancelled) => Err(ScrapeError::Cancelled.into()),
            Err(e) => {
                warn!("Contacts page {} failed: {}", link, e);
                Ok(failed)
            }
        }
    }
}
