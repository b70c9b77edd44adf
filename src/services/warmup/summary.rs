//! Per-kind counters and the end-of-run summary.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use super::plan::Module;

#[derive(Debug, Default)]
pub(super) struct Counter {
    tasks: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
}

/// Shared counters, one per selected module. Built once; never resized.
#[derive(Debug, Default)]
pub(super) struct Counters(BTreeMap<Module, Counter>);

impl Counters {
    pub(super) fn new(modules: &[Module]) -> Self {
        Self(modules.iter().map(|m| (*m, Counter::default())).collect())
    }

    pub(super) fn record(&self, module: Module, written: usize, failed: usize) {
        if let Some(counter) = self.0.get(&module) {
            counter.tasks.fetch_add(1, Ordering::Relaxed);
            counter.written.fetch_add(written as u64, Ordering::Relaxed);
            counter.failed.fetch_add(failed as u64, Ordering::Relaxed);
        }
    }

    pub(super) fn snapshot(&self) -> BTreeMap<Module, ModuleSummary> {
        self.0
            .iter()
            .map(|(module, counter)| {
                (
                    *module,
                    ModuleSummary {
                        tasks: counter.tasks.load(Ordering::Relaxed),
                        written: counter.written.load(Ordering::Relaxed),
                        failed: counter.failed.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    /// Tasks that ran to completion (successfully or not).
    pub tasks: u64,
    pub written: u64,
    /// Failed tasks or sub-fetches.
    pub failed: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmupSummary {
    pub modules: BTreeMap<Module, ModuleSummary>,
    /// Rows removed by `reset`.
    pub purged: u64,
    /// Tasks never started because the run was cut short.
    pub skipped: usize,
    pub timed_out: bool,
    pub cancelled: bool,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl WarmupSummary {
    /// Any failure, skipped task, timeout or cancellation.
    pub fn has_errors(&self) -> bool {
        self.timed_out
            || self.cancelled
            || self.skipped > 0
            || self.modules.values().any(|m| m.failed > 0)
    }

    pub fn total_written(&self) -> u64 {
        self.modules.values().map(|m| m.written).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.modules.values().map(|m| m.failed).sum()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
