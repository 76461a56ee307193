use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::scenario::ScenarioResult;

#[derive(Debug, Default)]
struct CheckCounters {
    passed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passed: u64,
    pub failed: u64,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passed.saturating_add(self.failed)
    }
}

/// Per-check-name pass/fail counters for one run.
///
/// Each bucket is a pair of atomics behind an `Arc`, so concurrent recorders never lose an
/// increment and only the first sighting of a new name touches the map's write path.
#[derive(Debug, Default)]
pub struct CheckRecorder {
    buckets: DashMap<Arc<str>, Arc<CheckCounters>>,
}

impl CheckRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty buckets so that checks that never ran still show up in the summary.
    pub fn register<I>(&self, names: I)
    where
        I: IntoIterator<Item = Arc<str>>,
    {
        for name in names {
            self.buckets.entry(name).or_default();
        }
    }

    pub fn record(&self, result: &ScenarioResult) {
        for outcome in &result.checks {
            self.record_outcome(&outcome.name, outcome.passed);
        }
    }

    pub fn record_outcome(&self, name: &str, passed: bool) {
        let counters = self.bucket(name);
        if passed {
            counters.passed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn bucket(&self, name: &str) -> Arc<CheckCounters> {
        if let Some(existing) = self.buckets.get(name) {
            return existing.value().clone();
        }
        self.buckets.entry(Arc::from(name)).or_default().value().clone()
    }

    pub fn failed_total(&self) -> u64 {
        self.buckets
            .iter()
            .map(|b| b.value().failed.load(Ordering::Relaxed))
            .sum()
    }

    /// Snapshot sorted by check name.
    pub fn snapshot(&self) -> Vec<CheckSummary> {
        let mut out: Vec<CheckSummary> = self
            .buckets
            .iter()
            .map(|b| CheckSummary {
                name: b.key().to_string(),
                passed: b.value().passed.load(Ordering::Relaxed),
                failed: b.value().failed.load(Ordering::Relaxed),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
