use hdrhistogram::Histogram;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use surge_http::HttpTransportErrorKind;

use super::checks::{CheckRecorder, CheckSummary};
use crate::scenario::ScenarioResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_duration: Duration,
    pub iterations_total: u64,
    pub requests_total: u64,
    pub transport_errors_total: u64,
    pub transport_errors: Vec<(HttpTransportErrorKind, u64)>,
    /// Arrivals that found the pool exhausted (constant-rate runs only).
    pub missed_arrivals_total: u64,
    pub peak_workers: u64,
    /// Workers still running when the drain grace period ran out.
    pub aborted_workers: u64,
    /// Workers that died from a panic in scenario or check code.
    pub panicked_workers: u64,
    pub checks_total: u64,
    pub checks_failed: u64,
    pub checks_by_name: Vec<CheckSummary>,
    /// Latency of requests that got a response.
    pub latency: Option<LatencySummary>,
}

impl RunSummary {
    pub fn checks_passed(&self) -> u64 {
        self.checks_total.saturating_sub(self.checks_failed)
    }

    pub fn iterations_per_sec(&self) -> f64 {
        let secs = self.run_duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.iterations_total as f64 / secs
    }
}

/// Run-wide counters, updated concurrently by every worker.
#[derive(Debug)]
pub struct RunStats {
    iterations_total: AtomicU64,
    requests_total: AtomicU64,
    transport_errors_total: AtomicU64,
    transport_errors: DashMap<HttpTransportErrorKind, u64>,
    missed_arrivals_total: AtomicU64,
    active_workers: AtomicU64,
    peak_workers: AtomicU64,
    aborted_workers: AtomicU64,
    panicked_workers: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
    checks: Arc<CheckRecorder>,
}

impl Default for RunStats {
    fn default() -> Self {
        fn new_hist() -> Histogram<u64> {
            // Track up to 10 minutes in microseconds (with 3 sigfigs).
            Histogram::<u64>::new_with_bounds(1, 600_000_000, 3)
                .unwrap_or_else(|err| panic!("failed to init histogram: {err}"))
        }

        Self {
            iterations_total: AtomicU64::new(0),
            requests_total: AtomicU64::new(0),
            transport_errors_total: AtomicU64::new(0),
            transport_errors: DashMap::new(),
            missed_arrivals_total: AtomicU64::new(0),
            active_workers: AtomicU64::new(0),
            peak_workers: AtomicU64::new(0),
            aborted_workers: AtomicU64::new(0),
            panicked_workers: AtomicU64::new(0),
            latency_us: Mutex::new(new_hist()),
            checks: Arc::new(CheckRecorder::new()),
        }
    }
}

impl RunStats {
    pub fn checks(&self) -> &CheckRecorder {
        &self.checks
    }

    /// Consumes the outcome of one iteration.
    pub fn record_result(&self, result: ScenarioResult) {
        self.iterations_total.fetch_add(1, Ordering::Relaxed);

        if result.request_sent {
            self.requests_total.fetch_add(1, Ordering::Relaxed);
            let us = u64::try_from(result.elapsed.as_micros())
                .unwrap_or(u64::MAX)
                .max(1);
            let mut hist = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            hist.saturating_record(us);
        } else {
            self.transport_errors_total.fetch_add(1, Ordering::Relaxed);
            if let Some(kind) = result.transport_error {
                *self.transport_errors.entry(kind).or_insert(0) += 1;
            }
        }

        self.checks.record(&result);
    }

    pub fn record_missed_arrival(&self) {
        self.missed_arrivals_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted_workers(&self, n: u64) {
        self.aborted_workers.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_panicked_workers(&self, n: u64) {
        self.panicked_workers.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_active_workers(&self, n: u64) {
        self.active_workers.store(n, Ordering::Relaxed);
        self.peak_workers.fetch_max(n, Ordering::Relaxed);
    }

    pub fn active_workers(&self) -> u64 {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations_total.load(Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn missed_arrivals_total(&self) -> u64 {
        self.missed_arrivals_total.load(Ordering::Relaxed)
    }

    pub fn checks_failed_total(&self) -> u64 {
        self.checks.failed_total()
    }

    /// Mean latency of completed requests so far.
    pub fn latency_mean(&self) -> Option<Duration> {
        let hist = self
            .latency_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if hist.is_empty() {
            return None;
        }
        Some(Duration::from_micros(hist.mean().round() as u64))
    }

    pub fn summarize(&self, run_duration: Duration) -> RunSummary {
        let checks_by_name = self.checks.snapshot();
        let checks_total = checks_by_name.iter().map(CheckSummary::total).sum();
        let checks_failed = checks_by_name.iter().map(|c| c.failed).sum();

        let mut transport_errors: Vec<(HttpTransportErrorKind, u64)> = self
            .transport_errors
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        transport_errors.sort_by(|(a_kind, a), (b_kind, b)| {
            b.cmp(a)
                .then_with(|| a_kind.to_string().cmp(&b_kind.to_string()))
        });

        let latency = {
            let hist = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (!hist.is_empty()).then(|| LatencySummary {
                count: hist.len(),
                mean: Duration::from_micros(hist.mean().round() as u64),
                p50: Duration::from_micros(hist.value_at_quantile(0.50)),
                p90: Duration::from_micros(hist.value_at_quantile(0.90)),
                p95: Duration::from_micros(hist.value_at_quantile(0.95)),
                p99: Duration::from_micros(hist.value_at_quantile(0.99)),
                max: Duration::from_micros(hist.max()),
            })
        };

        RunSummary {
            run_duration,
            iterations_total: self.iterations_total(),
            requests_total: self.requests_total(),
            transport_errors_total: self.transport_errors_total.load(Ordering::Relaxed),
            transport_errors,
            missed_arrivals_total: self.missed_arrivals_total(),
            peak_workers: self.peak_workers.load(Ordering::Relaxed),
            aborted_workers: self.aborted_workers.load(Ordering::Relaxed),
            panicked_workers: self.panicked_workers.load(Ordering::Relaxed),
            checks_total,
            checks_failed,
            checks_by_name,
            latency,
        }
    }
}
