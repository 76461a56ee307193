use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::{Scenario, Transport};

use super::config::HostAddress;
use super::pool::WorkerPool;
use super::stats::RunStats;

/// Everything a scenario may see during one iteration.
#[derive(Clone)]
pub struct IterationContext {
    pub worker_id: u64,
    /// 0-based iteration counter of this worker.
    pub iteration: u64,
    pub target: HostAddress,
    pub transport: Arc<dyn Transport>,
    pub request_timeout: Option<Duration>,
    pub run_started: Instant,
}

impl IterationContext {
    pub fn new(
        worker_id: u64,
        iteration: u64,
        target: HostAddress,
        transport: Arc<dyn Transport>,
        request_timeout: Option<Duration>,
        run_started: Instant,
    ) -> Self {
        Self {
            worker_id,
            iteration,
            target,
            transport,
            request_timeout,
            run_started,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.run_started.elapsed()
    }
}

impl fmt::Debug for IterationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterationContext")
            .field("worker_id", &self.worker_id)
            .field("iteration", &self.iteration)
            .field("target", &self.target)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// State shared by every worker of one run.
pub(crate) struct WorkerShared {
    pub scenario: Arc<dyn Scenario>,
    pub transport: Arc<dyn Transport>,
    pub stats: Arc<RunStats>,
    pub target: HostAddress,
    pub request_timeout: Option<Duration>,
    pub run_started: Instant,
}

impl WorkerShared {
    async fn run_iteration(&self, worker_id: u64, iteration: u64) {
        let ctx = IterationContext::new(
            worker_id,
            iteration,
            self.target.clone(),
            self.transport.clone(),
            self.request_timeout,
            self.run_started,
        );
        let result = self.scenario.run(&ctx).await;
        self.stats.record_result(result);
    }
}

/// Loops back-to-back until asked to retire. The current iteration always completes.
pub(crate) async fn staged_worker(
    shared: Arc<WorkerShared>,
    worker_id: u64,
    retire: Arc<AtomicBool>,
) {
    tracing::debug!(worker_id, "worker started");

    let mut iteration = 0u64;
    while !retire.load(Ordering::Acquire) {
        shared.run_iteration(worker_id, iteration).await;
        iteration = iteration.saturating_add(1);
        // Iterations that fail without suspending must not pin the runtime thread.
        tokio::task::yield_now().await;
    }

    tracing::debug!(worker_id, iterations = iteration, "worker retired");
}

/// Hands the worker's slot back to the pool when an iteration ends, even by panic.
struct BusySlot<'a>(&'a WorkerPool);

impl Drop for BusySlot<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lose_worker();
        } else {
            self.0.release();
        }
    }
}

/// Runs one iteration per claimed arrival, then goes back to idle.
pub(crate) async fn arrival_worker(
    shared: Arc<WorkerShared>,
    pool: Arc<WorkerPool>,
    worker_id: u64,
) {
    tracing::debug!(worker_id, "worker started");

    let mut iteration = 0u64;
    while pool.claim_next().await {
        let _slot = BusySlot(&pool);
        shared.run_iteration(worker_id, iteration).await;
        iteration = iteration.saturating_add(1);
    }

    tracing::debug!(worker_id, iterations = iteration, "worker stopped");
}
