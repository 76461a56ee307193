use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileProgress {
    StagedConcurrency {
        total_duration: Duration,
        active_workers: u64,
        /// `None` once the schedule is over.
        stage: Option<StageProgress>,
    },
    ConstantArrivalRate {
        total_duration: Duration,
        arrivals_scheduled: u64,
        arrivals_total: u64,
        busy_workers: u64,
        pool_size: u64,
        max_workers: u64,
    },
}

impl ProfileProgress {
    pub fn total_duration(&self) -> Duration {
        match self {
            Self::StagedConcurrency { total_duration, .. }
            | Self::ConstantArrivalRate { total_duration, .. } => *total_duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    pub iterations_total: u64,
    /// Iterations/sec observed during the last progress interval.
    pub iterations_per_sec_now: f64,
    pub requests_total: u64,
    pub checks_failed_total: u64,
    pub missed_arrivals_total: u64,
    pub progress: ProfileProgress,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
