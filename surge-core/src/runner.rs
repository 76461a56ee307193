mod arrival;
mod checks;
mod config;
mod error;
mod pool;
mod progress;
mod run;
mod schedule;
mod stats;
mod vu;

pub use arrival::ArrivalPlan;
pub use checks::{CheckRecorder, CheckSummary};
pub use config::{
    DEFAULT_CONTROL_INTERVAL, DEFAULT_GRACE_PERIOD, DEFAULT_REQUEST_TIMEOUT, HostAddress,
    ProfileKind, RunSettings, Stage, TrafficProfile,
};
pub use error::{CapacityExceeded, Error, Result};
pub use pool::{Dispatch, WorkerPool};
pub use progress::{ProfileProgress, ProgressFn, ProgressUpdate, StageProgress};
pub use run::{run_profile, run_profile_with_transport};
pub use schedule::{StageSnapshot, StagedSchedule};
pub use stats::{LatencySummary, RunStats, RunSummary};
pub use vu::IterationContext;
