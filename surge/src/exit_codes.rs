#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more checks failed.
    ChecksFailed = 10,

    /// One or more arrivals were missed because the worker pool was exhausted.
    MissedArrivals = 11,

    /// Checks failed and arrivals were missed.
    ChecksFailedAndMissedArrivals = 12,

    /// Invalid CLI/config input (bad flags, unreadable or invalid scenario file, empty host).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, worker task failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_run_outcome(checks_failed: bool, arrivals_missed: bool) -> Self {
        match (checks_failed, arrivals_missed) {
            (false, false) => Self::Success,
            (true, false) => Self::ChecksFailed,
            (false, true) => Self::MissedArrivals,
            (true, true) => Self::ChecksFailedAndMissedArrivals,
        }
    }
}
