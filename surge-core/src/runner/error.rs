pub type Result<T> = std::result::Result<T, Error>;

/// Rejected run configuration. Returned before any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`stages` must be a non-empty array of {{ duration, target }}")]
    EmptyStages,

    #[error("stage {index} must have a positive `duration`")]
    ZeroStageDuration { index: usize },

    #[error("`rate` must be a positive integer")]
    InvalidRate,

    #[error("`rate` is too high for `time_unit` (arrival interval below 1ns)")]
    RateTooHigh,

    #[error("`time_unit` must be a positive duration")]
    InvalidTimeUnit,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`max_vus` must be a positive integer")]
    InvalidMaxVus,

    #[error("`pre_allocated_vus` must be <= `max_vus`")]
    InvalidPreAllocatedVus,

    #[error("target host must not be empty")]
    EmptyHost,
}

/// A constant arrival rate cannot be sustained within the worker ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sustaining the arrival rate needs {required} concurrent workers but `max_vus` is {max}")]
pub struct CapacityExceeded {
    pub required: u64,
    pub max: u64,
}
