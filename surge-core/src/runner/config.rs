use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::error::{Error, Result};

pub const DEFAULT_CONTROL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    #[must_use]
    pub const fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficProfile {
    /// Ramp the number of concurrently looping workers across stages.
    StagedConcurrency { start_target: u64, stages: Vec<Stage> },

    /// Start `rate` iterations per `time_unit` for `duration`, independent of latency.
    ConstantArrivalRate {
        rate: u64,
        time_unit: Duration,
        duration: Duration,
        pre_allocated: u64,
        max: u64,
    },
}

/// Profile kind (the string form used in scenario files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ProfileKind {
    #[strum(serialize = "ramping-vus", serialize = "staged")]
    StagedConcurrency,

    #[strum(serialize = "constant-arrival-rate", serialize = "constant-rps")]
    ConstantArrivalRate,
}

impl TrafficProfile {
    /// Staged profile ramping up from zero workers.
    #[must_use]
    pub fn staged(stages: Vec<Stage>) -> Self {
        Self::StagedConcurrency {
            start_target: 0,
            stages,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProfileKind {
        match self {
            Self::StagedConcurrency { .. } => ProfileKind::StagedConcurrency,
            Self::ConstantArrivalRate { .. } => ProfileKind::ConstantArrivalRate,
        }
    }

    /// Checks the profile invariants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty stage list, a zero-length stage, a
    /// non-positive rate, time unit or duration, or a worker pool with `pre_allocated > max`.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::StagedConcurrency { stages, .. } => {
                if stages.is_empty() {
                    return Err(Error::EmptyStages);
                }
                if let Some(index) = stages.iter().position(|s| s.duration.is_zero()) {
                    return Err(Error::ZeroStageDuration { index });
                }
            }
            Self::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                pre_allocated,
                max,
            } => {
                if *rate == 0 {
                    return Err(Error::InvalidRate);
                }
                if time_unit.is_zero() {
                    return Err(Error::InvalidTimeUnit);
                }
                if time_unit.as_nanos() < u128::from(*rate) {
                    return Err(Error::RateTooHigh);
                }
                if duration.is_zero() {
                    return Err(Error::InvalidDuration);
                }
                if *max == 0 {
                    return Err(Error::InvalidMaxVus);
                }
                if pre_allocated > max {
                    return Err(Error::InvalidPreAllocatedVus);
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        match self {
            Self::StagedConcurrency { stages, .. } => stages
                .iter()
                .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration)),
            Self::ConstantArrivalRate { duration, .. } => *duration,
        }
    }

    /// Upper bound on concurrently running workers.
    #[must_use]
    pub fn max_workers(&self) -> u64 {
        match self {
            Self::StagedConcurrency {
                start_target,
                stages,
            } => stages
                .iter()
                .map(|s| s.target)
                .max()
                .unwrap_or(0)
                .max(*start_target),
            Self::ConstantArrivalRate { max, .. } => *max,
        }
    }
}

/// Target host (`host`, `host:port` or a full `http://` base URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddress(Arc<str>);

impl HostAddress {
    /// # Errors
    ///
    /// Returns [`Error::EmptyHost`] if `raw` is empty or whitespace.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::EmptyHost);
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the host already carries a scheme (`http://...`).
    pub fn has_scheme(&self) -> bool {
        self.0.contains("://")
    }

    /// Whether the authority part already names a port.
    pub fn has_port(&self) -> bool {
        let authority = self.0.split_once("://").map_or(&*self.0, |(_, rest)| rest);
        let authority = authority.split('/').next().unwrap_or(authority);
        match authority.rsplit_once(']') {
            // IPv6 literal, e.g. `[::1]:3000`.
            Some((_, tail)) => tail.starts_with(':'),
            None => authority.contains(':'),
        }
    }
}

impl FromStr for HostAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-run settings shared with every worker iteration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub host: HostAddress,
    /// Upper bound for a single request; `None` disables it.
    pub request_timeout: Option<Duration>,
    /// How often staged runs re-evaluate the target worker count.
    pub control_interval: Duration,
    /// How long the final drain may wait for in-flight iterations.
    pub grace_period: Duration,
    pub progress_interval: Duration,
}

impl RunSettings {
    pub fn new(host: HostAddress) -> Self {
        Self {
            host,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            control_interval: DEFAULT_CONTROL_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
            progress_interval: Duration::from_secs(1),
        }
    }
}
