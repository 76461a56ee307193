use std::time::Duration;

use super::config::TrafficProfile;
use super::error::CapacityExceeded;

/// Arrival instants of a constant-rate profile.
///
/// Instant `i` starts at `i * time_unit / rate` after the run start, computed in integer
/// nanoseconds so that rounding never accumulates across a long run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalPlan {
    rate: u64,
    time_unit: Duration,
    duration: Duration,
    pre_allocated: u64,
    max: u64,
}

impl ArrivalPlan {
    pub fn new(
        rate: u64,
        time_unit: Duration,
        duration: Duration,
        pre_allocated: u64,
        max: u64,
    ) -> Self {
        Self {
            rate,
            time_unit,
            duration,
            pre_allocated,
            max,
        }
    }

    /// Builds the plan for a constant-rate profile; `None` for staged profiles.
    pub fn from_profile(profile: &TrafficProfile) -> Option<Self> {
        match profile {
            TrafficProfile::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                pre_allocated,
                max,
            } => Some(Self::new(
                *rate,
                *time_unit,
                *duration,
                *pre_allocated,
                *max,
            )),
            TrafficProfile::StagedConcurrency { .. } => None,
        }
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn pre_allocated(&self) -> u64 {
        self.pre_allocated
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Target inter-arrival interval (`time_unit / rate`, truncated to whole nanoseconds).
    pub fn interval(&self) -> Duration {
        if self.rate == 0 {
            return self.time_unit;
        }
        nanos(self.time_unit.as_nanos() / u128::from(self.rate))
    }

    /// Number of arrivals that fit in `duration`: `floor(duration * rate / time_unit)`.
    pub fn total_arrivals(&self) -> u64 {
        let unit = self.time_unit.as_nanos().max(1);
        let scaled = self.duration.as_nanos().saturating_mul(u128::from(self.rate));
        u64::try_from(scaled / unit).unwrap_or(u64::MAX)
    }

    /// Offset of arrival `index` from the run start.
    pub fn offset_of(&self, index: u64) -> Duration {
        if self.rate == 0 {
            return self.duration;
        }
        let scaled = u128::from(index).saturating_mul(self.time_unit.as_nanos());
        nanos(scaled / u128::from(self.rate))
    }

    pub fn rate_per_sec(&self) -> f64 {
        let unit = self.time_unit.as_secs_f64();
        if unit <= 0.0 {
            return 0.0;
        }
        self.rate as f64 / unit
    }

    /// Concurrent workers needed to sustain the rate when one iteration takes `latency`.
    ///
    /// Uses Little's law (`rate * latency`, rounded up) and never reports fewer than the
    /// pre-allocated pool.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded`] if the estimate is above `max`.
    pub fn required_workers(&self, latency: Duration) -> Result<u64, CapacityExceeded> {
        let unit = self.time_unit.as_nanos().max(1);
        let in_flight = latency
            .as_nanos()
            .saturating_mul(u128::from(self.rate))
            .div_ceil(unit);
        let required = u64::try_from(in_flight)
            .unwrap_or(u64::MAX)
            .max(self.pre_allocated)
            .max(1);

        if required > self.max {
            return Err(CapacityExceeded {
                required,
                max: self.max,
            });
        }
        Ok(required)
    }
}

fn nanos(n: u128) -> Duration {
    Duration::from_nanos(u64::try_from(n).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn post_user_plan(duration: Duration) -> ArrivalPlan {
        ArrivalPlan::new(50, secs(1), duration, 20, 100)
    }

    #[test]
    fn interval_is_time_unit_over_rate() {
        assert_eq!(post_user_plan(secs(5)).interval(), Duration::from_millis(20));
        assert_eq!(
            ArrivalPlan::new(3, secs(1), secs(1), 1, 1).interval(),
            Duration::from_nanos(333_333_333)
        );
    }

    #[test]
    fn total_arrivals_is_floor_of_duration_over_interval() {
        assert_eq!(post_user_plan(secs(5)).total_arrivals(), 250);
        assert_eq!(post_user_plan(secs(300)).total_arrivals(), 15_000);

        // 3/s over 1.5s => 4.5 => 4.
        let plan = ArrivalPlan::new(3, secs(1), Duration::from_millis(1_500), 1, 1);
        assert_eq!(plan.total_arrivals(), 4);

        // 7 per minute over 30s => 3.5 => 3.
        let plan = ArrivalPlan::new(7, secs(60), secs(30), 1, 1);
        assert_eq!(plan.total_arrivals(), 3);
    }

    #[test]
    fn offsets_do_not_accumulate_rounding() {
        let plan = ArrivalPlan::new(3, secs(1), secs(10), 1, 1);
        assert_eq!(plan.offset_of(0), Duration::ZERO);
        assert_eq!(plan.offset_of(3), secs(1));
        assert_eq!(plan.offset_of(30), secs(10));
        assert_eq!(plan.offset_of(1), Duration::from_nanos(333_333_333));
    }

    #[test]
    fn every_offset_falls_inside_the_run() {
        let plan = post_user_plan(secs(5));
        let last = plan.total_arrivals().saturating_sub(1);
        assert!(plan.offset_of(last) < plan.duration());
        assert!(plan.offset_of(last.saturating_add(1)) >= plan.duration());
    }

    #[test]
    fn required_workers_follows_littles_law() {
        let plan = post_user_plan(secs(5));

        // 50/s * 100ms = 5 in flight; never below the pre-allocated pool.
        assert_eq!(plan.required_workers(Duration::from_millis(100)), Ok(20));
        // 50/s * 1s = 50.
        assert_eq!(plan.required_workers(secs(1)), Ok(50));
        // 50/s * 1.01s = 50.5 => 51.
        assert_eq!(plan.required_workers(Duration::from_millis(1_010)), Ok(51));
    }

    #[test]
    fn required_workers_reports_capacity_exceeded() {
        let plan = post_user_plan(secs(5));
        assert_eq!(
            plan.required_workers(secs(3)),
            Err(CapacityExceeded {
                required: 150,
                max: 100
            })
        );
    }

    #[test]
    fn from_profile_only_accepts_arrival_rate() {
        let profile = TrafficProfile::ConstantArrivalRate {
            rate: 50,
            time_unit: secs(1),
            duration: secs(5),
            pre_allocated: 20,
            max: 100,
        };
        assert_eq!(
            ArrivalPlan::from_profile(&profile),
            Some(post_user_plan(secs(5)))
        );
        assert_eq!(ArrivalPlan::from_profile(&TrafficProfile::staged(vec![])), None);
    }
}
