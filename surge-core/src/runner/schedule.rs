use std::time::Duration;

use super::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear worker target over a list of stages.
#[derive(Debug, Clone)]
pub struct StagedSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl StagedSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether `elapsed` is past the end of the last stage.
    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed > self.total_duration()
    }

    /// Target worker count at `elapsed`, rounded to the nearest integer.
    ///
    /// Returns `None` once `elapsed` passes the end of the last stage. At every stage
    /// boundary the value is exactly that stage's target.
    pub fn target_at(&self, elapsed: Duration) -> Option<u64> {
        if self.is_done(elapsed) {
            return None;
        }
        if elapsed.is_zero() || self.stages.is_empty() {
            return Some(self.start);
        }

        let idx = self.stage_index(elapsed);
        let (stage_start, stage_end) = self.stage_bounds(idx);
        let start_target = self.stage_start_target(idx);
        let end_target = self.stages.get(idx).map_or(self.start, |s| s.target);

        Some(interpolate(
            start_target,
            end_target,
            elapsed.saturating_sub(stage_start),
            stage_end.saturating_sub(stage_start),
        ))
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.stages.is_empty() {
            return None;
        }

        let total = self.total_duration();
        let clamped = elapsed.min(total);

        let idx = if clamped >= total {
            self.stages.len().saturating_sub(1)
        } else {
            self.stage_index(clamped)
        };

        let (stage_start, stage_end) = self.stage_bounds(idx);
        let stage_duration = stage_end.saturating_sub(stage_start);
        let stage_elapsed = clamped.saturating_sub(stage_start);
        let stage_remaining = stage_duration.saturating_sub(stage_elapsed);

        Some(StageSnapshot {
            index: idx,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining,
            start_target: self.stage_start_target(idx),
            end_target: self.stages.get(idx).map_or(self.start, |s| s.target),
            current_target: self.target_at(clamped).unwrap_or(0),
        })
    }

    /// Index of the stage containing `elapsed`; a boundary belongs to the stage it ends.
    fn stage_index(&self, elapsed: Duration) -> usize {
        let idx = match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) => i,
            Err(i) => i,
        };
        idx.min(self.stages.len().saturating_sub(1))
    }

    fn stage_bounds(&self, idx: usize) -> (Duration, Duration) {
        let end = self
            .cumulative_ends
            .get(idx)
            .copied()
            .unwrap_or(Duration::ZERO);
        let start = match idx.checked_sub(1) {
            Some(prev) => self
                .cumulative_ends
                .get(prev)
                .copied()
                .unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        };
        (start, end)
    }

    fn stage_start_target(&self, idx: usize) -> u64 {
        match idx.checked_sub(1) {
            Some(prev) => self.stages.get(prev).map_or(self.start, |s| s.target),
            None => self.start,
        }
    }
}

/// `start + (end - start) * num / den`, rounded to the nearest integer (halves round up).
fn interpolate(start: u64, end: u64, num: Duration, den: Duration) -> u64 {
    if den.is_zero() || num >= den {
        return end;
    }

    let start_i = i128::from(start);
    let delta = i128::from(end) - start_i;
    let num = num.as_nanos() as i128;
    let den = den.as_nanos() as i128;

    // Round to nearest: floor((2 * delta * num + den) / (2 * den)).
    let scaled = delta.saturating_mul(num).saturating_mul(2).saturating_add(den);
    let step = scaled.div_euclid(den.saturating_mul(2));

    (start_i + step).clamp(0, i128::from(u64::MAX)) as u64
}
