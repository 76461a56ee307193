use std::sync::{Arc, OnceLock};

mod format;
mod progress;
mod summary;

use format::{format_duration, format_rate};
use progress::HumanProgress;
use summary::render;
use surge_core::runner::{HostAddress, ProfileProgress, ProgressFn, RunSummary, TrafficProfile};

use super::OutputFormatter;
use crate::scenario_yaml::LoadedScenario;

pub(crate) struct HumanReadableOutput {
    progress: OnceLock<Arc<HumanProgress>>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: OnceLock::new(),
        }
    }

    fn bar(&self) -> Arc<HumanProgress> {
        self.progress
            .get_or_init(|| Arc::new(HumanProgress::new("run")))
            .clone()
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, loaded: &LoadedScenario, host: &HostAddress) {
        let _ = self
            .progress
            .set(Arc::new(HumanProgress::new(loaded.name.clone())));

        println!("scenario: {}", loaded.name);
        println!("target: {host}");
        match &loaded.profile {
            TrafficProfile::StagedConcurrency {
                start_target,
                stages,
            } => {
                let stages = stages
                    .iter()
                    .map(|s| format!("{}→{}", format_duration(s.duration), s.target))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("profile: ramping-vus start={start_target} stages=[{stages}]");
            }
            TrafficProfile::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                pre_allocated,
                max,
            } => {
                println!(
                    "profile: constant-arrival-rate rate={rate}/{} duration={} pre_allocated={pre_allocated} max={max}",
                    format_duration(*time_unit),
                    format_duration(*duration),
                );
            }
        }
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let bar = self.bar();

        Some(Arc::new(move |u| {
            let rates = format!(
                " iters/s={} checks_failed={}",
                format_rate(u.iterations_per_sec_now),
                u.checks_failed_total
            );

            let message = match &u.progress {
                ProfileProgress::StagedConcurrency {
                    active_workers,
                    stage,
                    ..
                } => match stage {
                    Some(stage) => format!(
                        "stage={}/{} vus={active_workers}/{} elapsed={} stage_remaining={}{rates}",
                        stage.stage,
                        stage.stages,
                        stage.current_target,
                        format_duration(u.elapsed),
                        format_duration(stage.stage_remaining),
                    ),
                    None => format!(
                        "vus={active_workers} elapsed={}{rates}",
                        format_duration(u.elapsed)
                    ),
                },
                ProfileProgress::ConstantArrivalRate {
                    arrivals_scheduled,
                    arrivals_total,
                    busy_workers,
                    pool_size,
                    max_workers,
                    ..
                } => format!(
                    "arrivals={arrivals_scheduled}/{arrivals_total} busy={busy_workers} pool={pool_size}/{max_workers} missed={} elapsed={}{rates}",
                    u.missed_arrivals_total,
                    format_duration(u.elapsed),
                ),
            };

            bar.update(u.progress.total_duration(), u.elapsed, message);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        if let Some(bar) = self.progress.get() {
            bar.finish();
        }
        print!("{}", render(summary));
        Ok(())
    }
}
