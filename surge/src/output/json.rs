use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use surge_core::runner::{HostAddress, ProfileProgress, ProgressFn, ProgressUpdate, RunSummary};

use super::OutputFormatter;
use crate::scenario_yaml::LoadedScenario;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _loaded: &LoadedScenario, _host: &HostAddress) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let line = build_summary_line(summary);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub workers: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_workers: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrivals_scheduled: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrivals_total: Option<u64>,
    pub iterations_per_sec: f64,
    pub total_iterations: u64,
    pub total_requests: u64,
    pub checks_failed_total: u64,
    pub missed_arrivals_total: u64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    let mut line = JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        workers: 0,
        target_workers: None,
        stage: None,
        arrivals_scheduled: None,
        arrivals_total: None,
        iterations_per_sec: u.iterations_per_sec_now,
        total_iterations: u.iterations_total,
        total_requests: u.requests_total,
        checks_failed_total: u.checks_failed_total,
        missed_arrivals_total: u.missed_arrivals_total,
    };

    match &u.progress {
        ProfileProgress::StagedConcurrency {
            active_workers,
            stage,
            ..
        } => {
            line.workers = *active_workers;
            line.target_workers = stage.as_ref().map(|s| s.current_target);
            line.stage = stage.as_ref().map(|s| s.stage);
        }
        ProfileProgress::ConstantArrivalRate {
            arrivals_scheduled,
            arrivals_total,
            pool_size,
            ..
        } => {
            line.workers = *pool_size;
            line.arrivals_scheduled = Some(*arrivals_scheduled);
            line.arrivals_total = Some(*arrivals_total);
        }
    }

    line
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub duration_secs: f64,
    pub iterations_total: u64,
    pub requests_total: u64,
    pub transport_errors_total: u64,
    pub transport_errors: BTreeMap<String, u64>,
    pub missed_arrivals_total: u64,
    pub peak_workers: u64,
    pub aborted_workers: u64,
    pub panicked_workers: u64,
    pub checks_total: u64,
    pub checks_failed_total: u64,
    pub checks: Vec<JsonCheckSummary>,
    pub latency: Option<JsonLatencySummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonCheckSummary {
    pub name: String,
    pub passed: u64,
    pub failed: u64,
}

/// Latencies in milliseconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
}

fn build_summary_line(summary: &RunSummary) -> JsonSummaryLine {
    let ms = |d: std::time::Duration| d.as_secs_f64() * 1_000.0;

    JsonSummaryLine {
        kind: "summary",
        duration_secs: summary.run_duration.as_secs_f64(),
        iterations_total: summary.iterations_total,
        requests_total: summary.requests_total,
        transport_errors_total: summary.transport_errors_total,
        transport_errors: summary
            .transport_errors
            .iter()
            .map(|(kind, count)| (kind.to_string(), *count))
            .collect(),
        missed_arrivals_total: summary.missed_arrivals_total,
        peak_workers: summary.peak_workers,
        aborted_workers: summary.aborted_workers,
        panicked_workers: summary.panicked_workers,
        checks_total: summary.checks_total,
        checks_failed_total: summary.checks_failed,
        checks: summary
            .checks_by_name
            .iter()
            .map(|c| JsonCheckSummary {
                name: c.name.clone(),
                passed: c.passed,
                failed: c.failed,
            })
            .collect(),
        latency: summary.latency.as_ref().map(|l| JsonLatencySummary {
            p50: ms(l.p50),
            p90: ms(l.p90),
            p95: ms(l.p95),
            p99: ms(l.p99),
            max: ms(l.max),
            mean: ms(l.mean),
            count: l.count,
        }),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
