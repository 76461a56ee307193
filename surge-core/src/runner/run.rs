use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{HttpClient, Scenario, Transport};

use super::arrival::ArrivalPlan;
use super::config::{RunSettings, TrafficProfile};
use super::error::Result;
use super::pool::{Dispatch, WorkerPool};
use super::progress::{ProfileProgress, ProgressFn, ProgressUpdate, StageProgress};
use super::schedule::StagedSchedule;
use super::stats::{RunStats, RunSummary};
use super::vu::{WorkerShared, arrival_worker, staged_worker};

const MISSED_WARN_EVERY: Duration = Duration::from_secs(1);

/// Runs `profile` against `settings.host` over a fresh [`HttpClient`].
pub async fn run_profile(
    profile: &TrafficProfile,
    scenario: Arc<dyn Scenario>,
    settings: RunSettings,
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    profile.validate()?;
    let transport: Arc<dyn Transport> = Arc::new(HttpClient::default());
    run_profile_with_transport(profile, scenario, transport, settings, progress).await
}

/// Runs `profile`, sending every request through `transport`.
///
/// The profile is validated before any worker starts. Transport failures and missed
/// arrivals are counted in the summary and never abort the run.
pub async fn run_profile_with_transport(
    profile: &TrafficProfile,
    scenario: Arc<dyn Scenario>,
    transport: Arc<dyn Transport>,
    settings: RunSettings,
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    profile.validate()?;

    let stats = Arc::new(RunStats::default());
    stats.checks().register(scenario.check_names());

    tracing::info!(
        kind = %profile.kind(),
        host = %settings.host,
        duration = ?profile.total_duration(),
        max_workers = profile.max_workers(),
        "run starting"
    );

    let started = Instant::now();
    let shared = Arc::new(WorkerShared {
        scenario,
        transport,
        stats: stats.clone(),
        target: settings.host.clone(),
        request_timeout: settings.request_timeout,
        run_started: started,
    });

    let (ticker, handles) = match profile {
        TrafficProfile::StagedConcurrency {
            start_target,
            stages,
        } => {
            let schedule = Arc::new(StagedSchedule::new(*start_target, stages.clone()));
            let ticker = progress.map(|progress| {
                let source = ProgressSource::Staged(schedule.clone());
                spawn_progress(
                    progress,
                    source,
                    stats.clone(),
                    started,
                    settings.progress_interval,
                )
            });
            let handles = drive_staged(&schedule, &shared, settings.control_interval).await;
            (ticker, handles)
        }
        TrafficProfile::ConstantArrivalRate {
            rate,
            time_unit,
            duration,
            pre_allocated,
            max,
        } => {
            let plan = ArrivalPlan::new(*rate, *time_unit, *duration, *pre_allocated, *max);
            let pool = Arc::new(WorkerPool::new(plan.pre_allocated(), plan.max()));
            let ticker = progress.map(|progress| {
                let source = ProgressSource::Arrivals {
                    plan,
                    pool: pool.clone(),
                };
                spawn_progress(
                    progress,
                    source,
                    stats.clone(),
                    started,
                    settings.progress_interval,
                )
            });
            let handles = drive_arrivals(&plan, &pool, &shared).await;
            (ticker, handles)
        }
    };

    let drained = drain(handles, settings.grace_period).await;

    if let Some(h) = ticker {
        h.abort();
        let _ = h.await;
    }

    if drained.aborted > 0 {
        tracing::warn!(
            aborted = drained.aborted,
            grace_period = ?settings.grace_period,
            "workers still busy after the grace period were aborted"
        );
        stats.record_aborted_workers(drained.aborted);
    }
    if drained.panicked > 0 {
        stats.record_panicked_workers(drained.panicked);
    }

    let summary = stats.summarize(started.elapsed());
    tracing::info!(
        iterations = summary.iterations_total,
        checks_failed = summary.checks_failed,
        missed_arrivals = summary.missed_arrivals_total,
        elapsed = ?summary.run_duration,
        "run finished"
    );
    Ok(summary)
}

struct StagedWorker {
    handle: JoinHandle<()>,
    retire: Arc<AtomicBool>,
}

/// Control loop for staged runs. Returns every worker handle (active or retiring).
async fn drive_staged(
    schedule: &StagedSchedule,
    shared: &Arc<WorkerShared>,
    control_interval: Duration,
) -> Vec<JoinHandle<()>> {
    let started = shared.run_started;
    let total = schedule.total_duration();
    let end = started + total;
    let control_interval = control_interval.max(Duration::from_millis(1));

    let mut active: Vec<StagedWorker> = Vec::new();
    let mut retiring: Vec<JoinHandle<()>> = Vec::new();
    let mut next_worker_id = 0u64;
    let mut next_tick = started;

    loop {
        let elapsed = started.elapsed();
        let Some(target) = schedule.target_at(elapsed) else {
            break;
        };

        // Workers that died (panicked) are replaced at this tick.
        let (dead, alive): (Vec<_>, Vec<_>) =
            active.into_iter().partition(|w| w.handle.is_finished());
        active = alive;
        retiring.extend(dead.into_iter().map(|w| w.handle));

        let current = active.len() as u64;
        if target > current {
            for _ in current..target {
                let retire = Arc::new(AtomicBool::new(false));
                let handle = tokio::spawn(staged_worker(
                    shared.clone(),
                    next_worker_id,
                    retire.clone(),
                ));
                next_worker_id = next_worker_id.saturating_add(1);
                active.push(StagedWorker { handle, retire });
            }
        } else if target < current {
            // Most recently started first.
            for _ in target..current {
                if let Some(w) = active.pop() {
                    w.retire.store(true, Ordering::Release);
                    retiring.push(w.handle);
                }
            }
        }
        if target != current {
            tracing::debug!(?elapsed, from = current, to = target, "adjusted workers");
        }
        shared.stats.set_active_workers(active.len() as u64);

        if elapsed >= total {
            break;
        }
        next_tick += control_interval;
        tokio::time::sleep_until(next_tick.min(end)).await;
    }

    for w in active {
        w.retire.store(true, Ordering::Release);
        retiring.push(w.handle);
    }
    shared.stats.set_active_workers(0);
    retiring
}

/// Arrival generator for constant-rate runs. Returns every worker handle.
async fn drive_arrivals(
    plan: &ArrivalPlan,
    pool: &Arc<WorkerPool>,
    shared: &Arc<WorkerShared>,
) -> Vec<JoinHandle<()>> {
    let started = shared.run_started;
    let stats = &shared.stats;

    let spawn =
        |worker_id: u64| tokio::spawn(arrival_worker(shared.clone(), pool.clone(), worker_id));

    let mut handles: Vec<JoinHandle<()>> = (0..pool.spawned()).map(spawn).collect();
    let mut next_worker_id = pool.spawned();
    stats.set_active_workers(pool.spawned());

    let total = plan.total_arrivals();
    let check_every = plan.rate().max(1);
    let mut capacity_warned = false;
    let mut last_missed_warn: Option<Instant> = None;

    for index in 0..total {
        tokio::time::sleep_until(started + plan.offset_of(index)).await;

        match pool.dispatch() {
            Dispatch::Idle => {}
            Dispatch::Grow => {
                handles.push(spawn(next_worker_id));
                next_worker_id = next_worker_id.saturating_add(1);
                stats.set_active_workers(pool.spawned());
                tracing::debug!(pool_size = pool.spawned(), max = pool.max(), "pool grew");
            }
            Dispatch::Missed => {
                stats.record_missed_arrival();
                let now = Instant::now();
                if last_missed_warn.is_none_or(|at| now.duration_since(at) >= MISSED_WARN_EVERY) {
                    last_missed_warn = Some(now);
                    tracing::warn!(
                        arrival = index,
                        missed_total = pool.missed_total(),
                        max = pool.max(),
                        "arrival missed: every worker is busy and the pool is at its maximum"
                    );
                }
            }
        }

        if !capacity_warned
            && index > 0
            && index % check_every == 0
            && let Some(latency) = stats.latency_mean()
            && let Err(err) = plan.required_workers(latency)
        {
            capacity_warned = true;
            tracing::warn!(latency = ?latency, "{err}");
        }
    }

    tokio::time::sleep_until(started + plan.duration()).await;
    pool.mark_done();
    handles
}

#[derive(Debug, Default)]
struct Drained {
    aborted: u64,
    panicked: u64,
}

/// Waits for every worker up to `grace` and aborts the rest. Never stops early.
async fn drain(handles: Vec<JoinHandle<()>>, grace: Duration) -> Drained {
    let deadline = Instant::now() + grace;
    let mut drained = Drained::default();

    for mut handle in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if err.is_panic() {
                    tracing::warn!(error = %err, "worker panicked");
                    drained.panicked = drained.panicked.saturating_add(1);
                }
            }
            Err(_) => {
                handle.abort();
                drained.aborted = drained.aborted.saturating_add(1);
            }
        }
    }

    drained
}

enum ProgressSource {
    Staged(Arc<StagedSchedule>),
    Arrivals {
        plan: ArrivalPlan,
        pool: Arc<WorkerPool>,
    },
}

impl ProgressSource {
    fn snapshot(&self, elapsed: Duration, stats: &RunStats) -> ProfileProgress {
        match self {
            Self::Staged(schedule) => ProfileProgress::StagedConcurrency {
                total_duration: schedule.total_duration(),
                active_workers: stats.active_workers(),
                stage: schedule.stage_snapshot_at(elapsed).map(|st| StageProgress {
                    stage: st.index + 1,
                    stages: st.count,
                    stage_elapsed: st.stage_elapsed,
                    stage_remaining: st.stage_remaining,
                    start_target: st.start_target,
                    end_target: st.end_target,
                    current_target: st.current_target,
                }),
            },
            Self::Arrivals { plan, pool } => ProfileProgress::ConstantArrivalRate {
                total_duration: plan.duration(),
                arrivals_scheduled: pool.scheduled_total().saturating_add(pool.missed_total()),
                arrivals_total: plan.total_arrivals(),
                busy_workers: pool.busy(),
                pool_size: pool.spawned(),
                max_workers: pool.max(),
            },
        }
    }
}

fn spawn_progress(
    progress: ProgressFn,
    source: ProgressSource,
    stats: Arc<RunStats>,
    started: Instant,
    every: Duration,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(10));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(started + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tick_id = 0u64;
        let mut last_at = started;
        let mut last_iterations = 0u64;

        loop {
            interval.tick().await;

            tick_id = tick_id.saturating_add(1);
            let now = Instant::now();
            let dt = now.duration_since(last_at);
            last_at = now;

            let iterations_total = stats.iterations_total();
            let delta = iterations_total.saturating_sub(last_iterations);
            last_iterations = iterations_total;

            let elapsed = now.duration_since(started);
            (progress)(ProgressUpdate {
                tick: tick_id,
                elapsed,
                iterations_total,
                iterations_per_sec_now: (delta as f64) / dt.as_secs_f64().max(1e-9),
                requests_total: stats.requests_total(),
                checks_failed_total: stats.checks_failed_total(),
                missed_arrivals_total: stats.missed_arrivals_total(),
                progress: source.snapshot(elapsed, &stats),
            });
        }
    })
}
