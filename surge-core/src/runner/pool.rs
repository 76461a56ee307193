use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Outcome of handing one arrival to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// An idle worker will pick the arrival up.
    Idle,
    /// No worker was idle; the caller must start one more worker to take the arrival.
    Grow,
    /// The pool is at `max` with nobody idle; the arrival was not started.
    Missed,
}

/// Worker pool bookkeeping for constant-rate runs.
///
/// Waiting workers are exactly `idle + (scheduled - claimed)`: the dispatcher only schedules
/// an arrival after reserving an idle worker or growing the pool, so every scheduled arrival
/// has a worker to run it.
#[derive(Debug)]
pub struct WorkerPool {
    scheduled_total: AtomicU64,
    claimed_total: AtomicU64,
    missed_total: AtomicU64,

    idle: AtomicU64,
    spawned: AtomicU64,
    max: u64,

    done: AtomicBool,
    notify: Notify,
}

impl WorkerPool {
    /// `pre_allocated` workers are counted as spawned and idle; the caller starts them.
    pub fn new(pre_allocated: u64, max: u64) -> Self {
        let pre_allocated = pre_allocated.min(max);
        Self {
            scheduled_total: AtomicU64::new(0),
            claimed_total: AtomicU64::new(0),
            missed_total: AtomicU64::new(0),
            idle: AtomicU64::new(pre_allocated),
            spawned: AtomicU64::new(pre_allocated),
            max,
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn dispatch(&self) -> Dispatch {
        let outcome = if self.try_take_idle() {
            Dispatch::Idle
        } else if self.try_grow() {
            Dispatch::Grow
        } else {
            self.missed_total.fetch_add(1, Ordering::Relaxed);
            return Dispatch::Missed;
        };

        self.scheduled_total.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
        outcome
    }

    fn try_take_idle(&self) -> bool {
        self.idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idle| {
                idle.checked_sub(1)
            })
            .is_ok()
    }

    fn try_grow(&self) -> bool {
        let max = self.max;
        self.spawned
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |spawned| {
                (spawned < max).then(|| spawned.saturating_add(1))
            })
            .is_ok()
    }

    /// Waits for a scheduled arrival. Returns `false` once the pool is done and drained.
    pub async fn claim_next(&self) -> bool {
        loop {
            // Register interest before checking, so a dispatch in between is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let claimed = self.claimed_total.load(Ordering::Acquire);
            let scheduled = self.scheduled_total.load(Ordering::Acquire);

            if claimed < scheduled {
                if self
                    .claimed_total
                    .compare_exchange_weak(
                        claimed,
                        claimed.saturating_add(1),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    return true;
                }
                continue;
            }

            if self.is_done() {
                return false;
            }

            notified.await;
        }
    }

    /// Marks a worker idle again after it finished an iteration.
    pub fn release(&self) {
        self.idle.fetch_add(1, Ordering::AcqRel);
    }

    /// Forgets a worker that died mid-iteration, so a later arrival can grow a replacement.
    pub fn lose_worker(&self) {
        let _ = self
            .spawned
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |spawned| {
                spawned.checked_sub(1)
            });
    }

    /// Stops handing out arrivals; waiting workers exit once the backlog is drained.
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn missed_total(&self) -> u64 {
        self.missed_total.load(Ordering::Relaxed)
    }

    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total.load(Ordering::Relaxed)
    }

    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    pub fn idle(&self) -> u64 {
        self.idle.load(Ordering::Relaxed)
    }

    /// Workers currently running an iteration (or about to).
    pub fn busy(&self) -> u64 {
        self.spawned().saturating_sub(self.idle())
    }

    pub fn max(&self) -> u64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn dispatch_prefers_idle_then_grows_then_misses() {
        let pool = WorkerPool::new(1, 2);

        assert_eq!(pool.dispatch(), Dispatch::Idle);
        assert_eq!(pool.dispatch(), Dispatch::Grow);
        assert_eq!(pool.dispatch(), Dispatch::Missed);
        assert_eq!(pool.dispatch(), Dispatch::Missed);

        assert_eq!(pool.spawned(), 2);
        assert_eq!(pool.scheduled_total(), 2);
        assert_eq!(pool.missed_total(), 2);

        pool.release();
        assert_eq!(pool.dispatch(), Dispatch::Idle);
        assert_eq!(pool.missed_total(), 2);
    }

    #[test]
    fn pre_allocated_is_capped_by_max() {
        let pool = WorkerPool::new(5, 3);
        assert_eq!(pool.spawned(), 3);
        assert_eq!(pool.idle(), 3);
        assert_eq!(pool.busy(), 0);
    }

    #[test]
    fn lost_worker_frees_room_to_grow() {
        let pool = WorkerPool::new(1, 1);
        assert_eq!(pool.dispatch(), Dispatch::Idle);
        assert_eq!(pool.dispatch(), Dispatch::Missed);

        pool.lose_worker();
        assert_eq!(pool.spawned(), 0);
        assert_eq!(pool.busy(), 0);
        assert_eq!(pool.dispatch(), Dispatch::Grow);
        assert_eq!(pool.missed_total(), 1);
    }

    #[tokio::test]
    async fn claim_drains_backlog_after_done() {
        let pool = WorkerPool::new(2, 2);
        assert_eq!(pool.dispatch(), Dispatch::Idle);
        assert_eq!(pool.dispatch(), Dispatch::Idle);
        pool.mark_done();

        assert!(pool.claim_next().await);
        assert!(pool.claim_next().await);
        assert!(!pool.claim_next().await);
    }

    #[tokio::test]
    async fn waiting_worker_wakes_on_dispatch() {
        let pool = Arc::new(WorkerPool::new(1, 1));

        let worker = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.claim_next().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.dispatch(), Dispatch::Idle);

        let claimed = tokio::time::timeout(Duration::from_secs(1), worker).await;
        assert!(matches!(claimed, Ok(Ok(true))));
    }

    #[tokio::test]
    async fn waiting_worker_exits_on_done() {
        let pool = Arc::new(WorkerPool::new(1, 1));

        let worker = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.claim_next().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.mark_done();

        let claimed = tokio::time::timeout(Duration::from_secs(1), worker).await;
        assert!(matches!(claimed, Ok(Ok(false))));
    }
}
