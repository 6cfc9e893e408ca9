// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Fixed-period execution of the snapshot task.
//!
//! Each scheduler owns its own small tokio runtime, so a document's backups never share
//! workers with another document's. Runs are serialized: a tick that arrives while the
//! previous run is still busy waits for it, then the period restarts from there.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{BackupError, Result};

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub failures: u64,
}

pub struct BackupScheduler {
    name: String,
    runtime: Option<Runtime>,
    stop_tx: Option<oneshot::Sender<()>>,
    counters: Arc<Counters>,
}

impl BackupScheduler {
    /// Starts running `task` every `period`, first after one full period.
    ///
    /// Errors returned by `task` (and panics inside it) are logged and counted; they never end
    /// the schedule.
    pub fn start<F>(name: &str, period: Duration, worker_threads: usize, task: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .max_blocking_threads(1)
            .thread_name(format!("bibsafe-{name}"))
            .enable_time()
            .build()
            .map_err(BackupError::Scheduler)?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let counters = Arc::new(Counters::default());
        let task = Arc::new(task);

        let loop_counters = counters.clone();
        let loop_name = name.to_owned();
        runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }

                loop_counters.ticks.fetch_add(1, Ordering::Relaxed);
                let run = task.clone();
                match tokio::task::spawn_blocking(move || run()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        loop_counters.failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(scheduler = %loop_name, error = %err, "backup tick failed");
                    }
                    Err(err) => {
                        loop_counters.failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(scheduler = %loop_name, error = %err, "backup tick panicked");
                    }
                }
            }
        });

        tracing::debug!(scheduler = %name, ?period, "backup scheduler started");
        Ok(Self {
            name: name.to_owned(),
            runtime: Some(runtime),
            stop_tx: Some(stop_tx),
            counters,
        })
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Stops scheduling further ticks. A run that is already in progress finishes on its own
    /// thread; this call does not wait for it.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            tracing::debug!(scheduler = %self.name, "backup scheduler stopped");
        }
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupScheduler")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::thread;
    use std::time::Instant as StdInstant;

    use super::*;

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = StdInstant::now() + timeout;
        while StdInstant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn runs_task_repeatedly_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut scheduler = BackupScheduler::start("test", Duration::from_millis(20), 2, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("start");

        assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::SeqCst) >= 3));
        scheduler.stop();
        assert!(!scheduler.is_running());

        thread::sleep(Duration::from_millis(50));
        let after_stop = runs.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn first_run_waits_one_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let _scheduler = BackupScheduler::start("test", Duration::from_secs(3), 1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("start");

        thread::sleep(Duration::from_millis(200));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_do_not_end_the_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let scheduler = BackupScheduler::start("test", Duration::from_millis(10), 2, move || {
            let run = counter.fetch_add(1, Ordering::SeqCst);
            if run == 1 {
                panic!("snapshot exploded");
            }
            Err(BackupError::SnapshotWrite {
                path: "x.bak".into(),
                source: io::Error::other("disk full"),
            })
        })
        .expect("start");

        assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::SeqCst) >= 4));
        let stats = scheduler.stats();
        assert!(stats.failures >= 3, "{stats:?}");
        assert!(stats.ticks >= stats.failures);
    }

    #[test]
    fn stop_does_not_interrupt_a_running_tick() {
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (s, f) = (started.clone(), finished.clone());
        let mut scheduler = BackupScheduler::start("test", Duration::from_millis(10), 1, move || {
            s.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(150));
            f.store(true, Ordering::SeqCst);
            Ok(())
        })
        .expect("start");

        assert!(wait_until(Duration::from_secs(5), || started.load(Ordering::SeqCst)));
        scheduler.stop();
        assert!(wait_until(Duration::from_secs(5), || finished.load(Ordering::SeqCst)));
    }

    #[test]
    fn runs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let runs = Arc::new(AtomicUsize::new(0));
        let (a, o, r) = (active.clone(), overlapped.clone(), runs.clone());
        let _scheduler = BackupScheduler::start("test", Duration::from_millis(5), 2, move || {
            if a.fetch_add(1, Ordering::SeqCst) > 0 {
                o.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(20));
            a.fetch_sub(1, Ordering::SeqCst);
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("start");

        assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::SeqCst) >= 4));
        assert!(!overlapped.load(Ordering::SeqCst));
    }
}
