//! Cron registry and the polling tick loop.
//!
//! Jobs are registered with a 5- or 6-field cron expression evaluated in UTC.
//! The loop wakes every poll interval and spawns each job whose most recent
//! cron tick falls after its last trigger. A job's `last_triggered` starts at
//! registration time, so ticks that passed before startup are not replayed.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use medsentinel_core::config::parse_cron;
use medsentinel_core::ConfigError;

use crate::error::SchedulerError;

/// A unit of scheduled work. Implementations record their own outcome.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), SchedulerError>;
}

struct Entry {
    job: Arc<dyn Job>,
    cron: String,
    schedule: Schedule,
    last_triggered: DateTime<Utc>,
}

/// Registry view of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub name: String,
    pub cron: String,
    pub last_triggered: DateTime<Utc>,
    pub next_run: Option<DateTime<Utc>>,
}

pub struct CronScheduler {
    entries: Arc<RwLock<Vec<Entry>>>,
    poll_interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CronScheduler {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            poll_interval,
            handle: Mutex::new(None),
        }
    }

    /// Register `job` under `cron_expr`, replacing any job of the same name.
    pub fn register(&self, job: Arc<dyn Job>, cron_expr: &str) -> Result<(), ConfigError> {
        self.register_at(job, cron_expr, Utc::now())
    }

    pub fn register_at(
        &self,
        job: Arc<dyn Job>,
        cron_expr: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ConfigError> {
        let schedule = parse_cron(cron_expr).map_err(|_| ConfigError::InvalidCron {
            key: job.name().to_string(),
            expr: cron_expr.to_string(),
        })?;

        let mut entries = self.entries.write().expect("scheduler registry lock poisoned");
        entries.retain(|e| e.job.name() != job.name());
        info!(job = job.name(), cron = cron_expr, "Registered job");
        entries.push(Entry {
            job,
            cron: cron_expr.trim().to_string(),
            schedule,
            last_triggered: now,
        });
        Ok(())
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        let entries = self.entries.read().expect("scheduler registry lock poisoned");
        entries
            .iter()
            .map(|e| ScheduledJob {
                name: e.job.name().to_string(),
                cron: e.cron.clone(),
                last_triggered: e.last_triggered,
                next_run: e.schedule.upcoming(Utc).next(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("scheduler registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark every job due at `now` as triggered and return it.
    fn take_due(&self, now: DateTime<Utc>) -> Vec<Arc<dyn Job>> {
        let mut entries = self.entries.write().expect("scheduler registry lock poisoned");
        entries
            .iter_mut()
            .filter(|e| is_cron_due(&e.schedule, now, e.last_triggered))
            .map(|e| {
                e.last_triggered = now;
                e.job.clone()
            })
            .collect()
    }

    /// Spawn every job due at `now`. Failures are logged and never reach the
    /// caller; each job runs on its own task.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        self.take_due(now)
            .into_iter()
            .map(|job| {
                debug!(job = job.name(), "Job due");
                tokio::spawn(async move {
                    if let Err(e) = job.run().await {
                        warn!(job = job.name(), error = %e, "Scheduled run did not complete");
                    }
                })
            })
            .collect()
    }

    /// Start the tick loop. Calling it again while active is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().expect("scheduler handle lock poisoned");
        if handle.is_some() {
            return;
        }

        let entries = self.entries.clone();
        let poll_interval = self.poll_interval;
        info!(
            jobs = self.len(),
            "Scheduler started (poll interval: {}s)",
            poll_interval.as_secs()
        );

        let ticker = CronScheduler {
            entries,
            poll_interval,
            handle: Mutex::new(None),
        };
        *handle = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(ticker.poll_interval).await;
                ticker.tick(Utc::now());
            }
        }));
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .lock()
            .expect("scheduler handle lock poisoned")
            .is_some()
    }

    /// Stop the tick loop and clear the registry. Runs already spawned finish.
    pub fn stop(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .expect("scheduler handle lock poisoned")
            .take()
        {
            handle.abort();
        }
        self.entries
            .write()
            .expect("scheduler registry lock poisoned")
            .clear();
        info!("Scheduler stopped");
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

/// A job is due if a scheduled tick falls in `(last_run, now]`.
fn is_cron_due(schedule: &Schedule, now: DateTime<Utc>, last_run: DateTime<Utc>) -> bool {
    match schedule.after(&last_run).next() {
        Some(next) => next <= now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        name: &'static str,
        runs: AtomicUsize,
        fail: bool,
    }

    impl Counter {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                runs: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Job for Counter {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> Result<(), SchedulerError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SchedulerError::Skipped("boom".into()));
            }
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 3, h, m, 0).unwrap()
    }

    #[test]
    fn due_only_after_tick_passes() {
        let schedule = parse_cron("0 2 * * *").unwrap();
        assert!(!is_cron_due(&schedule, at(1, 59), at(1, 0)));
        assert!(is_cron_due(&schedule, at(2, 0), at(1, 0)));
        assert!(is_cron_due(&schedule, at(2, 30), at(1, 0)));
        assert!(!is_cron_due(&schedule, at(2, 30), at(2, 0)));
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let scheduler = CronScheduler::new(Duration::from_secs(30));
        let err = scheduler.register(Counter::new("bad", false), "every tuesday").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCron { .. }));
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn tick_runs_due_jobs_once() {
        let scheduler = CronScheduler::new(Duration::from_secs(30));
        let daily = Counter::new("daily", false);
        let six_hourly = Counter::new("sixHourly", false);
        scheduler.register_at(daily.clone(), "0 2 * * *", at(0, 0)).unwrap();
        scheduler.register_at(six_hourly.clone(), "0 */6 * * *", at(0, 0)).unwrap();

        for handle in scheduler.tick(at(2, 0)) {
            handle.await.unwrap();
        }
        assert_eq!(daily.runs.load(Ordering::SeqCst), 1);
        assert_eq!(six_hourly.runs.load(Ordering::SeqCst), 0);

        // Same window again: nothing new is due.
        assert!(scheduler.tick(at(2, 0)).is_empty());

        for handle in scheduler.tick(at(6, 0)) {
            handle.await.unwrap();
        }
        assert_eq!(daily.runs.load(Ordering::SeqCst), 1);
        assert_eq!(six_hourly.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_job_does_not_affect_others() {
        let scheduler = CronScheduler::new(Duration::from_secs(30));
        let bad = Counter::new("bad", true);
        let good = Counter::new("good", false);
        scheduler.register_at(bad.clone(), "0 2 * * *", at(0, 0)).unwrap();
        scheduler.register_at(good.clone(), "0 2 * * *", at(0, 0)).unwrap();

        let handles = scheduler.tick(at(3, 0));
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(bad.runs.load(Ordering::SeqCst), 1);
        assert_eq!(good.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_clears_registry() {
        let scheduler = CronScheduler::new(Duration::from_secs(30));
        scheduler.register(Counter::new("daily", false), "0 2 * * *").unwrap();
        scheduler.start();
        assert!(scheduler.is_active());
        scheduler.stop();
        assert!(!scheduler.is_active());
        assert!(scheduler.is_empty());
    }
}
