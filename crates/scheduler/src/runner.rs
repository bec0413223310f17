use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use medsentinel_monitor::{JobStatus, Monitor};

use crate::error::SchedulerError;

/// Runs jobs under a per-name "already running" guard and records every
/// outcome in the monitor history.
#[derive(Clone)]
pub struct JobRunner {
    monitor: Arc<Monitor>,
    running: Arc<Mutex<HashSet<String>>>,
}

/// Releases the job name on drop, including when the run panics.
struct RunningGuard {
    name: String,
    running: Arc<Mutex<HashSet<String>>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.name);
    }
}

impl JobRunner {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    fn acquire(&self, name: &str) -> Option<RunningGuard> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(name.to_string()) {
            return None;
        }
        Some(RunningGuard {
            name: name.to_string(),
            running: self.running.clone(),
        })
    }

    /// Run `work` as job `name` and record its outcome.
    ///
    /// A run that finds the job already in flight is recorded as skipped and
    /// returns [`SchedulerError::AlreadyRunning`] without polling `work`.
    pub async fn run<T, F>(&self, name: &str, work: F) -> Result<T, SchedulerError>
    where
        T: Serialize,
        F: Future<Output = Result<T, SchedulerError>>,
    {
        let Some(_guard) = self.acquire(name) else {
            warn!(job = name, "Job already running, skipping");
            self.monitor.record_job_execution(
                name,
                JobStatus::Skipped,
                None,
                Some("already running".to_string()),
            );
            return Err(SchedulerError::AlreadyRunning(name.to_string()));
        };

        info!(job = name, "Running job");
        let outcome = work.await;
        match &outcome {
            Ok(value) => {
                self.monitor.record_job_execution(
                    name,
                    JobStatus::Success,
                    serde_json::to_value(value).ok(),
                    None,
                );
            }
            Err(SchedulerError::Skipped(reason)) => {
                self.monitor.record_job_execution(
                    name,
                    JobStatus::Skipped,
                    None,
                    Some(reason.clone()),
                );
            }
            Err(e) => {
                warn!(job = name, error = %e, "Job failed");
                self.monitor.record_job_execution(
                    name,
                    JobStatus::Failed,
                    None,
                    Some(e.to_string()),
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsentinel_storage::InMemoryStore;

    fn runner() -> JobRunner {
        let store = Arc::new(InMemoryStore::new());
        JobRunner::new(Arc::new(Monitor::new(store.clone(), store)))
    }

    #[tokio::test]
    async fn records_each_outcome() {
        let runner = runner();
        let ok: Result<u32, _> = runner.run("a", async { Ok(3) }).await;
        assert_eq!(ok.unwrap(), 3);

        let skipped: Result<u32, _> = runner
            .run("b", async { Err(SchedulerError::Skipped("nothing to do".into())) })
            .await;
        assert!(matches!(skipped, Err(SchedulerError::Skipped(_))));

        let failed: Result<u32, _> = runner
            .run("c", async { Err(SchedulerError::AlreadyRunning("x".into())) })
            .await;
        assert!(failed.is_err());

        let history = runner.monitor().job_history(None);
        let statuses: Vec<_> = history.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![JobStatus::Failed, JobStatus::Skipped, JobStatus::Success]);
        assert_eq!(history[2].result, Some(serde_json::json!(3)));
        assert!(!runner.is_running("a"));
    }

    #[tokio::test]
    async fn overlapping_run_is_refused() {
        let runner = runner();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run("slow", async move {
                        let _ = rx.await;
                        Ok(1u32)
                    })
                    .await
            })
        };
        while !runner.is_running("slow") {
            tokio::task::yield_now().await;
        }

        let second: Result<u32, _> = runner.run("slow", async { Ok(2) }).await;
        assert!(matches!(second, Err(SchedulerError::AlreadyRunning(_))));

        tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert!(!runner.is_running("slow"));

        let stats = runner.monitor().job_statistics();
        assert_eq!(stats.overall.skipped, 1);
        assert_eq!(stats.overall.successful, 1);
    }
}
