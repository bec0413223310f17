//! Bounded job-execution history with FIFO eviction.
//!
//! Process-lifetime only. Uses `std::sync::RwLock`; the lock is never held
//! across an await point.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionRecord {
    pub id: Uuid,
    pub job_name: String,
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl JobCounts {
    fn count(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Success => self.successful += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(flatten)]
    pub overall: JobCounts,
    pub by_job: BTreeMap<String, JobCounts>,
    pub last_execution: BTreeMap<String, DateTime<Utc>>,
}

pub struct JobHistory {
    records: RwLock<VecDeque<JobExecutionRecord>>,
    capacity: usize,
}

impl Default for JobHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl JobHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, record: JobExecutionRecord) {
        let mut guard = self.records.write().expect("job history lock poisoned");
        guard.push_back(record);
        while guard.len() > self.capacity {
            guard.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("job history lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<JobExecutionRecord> {
        let guard = self.records.read().expect("job history lock poisoned");
        guard.iter().rev().take(limit).cloned().collect()
    }

    pub fn statistics(&self) -> JobStatistics {
        let guard = self.records.read().expect("job history lock poisoned");
        let mut stats = JobStatistics::default();
        for record in guard.iter() {
            stats.overall.count(record.status);
            stats
                .by_job
                .entry(record.job_name.clone())
                .or_default()
                .count(record.status);
            let last = stats
                .last_execution
                .entry(record.job_name.clone())
                .or_insert(record.timestamp);
            if record.timestamp > *last {
                *last = record.timestamp;
            }
        }
        stats
    }
}
