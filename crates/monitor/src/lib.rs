//! Data freshness, coverage and quality checks over stored cases, plus a
//! bounded in-memory history of job executions.

pub mod history;
pub mod metrics;
pub mod monitor;

pub use history::{
    JobCounts, JobExecutionRecord, JobHistory, JobStatistics, JobStatus, HISTORY_CAPACITY,
};
pub use metrics::{
    DataFreshness, DataHealth, DataQuality, DateRange, Freshness, FreshnessMetric, HealthIssue,
    IssueKind, MissingFields, Severity,
};
pub use monitor::Monitor;
