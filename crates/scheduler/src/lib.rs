//! Cron-driven ingestion and forecast jobs with manual triggers.
//!
//! Every run, scheduled or manual, goes through [`JobRunner`], which refuses
//! overlapping runs of the same job and records the outcome in the
//! [`Monitor`](medsentinel_monitor::Monitor) history.

pub mod error;
pub mod etl;
pub mod forecast;
pub mod runner;
pub mod schedule;

pub use error::SchedulerError;
pub use etl::{EtlPipelines, EtlScheduler, AUXILIARY_JOB, DISEASE_JOB, WEATHER_JOB};
pub use forecast::{ForecastScheduler, FORECAST_JOB};
pub use runner::JobRunner;
pub use schedule::{CronScheduler, Job, ScheduledJob};
