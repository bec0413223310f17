use thiserror::Error;

use medsentinel_forecast::ForecastError;
use medsentinel_ingest::PipelineError;

/// Storage failures reach the scheduler through the pipeline or forecast
/// error that wraps them.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Pipeline(PipelineError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("skipped: {0}")]
    Skipped(String),
}

impl From<PipelineError> for SchedulerError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Skipped(reason) => SchedulerError::Skipped(reason),
            other => SchedulerError::Pipeline(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsentinel_core::StoreError;

    #[test]
    fn pipeline_skip_becomes_scheduler_skip() {
        let err = SchedulerError::from(PipelineError::Skipped("no regions".into()));
        assert!(matches!(err, SchedulerError::Skipped(ref r) if r == "no regions"));
    }

    #[test]
    fn store_failure_stays_inside_pipeline_error() {
        let err = SchedulerError::from(PipelineError::from(StoreError::Backend("down".into())));
        assert!(matches!(
            err,
            SchedulerError::Pipeline(PipelineError::Load(StoreError::Backend(_)))
        ));
        assert_eq!(err.to_string(), "load failed: storage backend error: down");
    }
}
