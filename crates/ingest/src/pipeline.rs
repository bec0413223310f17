//! The extract → transform → load contract shared by every ingestion source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use medsentinel_core::{CaseObservation, CaseStore, UpsertOutcome};

use crate::error::PipelineError;

/// A single record that could not be written, or a region that could not
/// be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadError {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    pub inserted: u64,
    pub updated: u64,
    pub errors: Vec<LoadError>,
}

impl LoadResult {
    pub fn written(&self) -> u64 {
        self.inserted + self.updated
    }

    pub fn push_error(&mut self, key: impl Into<String>, error: impl ToString) {
        self.errors.push(LoadError {
            key: key.into(),
            error: error.to_string(),
        });
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Raw: Send;
    type Record: Send + Sync;

    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    async fn extract(&self) -> Result<Self::Raw, PipelineError>;

    fn transform(&self, raw: Self::Raw) -> Result<Vec<Self::Record>, PipelineError>;

    /// Gate before load: the batch must hold at least one record.
    fn validate(&self, records: &[Self::Record]) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::Validation(
                "data must be a non-empty sequence of records".into(),
            ));
        }
        Ok(())
    }

    /// Write records, isolating per-record failures in the result.
    async fn load(&self, records: Vec<Self::Record>) -> Result<LoadResult, PipelineError>;

    /// Run all stages in order. The first failing stage aborts the run and
    /// its error is returned unchanged.
    async fn execute(&self) -> Result<LoadResult, PipelineError> {
        let name = self.name();
        info!(pipeline = name, "Starting pipeline");

        let outcome: Result<LoadResult, PipelineError> = async {
            let raw = self.extract().await?;
            let records = self.transform(raw)?;
            info!(pipeline = name, records = records.len(), "Transformed records");
            self.validate(&records)?;
            self.load(records).await
        }
        .await;

        match &outcome {
            Ok(result) => info!(
                pipeline = name,
                inserted = result.inserted,
                updated = result.updated,
                errors = result.errors.len(),
                "Pipeline completed"
            ),
            Err(e) if e.is_skipped() => info!(pipeline = name, reason = %e, "Pipeline skipped"),
            Err(e) => warn!(pipeline = name, error = %e, "Pipeline failed"),
        }
        outcome
    }
}

/// Natural-key upsert of each record; failures are collected, never raised.
pub async fn upsert_cases(store: &dyn CaseStore, records: Vec<CaseObservation>) -> LoadResult {
    let mut result = LoadResult::default();
    for record in records {
        let key = record.key().to_string();
        match store.upsert_case(record).await {
            Ok(UpsertOutcome::Inserted) => result.inserted += 1,
            Ok(UpsertOutcome::Updated) => result.updated += 1,
            Err(e) => {
                warn!(record = %key, error = %e, "Failed to load record");
                result.push_error(key, e);
            }
        }
    }
    info!(
        inserted = result.inserted,
        updated = result.updated,
        errors = result.errors.len(),
        "Load complete"
    );
    result
}
