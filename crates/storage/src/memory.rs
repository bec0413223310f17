//! In-process document store. Default backend and the fixture for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use medsentinel_core::{
    CaseField, CaseFilter, CaseKey, CaseObservation, CaseStore, Disease, GroupKey, GroupSummary,
    Prediction, PredictionKey, PredictionStore, StoreError, UpsertOutcome, WeatherSample,
};

#[derive(Default)]
pub struct InMemoryStore {
    cases: RwLock<BTreeMap<CaseKey, CaseObservation>>,
    predictions: RwLock<BTreeMap<PredictionKey, Prediction>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cases(&self) -> Result<RwLockReadGuard<'_, BTreeMap<CaseKey, CaseObservation>>, StoreError> {
        self.cases.read().map_err(|_| poisoned())
    }

    fn cases_mut(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<CaseKey, CaseObservation>>, StoreError> {
        self.cases.write().map_err(|_| poisoned())
    }

    fn predictions(
        &self,
    ) -> Result<RwLockReadGuard<'_, BTreeMap<PredictionKey, Prediction>>, StoreError> {
        self.predictions.read().map_err(|_| poisoned())
    }

    fn predictions_mut(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<PredictionKey, Prediction>>, StoreError> {
        self.predictions.write().map_err(|_| poisoned())
    }

    /// Snapshot of every stored case (tests and operator dumps).
    pub fn all_cases(&self) -> Result<Vec<CaseObservation>, StoreError> {
        Ok(self.cases()?.values().cloned().collect())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

/// A re-ingested record keeps weather data it does not itself carry, and
/// extension keys it does not overwrite.
fn merge_existing(incoming: &mut CaseObservation, existing: &CaseObservation) {
    if incoming.temperature.is_none() {
        incoming.temperature = existing.temperature;
    }
    if incoming.humidity.is_none() {
        incoming.humidity = existing.humidity;
    }
    if incoming.rainfall.is_none() {
        incoming.rainfall = existing.rainfall;
    }
    if incoming.weather_updated_at.is_none() {
        incoming.weather_updated_at = existing.weather_updated_at;
    }
    if incoming.weather_source.is_none() {
        incoming.weather_source = existing.weather_source.clone();
    }
    let mut extension = existing.extension.clone();
    extension.append(&mut incoming.extension);
    incoming.extension = extension;
}

#[async_trait]
impl CaseStore for InMemoryStore {
    async fn upsert_case(&self, mut case: CaseObservation) -> Result<UpsertOutcome, StoreError> {
        case.check()?;
        let key = case.key();
        let mut cases = self.cases_mut()?;
        match cases.get(&key) {
            Some(existing) => {
                merge_existing(&mut case, existing);
                cases.insert(key, case);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                cases.insert(key, case);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn find_case(&self, key: &CaseKey) -> Result<Option<CaseObservation>, StoreError> {
        Ok(self.cases()?.get(key).cloned())
    }

    async fn update_recent_weather(
        &self,
        region: &str,
        since: DateTime<Utc>,
        sample: &WeatherSample,
    ) -> Result<u64, StoreError> {
        sample.check()?;
        let now = Utc::now();
        let mut updated = 0;
        for case in self.cases_mut()?.values_mut() {
            if case.region == region && case.date >= since {
                case.apply_weather(sample, now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn set_case_weather(
        &self,
        key: &CaseKey,
        sample: &WeatherSample,
    ) -> Result<bool, StoreError> {
        sample.check()?;
        match self.cases_mut()?.get_mut(key) {
            Some(case) => {
                case.apply_weather(sample, Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cases_missing_weather(
        &self,
        region: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CaseObservation>, StoreError> {
        let mut found: Vec<_> = self
            .cases()?
            .values()
            .filter(|c| c.region == region && c.date >= since && c.missing_any_weather())
            .cloned()
            .collect();
        found.sort_by_key(|c| c.date);
        Ok(found)
    }

    async fn case_history(
        &self,
        group: &GroupKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<CaseObservation>, StoreError> {
        let mut history: Vec<_> = self
            .cases()?
            .values()
            .filter(|c| {
                c.region == group.region
                    && c.district == group.district
                    && c.state == group.state
                    && c.disease == group.disease
                    && c.date >= since
            })
            .cloned()
            .collect();
        history.sort_by_key(|c| c.date);
        Ok(history)
    }

    async fn group_counts(
        &self,
        disease: Option<Disease>,
        min_count: u64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        let mut groups: BTreeMap<GroupKey, GroupSummary> = BTreeMap::new();
        for case in self.cases()?.values() {
            if disease.is_some_and(|d| d != case.disease) {
                continue;
            }
            groups
                .entry(case.group())
                .and_modify(|s| {
                    s.count += 1;
                    s.earliest = s.earliest.min(case.date);
                    s.latest = s.latest.max(case.date);
                })
                .or_insert_with(|| GroupSummary {
                    group: case.group(),
                    count: 1,
                    earliest: case.date,
                    latest: case.date,
                });
        }
        let mut summaries: Vec<_> = groups
            .into_values()
            .filter(|s| s.count >= min_count)
            .collect();
        // Stable sort keeps key order among equal counts.
        summaries.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(summaries)
    }

    async fn distinct_regions(&self, limit: Option<usize>) -> Result<Vec<String>, StoreError> {
        let regions: BTreeSet<String> = self.cases()?.values().map(|c| c.region.clone()).collect();
        let iter = regions.into_iter();
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn latest_case_date(
        &self,
        with_weather: bool,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .cases()?
            .values()
            .filter(|c| !with_weather || c.has_weather())
            .map(|c| c.date)
            .max())
    }

    async fn count_cases(&self, filter: CaseFilter) -> Result<u64, StoreError> {
        Ok(self.cases()?.values().filter(|c| filter.matches(c)).count() as u64)
    }

    async fn count_cases_by(&self, field: CaseField) -> Result<BTreeMap<String, u64>, StoreError> {
        let mut counts = BTreeMap::new();
        for case in self.cases()?.values() {
            let label = match field {
                CaseField::Disease => case.disease.to_string(),
                CaseField::Region => case.region.clone(),
            };
            *counts.entry(label).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn case_date_bounds(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StoreError> {
        let cases = self.cases()?;
        let earliest = cases.values().map(|c| c.date).min();
        let latest = cases.values().map(|c| c.date).max();
        Ok(earliest.zip(latest))
    }
}

#[async_trait]
impl PredictionStore for InMemoryStore {
    async fn upsert_prediction(&self, prediction: Prediction) -> Result<UpsertOutcome, StoreError> {
        prediction.check()?;
        let previous = self.predictions_mut()?.insert(prediction.key(), prediction);
        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn find_prediction(
        &self,
        key: &PredictionKey,
    ) -> Result<Option<Prediction>, StoreError> {
        Ok(self.predictions()?.get(key).cloned())
    }

    async fn latest_forecast_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.predictions()?.keys().map(|k| k.forecast_date).max())
    }

    async fn count_predictions(&self) -> Result<u64, StoreError> {
        Ok(self.predictions()?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use medsentinel_core::{ConfidenceInterval, ExtensionMap, RiskLevel, Scalar};

    fn case(
        region: &str,
        disease: Disease,
        date: DateTime<Utc>,
        new_cases: u64,
    ) -> CaseObservation {
        let mut c = CaseObservation::new(region, region, "Maharashtra", disease, date);
        c.new_cases = new_cases;
        c.total_cases = new_cases * 10;
        c.source = "test".into();
        c
    }

    fn sample(region: &str) -> WeatherSample {
        WeatherSample {
            region: region.into(),
            temperature: Some(29.5),
            humidity: Some(70.0),
            rainfall: None,
            source_tag: "openmeteo".into(),
            captured_at: Utc::now(),
            extension: ExtensionMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_calendar_day() {
        let store = InMemoryStore::new();
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap();

        let first = store.upsert_case(case("Pune", Disease::Dengue, morning, 3)).await.unwrap();
        let second = store.upsert_case(case("Pune", Disease::Dengue, evening, 5)).await.unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.count_cases(CaseFilter::All).await.unwrap(), 1);
        let key = case("Pune", Disease::Dengue, morning, 0).key();
        let stored = store.find_case(&key).await.unwrap().unwrap();
        assert_eq!(stored.new_cases, 5);
    }

    #[tokio::test]
    async fn reingest_preserves_weather() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.upsert_case(case("Pune", Disease::Flu, now, 1)).await.unwrap();
        store
            .update_recent_weather("Pune", now - Duration::hours(24), &sample("Pune"))
            .await
            .unwrap();
        store.upsert_case(case("Pune", Disease::Flu, now, 2)).await.unwrap();

        let stored = store
            .find_case(&case("Pune", Disease::Flu, now, 0).key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.new_cases, 2);
        assert_eq!(stored.temperature, Some(29.5));
    }

    #[tokio::test]
    async fn reingest_keeps_extension_keys_it_does_not_carry() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let key = case("Pune", Disease::Flu, now, 0).key();
        store.upsert_case(case("Pune", Disease::Flu, now, 1)).await.unwrap();

        let mut backfilled = sample("Pune");
        backfilled
            .extension
            .insert("weatherBackfilledAt".into(), now.to_rfc3339().into());
        assert!(store.set_case_weather(&key, &backfilled).await.unwrap());

        let mut again = case("Pune", Disease::Flu, now, 4);
        again.extension.insert("deaths".into(), Scalar::Integer(1));
        store.upsert_case(again).await.unwrap();

        let stored = store.find_case(&key).await.unwrap().unwrap();
        assert_eq!(stored.new_cases, 4);
        assert!(stored.extension.contains_key("weatherBackfilledAt"));
        assert_eq!(
            stored.extension.get("weatherSource").and_then(|v| v.as_text()),
            Some("openmeteo")
        );
        assert_eq!(stored.extension.get("deaths"), Some(&Scalar::Integer(1)));
    }

    #[tokio::test]
    async fn recent_weather_update_stamps_extension() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.upsert_case(case("Mumbai", Disease::Dengue, now, 2)).await.unwrap();

        let mut reading = sample("Mumbai");
        reading.extension.insert("description".into(), "haze".into());
        store
            .update_recent_weather("Mumbai", now - Duration::hours(24), &reading)
            .await
            .unwrap();

        let stored = store
            .find_case(&case("Mumbai", Disease::Dengue, now, 0).key())
            .await
            .unwrap()
            .unwrap();
        let text = |k: &str| stored.extension.get(k).and_then(|v| v.as_text());
        assert_eq!(text("description"), Some("haze"));
        assert_eq!(text("weatherSource"), Some("openmeteo"));
        assert_eq!(
            text("weatherUpdatedAt").map(str::to_string),
            stored.weather_updated_at.map(|t| t.to_rfc3339())
        );
    }

    #[tokio::test]
    async fn invalid_records_are_rejected() {
        let store = InMemoryStore::new();
        let mut bad = case("Pune", Disease::Flu, Utc::now(), 1);
        bad.district = String::new();
        assert!(matches!(store.upsert_case(bad).await, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn recent_weather_update_is_scoped() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.upsert_case(case("Pune", Disease::Flu, now, 1)).await.unwrap();
        store.upsert_case(case("Pune", Disease::Dengue, now - Duration::days(3), 1)).await.unwrap();
        store.upsert_case(case("Mumbai", Disease::Flu, now, 1)).await.unwrap();

        let updated = store
            .update_recent_weather("Pune", now - Duration::hours(24), &sample("Pune"))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.count_cases(CaseFilter::WithWeather).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn group_counts_sorted_and_thresholded() {
        let store = InMemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = [
            ("Pune", Disease::Dengue, 7),
            ("Nagpur", Disease::Dengue, 9),
            ("Mumbai", Disease::Malaria, 6),
        ];
        for (region, disease, days) in series {
            for day in 0..days {
                let date = start + Duration::days(day);
                store.upsert_case(case(region, disease, date, 1)).await.unwrap();
            }
        }

        let groups = store.group_counts(None, 7).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group.region, "Nagpur");
        assert_eq!(groups[0].count, 9);
        assert_eq!(groups[1].earliest, start);
        assert_eq!(groups[1].latest, start + Duration::days(6));

        let malaria = store.group_counts(Some(Disease::Malaria), 1).await.unwrap();
        assert_eq!(malaria.len(), 1);
        assert_eq!(malaria[0].count, 6);
    }

    #[tokio::test]
    async fn predictions_upsert_by_key() {
        let store = InMemoryStore::new();
        let p = Prediction {
            region: "Pune".into(),
            district: "Pune".into(),
            state: "Maharashtra".into(),
            disease: Disease::Dengue,
            forecast_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            predicted_cases: 4,
            confidence: 0.7,
            confidence_interval: ConfidenceInterval { lower: 2, upper: 6 },
            risk_level: RiskLevel::Low,
            risk_score: 0.2,
            model_version: "v1".into(),
            feature_snapshot: ExtensionMap::new(),
        };
        assert_eq!(store.upsert_prediction(p.clone()).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_prediction(p.clone()).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.count_predictions().await.unwrap(), 1);
        assert_eq!(store.latest_forecast_date().await.unwrap(), Some(p.forecast_date));
    }
}
