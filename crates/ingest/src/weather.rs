//! Current weather per region, merged into the region's recent cases.
//!
//! Open-Meteo is the primary source. OpenWeatherMap is only consulted when
//! a key is configured. A region that cannot be fetched is reported in the
//! result and the run moves on to the next region.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{info, warn};

use medsentinel_core::{find_region, CaseStore, ExtensionMap, Scalar, WeatherSample};

use crate::error::{ExtractionError, PipelineError};
use crate::pipeline::{LoadError, LoadResult, Pipeline};
use crate::sources::{WeatherProvider, WeatherSource};

/// Cases dated within this window receive the sample.
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Where the regions for a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    /// Distinct regions already present in storage, capped at `limit`.
    FromStore { limit: usize },
    Explicit(Vec<String>),
}

/// Raw payload for one region together with its shape.
#[derive(Debug, Clone)]
pub struct FetchedWeather {
    pub region: String,
    pub provider: WeatherProvider,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct WeatherBatch {
    pub fetched: Vec<FetchedWeather>,
    pub failures: Vec<LoadError>,
}

/// Per-region outcome carried from extract to load.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionWeather {
    Sample(WeatherSample),
    Failed(LoadError),
}

#[derive(Clone)]
pub struct WeatherPipeline {
    primary: Arc<dyn WeatherSource>,
    fallback: Option<Arc<dyn WeatherSource>>,
    store: Arc<dyn CaseStore>,
    regions: RegionSelection,
}

impl WeatherPipeline {
    pub fn new(
        primary: Arc<dyn WeatherSource>,
        fallback: Option<Arc<dyn WeatherSource>>,
        store: Arc<dyn CaseStore>,
        regions: RegionSelection,
    ) -> Self {
        Self {
            primary,
            fallback,
            store,
            regions,
        }
    }

    /// Same sources and store, different region list (manual triggers).
    pub fn with_regions(&self, regions: Vec<String>) -> Self {
        Self {
            regions: RegionSelection::Explicit(regions),
            ..self.clone()
        }
    }

    async fn resolve_regions(&self) -> Result<Vec<String>, PipelineError> {
        match &self.regions {
            RegionSelection::Explicit(regions) => Ok(regions.clone()),
            RegionSelection::FromStore { limit } => {
                Ok(self.store.distinct_regions(Some(*limit)).await?)
            }
        }
    }

    async fn fetch_region(&self, name: &str) -> Result<FetchedWeather, ExtractionError> {
        let region =
            find_region(name).ok_or_else(|| ExtractionError::UnknownRegion(name.to_string()))?;

        let primary_error = match self.primary.current(region).await {
            Ok(payload) => {
                return Ok(FetchedWeather {
                    region: region.region.to_string(),
                    provider: self.primary.provider(),
                    payload,
                })
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error);
        };
        warn!(
            region = name,
            error = %primary_error,
            "Primary weather source failed, trying fallback"
        );
        let payload = fallback.current(region).await?;
        Ok(FetchedWeather {
            region: region.region.to_string(),
            provider: fallback.provider(),
            payload,
        })
    }
}

#[async_trait]
impl Pipeline for WeatherPipeline {
    type Raw = WeatherBatch;
    type Record = RegionWeather;

    fn name(&self) -> &'static str {
        "weather"
    }

    async fn extract(&self) -> Result<WeatherBatch, PipelineError> {
        let regions = self.resolve_regions().await?;
        if regions.is_empty() {
            return Err(PipelineError::Skipped("no regions to fetch weather for".into()));
        }
        info!(regions = regions.len(), "Fetching weather data");

        let mut batch = WeatherBatch::default();
        for name in regions {
            match self.fetch_region(&name).await {
                Ok(fetched) => batch.fetched.push(fetched),
                Err(e) => {
                    warn!(region = %name, error = %e, "Failed to fetch weather");
                    batch.failures.push(LoadError {
                        key: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(batch)
    }

    fn transform(&self, raw: WeatherBatch) -> Result<Vec<RegionWeather>, PipelineError> {
        let now = Utc::now();
        let mut records = Vec::with_capacity(raw.fetched.len() + raw.failures.len());
        for fetched in &raw.fetched {
            records.push(RegionWeather::Sample(normalize(fetched, now)?));
        }
        records.extend(raw.failures.into_iter().map(RegionWeather::Failed));
        Ok(records)
    }

    async fn load(&self, records: Vec<RegionWeather>) -> Result<LoadResult, PipelineError> {
        let since = Utc::now() - Duration::hours(RECENT_WINDOW_HOURS);
        let mut result = LoadResult::default();
        for record in records {
            match record {
                RegionWeather::Sample(sample) => {
                    match self.store.update_recent_weather(&sample.region, since, &sample).await {
                        Ok(n) => result.updated += n,
                        Err(e) => {
                            warn!(region = %sample.region, error = %e, "Failed to update weather");
                            result.push_error(sample.region.clone(), e);
                        }
                    }
                }
                RegionWeather::Failed(failure) => result.errors.push(failure),
            }
        }
        info!(
            updated = result.updated,
            errors = result.errors.len(),
            "Weather update complete"
        );
        Ok(result)
    }
}

// ── Normalization ─────────────────────────────────────────────

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Normalize either provider's current-conditions payload.
pub fn normalize(
    fetched: &FetchedWeather,
    now: DateTime<Utc>,
) -> Result<WeatherSample, PipelineError> {
    match fetched.provider {
        WeatherProvider::OpenMeteo => normalize_open_meteo(fetched, now),
        WeatherProvider::OpenWeatherMap => normalize_open_weather(fetched, now),
    }
}

fn normalize_open_meteo(
    fetched: &FetchedWeather,
    now: DateTime<Utc>,
) -> Result<WeatherSample, PipelineError> {
    let current = fetched.payload.get("current").filter(|c| c.is_object()).ok_or_else(|| {
        let region = &fetched.region;
        PipelineError::Transform(format!("open-meteo payload for {region} lacks `current`"))
    })?;

    let mut extension = ExtensionMap::new();
    if let Some(time) = current.get("time").and_then(Value::as_str) {
        extension.insert("observedAt".into(), time.into());
    }

    Ok(WeatherSample {
        region: fetched.region.clone(),
        temperature: number(current.get("temperature_2m")),
        humidity: number(current.get("relative_humidity_2m")),
        rainfall: number(current.get("precipitation")),
        source_tag: fetched.provider.tag().to_string(),
        captured_at: now,
        extension,
    })
}

fn normalize_open_weather(
    fetched: &FetchedWeather,
    now: DateTime<Utc>,
) -> Result<WeatherSample, PipelineError> {
    let payload = &fetched.payload;
    let main = payload.get("main").filter(|m| m.is_object()).ok_or_else(|| {
        let region = &fetched.region;
        PipelineError::Transform(format!("openweathermap payload for {region} lacks `main`"))
    })?;

    let rain = payload.get("rain");
    let rainfall =
        number(rain.and_then(|r| r.get("1h"))).or_else(|| number(rain.and_then(|r| r.get("3h"))));

    let mut extension = ExtensionMap::new();
    let fields = [
        ("description", payload.pointer("/weather/0/description")),
        ("windSpeed", payload.pointer("/wind/speed")),
        ("pressure", main.get("pressure")),
        ("visibility", payload.get("visibility")),
    ];
    for (key, value) in fields {
        if let Some(scalar) = value.and_then(Scalar::from_json) {
            extension.insert(key.to_string(), scalar);
        }
    }

    Ok(WeatherSample {
        region: fetched.region.clone(),
        temperature: number(main.get("temp")),
        humidity: number(main.get("humidity")),
        rainfall,
        source_tag: fetched.provider.tag().to_string(),
        captured_at: now,
        extension,
    })
}

/// Normalize an Open-Meteo `daily` payload for a single day.
///
/// Temperature is the mean of the day's max and min.
pub fn normalize_daily(
    region: &str,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<WeatherSample, PipelineError> {
    let daily = payload.get("daily").filter(|d| d.is_object()).ok_or_else(|| {
        PipelineError::Transform(format!("historical payload for {region} lacks `daily`"))
    })?;
    let first = |key: &str| number(daily.get(key).and_then(|v| v.get(0)));

    let temperature = match (first("temperature_2m_max"), first("temperature_2m_min")) {
        (Some(max), Some(min)) => Some((max + min) / 2.0),
        _ => None,
    };

    let mut extension = ExtensionMap::new();
    if let Some(day) = daily.get("time").and_then(|t| t.get(0)).and_then(Value::as_str) {
        extension.insert("weatherDay".into(), day.into());
    }
    extension.insert("weatherBackfilledAt".into(), now.to_rfc3339().into());

    Ok(WeatherSample {
        region: region.to_string(),
        temperature,
        humidity: first("relative_humidity_2m_mean"),
        rainfall: first("precipitation_sum"),
        source_tag: "openmeteo-historical".to_string(),
        captured_at: now,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetched(provider: WeatherProvider, payload: Value) -> FetchedWeather {
        FetchedWeather {
            region: "Pune".into(),
            provider,
            payload,
        }
    }

    #[test]
    fn open_meteo_shape() {
        let sample = normalize(
            &fetched(
                WeatherProvider::OpenMeteo,
                json!({"current": {"time": "2024-06-01T12:00", "temperature_2m": 31.4,
                                   "relative_humidity_2m": 68, "precipitation": 0.2}}),
            ),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sample.temperature, Some(31.4));
        assert_eq!(sample.humidity, Some(68.0));
        assert_eq!(sample.rainfall, Some(0.2));
        assert_eq!(sample.source_tag, "openmeteo");
    }

    #[test]
    fn open_weather_shape_prefers_hourly_rain() {
        let sample = normalize(
            &fetched(
                WeatherProvider::OpenWeatherMap,
                json!({"main": {"temp": 29.0, "humidity": 74, "pressure": 1008},
                       "rain": {"3h": 4.5},
                       "weather": [{"description": "light rain"}],
                       "wind": {"speed": 3.6}, "visibility": 8000}),
            ),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sample.temperature, Some(29.0));
        assert_eq!(sample.rainfall, Some(4.5));
        assert_eq!(sample.source_tag, "openweathermap");
        assert_eq!(sample.extension.get("description"), Some(&Scalar::from("light rain")));
        assert_eq!(sample.extension.get("pressure"), Some(&Scalar::Integer(1008)));
    }

    #[test]
    fn missing_top_level_object_is_transform_error() {
        let hourly_only = fetched(WeatherProvider::OpenMeteo, json!({"hourly": {}}));
        let err = normalize(&hourly_only, Utc::now());
        assert!(matches!(err, Err(PipelineError::Transform(_))));
        let unauthorized = fetched(WeatherProvider::OpenWeatherMap, json!({"cod": 401}));
        let err = normalize(&unauthorized, Utc::now());
        assert!(matches!(err, Err(PipelineError::Transform(_))));
    }

    #[test]
    fn daily_mean_temperature() {
        let sample = normalize_daily(
            "Pune",
            &json!({"daily": {"time": ["2024-05-01"], "temperature_2m_max": [34.0],
                              "temperature_2m_min": [24.0], "relative_humidity_2m_mean": [55.0],
                              "precipitation_sum": [1.5]}}),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sample.temperature, Some(29.0));
        assert_eq!(sample.humidity, Some(55.0));
        assert_eq!(sample.rainfall, Some(1.5));
        assert_eq!(sample.source_tag, "openmeteo-historical");
        assert!(sample.extension.contains_key("weatherBackfilledAt"));
    }
}
