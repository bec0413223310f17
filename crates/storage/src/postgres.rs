//! PostgreSQL-backed case and prediction store.
//!
//! Natural keys are primary keys; `ON CONFLICT ... DO UPDATE` provides the
//! upsert and `xmax = 0` tells an insert apart from an update.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use medsentinel_core::config::PostgresConfig;
use medsentinel_core::{
    CaseField, CaseFilter, CaseKey, CaseObservation, CaseStore, ConfidenceInterval, Disease,
    ExtensionMap, GroupKey, GroupSummary, Prediction, PredictionKey, PredictionStore, StoreError,
    UpsertOutcome, WeatherSample,
};

use crate::error::StorageError;

const CASE_COLUMNS: &str = "region, district, state, disease, date, new_cases, total_cases, \
     population, temperature, humidity, rainfall, weather_updated_at, weather_source, source, \
     extension";

const PREDICTION_COLUMNS: &str = "region, district, state, disease, forecast_date, \
     predicted_cases, confidence, lower_bound, upper_bound, risk_level, risk_score, \
     model_version, feature_snapshot";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply pending migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        if !config.is_configured() {
            return Err(StorageError::NotConfigured(
                "PG_USERNAME must be set for the postgres backend".into(),
            ));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!("PostgreSQL connected: {}/{}", config.host, config.database);
        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("Database migrations applied successfully");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn to_i64(field: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Invalid(format!("{field} out of range: {value}")))
}

fn to_u64(value: i64) -> u64 {
    value.max(0) as u64
}

fn parse_disease(value: &str) -> Result<Disease, StoreError> {
    value.parse().map_err(StoreError::Backend)
}

// ── Rows ──────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct CaseRow {
    region: String,
    district: String,
    state: String,
    disease: String,
    date: DateTime<Utc>,
    new_cases: i64,
    total_cases: i64,
    population: Option<i64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    rainfall: Option<f64>,
    weather_updated_at: Option<DateTime<Utc>>,
    weather_source: Option<String>,
    source: String,
    extension: Json<ExtensionMap>,
}

impl TryFrom<CaseRow> for CaseObservation {
    type Error = StoreError;

    fn try_from(row: CaseRow) -> Result<Self, Self::Error> {
        Ok(CaseObservation {
            disease: parse_disease(&row.disease)?,
            region: row.region,
            district: row.district,
            state: row.state,
            date: row.date,
            new_cases: to_u64(row.new_cases),
            total_cases: to_u64(row.total_cases),
            population: row.population.map(to_u64),
            temperature: row.temperature,
            humidity: row.humidity,
            rainfall: row.rainfall,
            weather_updated_at: row.weather_updated_at,
            weather_source: row.weather_source,
            source: row.source,
            extension: row.extension.0,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    region: String,
    district: String,
    state: String,
    disease: String,
    count: i64,
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PredictionRow {
    region: String,
    district: String,
    state: String,
    disease: String,
    forecast_date: NaiveDate,
    predicted_cases: i64,
    confidence: f64,
    lower_bound: i64,
    upper_bound: i64,
    risk_level: String,
    risk_score: f64,
    model_version: String,
    feature_snapshot: Json<ExtensionMap>,
}

impl TryFrom<PredictionRow> for Prediction {
    type Error = StoreError;

    fn try_from(row: PredictionRow) -> Result<Self, Self::Error> {
        Ok(Prediction {
            disease: parse_disease(&row.disease)?,
            risk_level: row.risk_level.parse().map_err(StoreError::Backend)?,
            region: row.region,
            district: row.district,
            state: row.state,
            forecast_date: row.forecast_date,
            predicted_cases: to_u64(row.predicted_cases),
            confidence: row.confidence,
            confidence_interval: ConfidenceInterval {
                lower: to_u64(row.lower_bound),
                upper: to_u64(row.upper_bound),
            },
            risk_score: row.risk_score,
            model_version: row.model_version,
            feature_snapshot: row.feature_snapshot.0,
        })
    }
}

fn outcome(inserted: bool) -> UpsertOutcome {
    if inserted {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    }
}

// ── Cases ─────────────────────────────────────────────────────

#[async_trait]
impl CaseStore for PgStore {
    async fn upsert_case(&self, case: CaseObservation) -> Result<UpsertOutcome, StoreError> {
        case.check()?;
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO cases (region, district, state, disease, case_day, date, new_cases,
                                total_cases, population, temperature, humidity, rainfall,
                                weather_updated_at, weather_source, source, extension)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (region, district, disease, case_day) DO UPDATE SET
                state = EXCLUDED.state,
                date = EXCLUDED.date,
                new_cases = EXCLUDED.new_cases,
                total_cases = EXCLUDED.total_cases,
                population = EXCLUDED.population,
                temperature = COALESCE(EXCLUDED.temperature, cases.temperature),
                humidity = COALESCE(EXCLUDED.humidity, cases.humidity),
                rainfall = COALESCE(EXCLUDED.rainfall, cases.rainfall),
                weather_updated_at =
                    COALESCE(EXCLUDED.weather_updated_at, cases.weather_updated_at),
                weather_source = COALESCE(EXCLUDED.weather_source, cases.weather_source),
                source = EXCLUDED.source,
                extension = cases.extension || EXCLUDED.extension,
                updated_at = now()
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(&case.region)
        .bind(&case.district)
        .bind(&case.state)
        .bind(case.disease.as_str())
        .bind(case.date.date_naive())
        .bind(case.date)
        .bind(to_i64("newCases", case.new_cases)?)
        .bind(to_i64("totalCases", case.total_cases)?)
        .bind(case.population.map(|p| to_i64("population", p)).transpose()?)
        .bind(case.temperature)
        .bind(case.humidity)
        .bind(case.rainfall)
        .bind(case.weather_updated_at)
        .bind(&case.weather_source)
        .bind(&case.source)
        .bind(Json(&case.extension))
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        Ok(outcome(inserted))
    }

    async fn find_case(&self, key: &CaseKey) -> Result<Option<CaseObservation>, StoreError> {
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases
             WHERE region = $1 AND district = $2 AND disease = $3 AND case_day = $4"
        );
        let row = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(&key.region)
            .bind(&key.district)
            .bind(key.disease.as_str())
            .bind(key.day)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(CaseObservation::try_from).transpose()
    }

    async fn update_recent_weather(
        &self,
        region: &str,
        since: DateTime<Utc>,
        sample: &WeatherSample,
    ) -> Result<u64, StoreError> {
        sample.check()?;
        let stamped_at = Utc::now();
        let result = sqlx::query(
            "UPDATE cases SET
                temperature = COALESCE($3, temperature),
                humidity = COALESCE($4, humidity),
                rainfall = COALESCE($5, rainfall),
                weather_updated_at = $6,
                weather_source = $7,
                extension = extension || $8,
                updated_at = now()
             WHERE region = $1 AND date >= $2",
        )
        .bind(region)
        .bind(since)
        .bind(sample.temperature)
        .bind(sample.humidity)
        .bind(sample.rainfall)
        .bind(stamped_at)
        .bind(&sample.source_tag)
        .bind(Json(sample.extension_patch(stamped_at)))
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected())
    }

    async fn set_case_weather(
        &self,
        key: &CaseKey,
        sample: &WeatherSample,
    ) -> Result<bool, StoreError> {
        sample.check()?;
        let stamped_at = Utc::now();
        let result = sqlx::query(
            "UPDATE cases SET
                temperature = COALESCE($5, temperature),
                humidity = COALESCE($6, humidity),
                rainfall = COALESCE($7, rainfall),
                weather_updated_at = $8,
                weather_source = $9,
                extension = extension || $10,
                updated_at = now()
             WHERE region = $1 AND district = $2 AND disease = $3 AND case_day = $4",
        )
        .bind(&key.region)
        .bind(&key.district)
        .bind(key.disease.as_str())
        .bind(key.day)
        .bind(sample.temperature)
        .bind(sample.humidity)
        .bind(sample.rainfall)
        .bind(stamped_at)
        .bind(&sample.source_tag)
        .bind(Json(sample.extension_patch(stamped_at)))
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn cases_missing_weather(
        &self,
        region: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CaseObservation>, StoreError> {
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases
             WHERE region = $1 AND date >= $2
               AND (temperature IS NULL OR humidity IS NULL OR rainfall IS NULL)
             ORDER BY date ASC"
        );
        let rows = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(region)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(CaseObservation::try_from).collect()
    }

    async fn case_history(
        &self,
        group: &GroupKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<CaseObservation>, StoreError> {
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases
             WHERE region = $1 AND district = $2 AND state = $3 AND disease = $4 AND date >= $5
             ORDER BY date ASC"
        );
        let rows = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(&group.region)
            .bind(&group.district)
            .bind(&group.state)
            .bind(group.disease.as_str())
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(CaseObservation::try_from).collect()
    }

    async fn group_counts(
        &self,
        disease: Option<Disease>,
        min_count: u64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT region, district, state, disease,
                    COUNT(*) AS count, MIN(date) AS earliest, MAX(date) AS latest
             FROM cases
             WHERE ($1::text IS NULL OR disease = $1)
             GROUP BY region, district, state, disease
             HAVING COUNT(*) >= $2
             ORDER BY count DESC, region, district, state, disease",
        )
        .bind(disease.map(|d| d.as_str()))
        .bind(to_i64("minCount", min_count)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.into_iter()
            .map(|r| {
                Ok(GroupSummary {
                    group: GroupKey {
                        disease: parse_disease(&r.disease)?,
                        region: r.region,
                        district: r.district,
                        state: r.state,
                    },
                    count: to_u64(r.count),
                    earliest: r.earliest,
                    latest: r.latest,
                })
            })
            .collect()
    }

    async fn distinct_regions(&self, limit: Option<usize>) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT region FROM cases ORDER BY region LIMIT $1",
        )
        .bind(limit.map(|n| n as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(db)
    }

    async fn latest_case_date(
        &self,
        with_weather: bool,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(date) FROM cases
             WHERE NOT $1 OR (temperature IS NOT NULL AND humidity IS NOT NULL)",
        )
        .bind(with_weather)
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }

    async fn count_cases(&self, filter: CaseFilter) -> Result<u64, StoreError> {
        let predicate = match filter {
            CaseFilter::All => "TRUE",
            CaseFilter::WithWeather => "temperature IS NOT NULL AND humidity IS NOT NULL",
            CaseFilter::MissingTemperature => "temperature IS NULL",
            CaseFilter::MissingHumidity => "humidity IS NULL",
            CaseFilter::MissingRainfall => "rainfall IS NULL",
        };
        let sql = format!("SELECT COUNT(*) FROM cases WHERE {predicate}");
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Ok(to_u64(count))
    }

    async fn count_cases_by(&self, field: CaseField) -> Result<BTreeMap<String, u64>, StoreError> {
        let column = match field {
            CaseField::Disease => "disease",
            CaseField::Region => "region",
        };
        let sql = format!("SELECT {column}, COUNT(*) FROM cases GROUP BY {column}");
        let rows = sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(rows.into_iter().map(|(k, n)| (k, to_u64(n))).collect())
    }

    async fn case_date_bounds(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StoreError> {
        type Bounds = (Option<DateTime<Utc>>, Option<DateTime<Utc>>);
        let (earliest, latest) =
            sqlx::query_as::<_, Bounds>("SELECT MIN(date), MAX(date) FROM cases")
                .fetch_one(&self.pool)
                .await
                .map_err(db)?;
        Ok(earliest.zip(latest))
    }
}

// ── Predictions ───────────────────────────────────────────────

#[async_trait]
impl PredictionStore for PgStore {
    async fn upsert_prediction(&self, prediction: Prediction) -> Result<UpsertOutcome, StoreError> {
        prediction.check()?;
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO predictions (region, district, state, disease, forecast_date,
                                      predicted_cases, confidence, lower_bound, upper_bound,
                                      risk_level, risk_score, model_version, feature_snapshot)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (region, district, disease, forecast_date) DO UPDATE SET
                state = EXCLUDED.state,
                predicted_cases = EXCLUDED.predicted_cases,
                confidence = EXCLUDED.confidence,
                lower_bound = EXCLUDED.lower_bound,
                upper_bound = EXCLUDED.upper_bound,
                risk_level = EXCLUDED.risk_level,
                risk_score = EXCLUDED.risk_score,
                model_version = EXCLUDED.model_version,
                feature_snapshot = EXCLUDED.feature_snapshot,
                updated_at = now()
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(&prediction.region)
        .bind(&prediction.district)
        .bind(&prediction.state)
        .bind(prediction.disease.as_str())
        .bind(prediction.forecast_date)
        .bind(to_i64("predictedCases", prediction.predicted_cases)?)
        .bind(prediction.confidence)
        .bind(to_i64("lower", prediction.confidence_interval.lower)?)
        .bind(to_i64("upper", prediction.confidence_interval.upper)?)
        .bind(prediction.risk_level.as_str())
        .bind(prediction.risk_score)
        .bind(&prediction.model_version)
        .bind(Json(&prediction.feature_snapshot))
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        Ok(outcome(inserted))
    }

    async fn find_prediction(
        &self,
        key: &PredictionKey,
    ) -> Result<Option<Prediction>, StoreError> {
        let sql = format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions
             WHERE region = $1 AND district = $2 AND disease = $3 AND forecast_date = $4"
        );
        let row = sqlx::query_as::<_, PredictionRow>(&sql)
            .bind(&key.region)
            .bind(&key.district)
            .bind(key.disease.as_str())
            .bind(key.forecast_date)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(Prediction::try_from).transpose()
    }

    async fn latest_forecast_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        sqlx::query_scalar::<_, Option<NaiveDate>>("SELECT MAX(forecast_date) FROM predictions")
            .fetch_one(&self.pool)
            .await
            .map_err(db)
    }

    async fn count_predictions(&self) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM predictions")
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Ok(to_u64(count))
    }
}
