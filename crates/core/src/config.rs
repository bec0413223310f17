use std::env;
use std::str::FromStr;

use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Disease;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Boolean flags are on unless explicitly set to "false" (or off when
/// `default` is false, unless set to "true").
fn profiled_env_flag(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) if default => !v.eq_ignore_ascii_case("false"),
        Some(v) => v.eq_ignore_ascii_case("true"),
        None => default,
    }
}

/// Credentials copied from `.env.example` still carry their placeholder text.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || (v.starts_with("your_") && v.ends_with("_here"))
}

fn profiled_credential(profile: &str, key: &str) -> Option<String> {
    profiled_env_opt(profile, key).filter(|v| !is_placeholder(v))
}

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
///
/// The `cron` crate requires 6 fields (sec min hr dom mon dow); operators
/// usually write the 5-field form.
pub fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {}", trimmed))
    } else {
        Schedule::from_str(trimmed)
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub disease_source: DiseaseSourceConfig,
    pub auxiliary_source: AuxiliarySourceConfig,
    pub weather: WeatherConfig,
    pub forecast: ForecastConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MEDSENTINEL_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("MEDSENTINEL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            scheduler: SchedulerConfig::from_env_profiled(p),
            disease_source: DiseaseSourceConfig::from_env_profiled(p),
            auxiliary_source: AuxiliarySourceConfig::from_env_profiled(p),
            weather: WeatherConfig::from_env_profiled(p),
            forecast: ForecastConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject configurations that would only fail later, inside a job.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("DISEASE_API_URL", &self.disease_source.api_url)?;
        check_url("NEWS_API_URL", &self.auxiliary_source.news_api_url)?;
        check_url("OPEN_METEO_URL", &self.weather.open_meteo_url)?;
        check_url("WEATHER_API_URL", &self.weather.open_weather_url)?;
        check_url("FORECASTING_SERVICE_URL", &self.forecast.service_url)?;

        for (key, expr) in [
            ("DISEASE_CRON", &self.scheduler.disease_cron),
            ("WEATHER_CRON", &self.scheduler.weather_cron),
            ("AUXILIARY_CRON", &self.scheduler.auxiliary_cron),
            ("FORECAST_CRON", &self.scheduler.forecast_cron),
        ] {
            if parse_cron(expr).is_err() {
                return Err(ConfigError::InvalidCron {
                    key: key.to_string(),
                    expr: expr.clone(),
                });
            }
        }

        if self.forecast.min_data_points == 0 {
            return Err(invalid("FORECAST_MIN_DATA_POINTS", "must be at least 1"));
        }
        if !(1..=365).contains(&self.forecast.horizon_days) {
            return Err(invalid("FORECAST_HORIZON_DAYS", "must be between 1 and 365"));
        }
        if self.forecast.history_days == 0 {
            return Err(invalid("FORECAST_HISTORY_DAYS", "must be at least 1"));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(invalid("SCHEDULER_POLL_SECS", "must be at least 1"));
        }
        if self.storage.backend == StorageBackend::Postgres
            && !self.storage.postgres.is_configured()
        {
            return Err(invalid("PG_USERNAME", "required when STORAGE_BACKEND=postgres"));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  storage:     backend={}", self.storage.backend.as_str());
        tracing::info!(
            "  scheduler:   etl={}, forecast={}, poll={}s",
            self.scheduler.etl_enabled,
            self.scheduler.forecast_enabled,
            self.scheduler.poll_interval_secs
        );
        tracing::info!(
            "  disease:     url={}, disease={}, country={}",
            self.disease_source.api_url,
            self.disease_source.disease,
            self.disease_source.country
        );
        tracing::info!(
            "  auxiliary:   enabled={}, key_configured={}",
            self.auxiliary_source.enabled,
            self.auxiliary_source.news_api_key.is_some()
        );
        tracing::info!(
            "  weather:     primary={}, fallback_configured={}",
            self.weather.open_meteo_url,
            self.weather.fallback_configured()
        );
        tracing::info!(
            "  forecast:    url={}, min_points={}, horizon={}d",
            self.forecast.service_url,
            self.forecast.min_data_points,
            self.forecast.horizon_days
        );
    }

    /// Return a redacted view safe for operator output (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "storage": {
                "backend": self.storage.backend.as_str(),
                "postgres": {
                    "host": self.storage.postgres.host,
                    "database": self.storage.postgres.database,
                    "configured": self.storage.postgres.is_configured(),
                },
            },
            "scheduler": {
                "etl_enabled": self.scheduler.etl_enabled,
                "forecast_enabled": self.scheduler.forecast_enabled,
                "disease_cron": self.scheduler.disease_cron,
                "weather_cron": self.scheduler.weather_cron,
                "auxiliary_cron": self.scheduler.auxiliary_cron,
                "forecast_cron": self.scheduler.forecast_cron,
            },
            "disease_source": {
                "api_url": self.disease_source.api_url,
                "disease": self.disease_source.disease,
                "country": self.disease_source.country,
                "target_regions": self.disease_source.target_regions,
            },
            "auxiliary_source": {
                "enabled": self.auxiliary_source.enabled,
                "configured": self.auxiliary_source.news_api_key.is_some(),
            },
            "weather": {
                "open_meteo_url": self.weather.open_meteo_url,
                "fallback_configured": self.weather.fallback_configured(),
            },
            "forecast": {
                "service_url": self.forecast.service_url,
                "min_data_points": self.forecast.min_data_points,
                "horizon_days": self.forecast.horizon_days,
                "history_days": self.forecast.history_days,
            },
        })
    }
}

impl Default for Config {
    /// Built-in defaults, independent of the process environment.
    fn default() -> Self {
        Self {
            profile: String::new(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            disease_source: DiseaseSourceConfig::default(),
            auxiliary_source: AuxiliarySourceConfig::default(),
            weather: WeatherConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn check_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| invalid(key, &format!("invalid URL: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid(key, "must be an http(s) URL"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid(key, "URL has no host"));
    }
    Ok(())
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub postgres: PostgresConfig,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let backend = profiled_env_or(p, "STORAGE_BACKEND", "memory").to_lowercase();
        let backend = match backend.as_str() {
            "postgres" | "pg" => StorageBackend::Postgres,
            _ => StorageBackend::Memory,
        };
        Self {
            backend,
            postgres: PostgresConfig::from_env_profiled(p),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            postgres: PostgresConfig::default(),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "medsentinel"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "medsentinel".to_string(),
            username: None,
            password: None,
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Periodic ingestion jobs (`ENABLE_ETL_SCHEDULER`, default on).
    pub etl_enabled: bool,
    /// Daily forecast job (`ENABLE_FORECAST_SCHEDULER`, default on).
    pub forecast_enabled: bool,
    pub disease_cron: String,
    pub weather_cron: String,
    pub auxiliary_cron: String,
    pub forecast_cron: String,
    /// How often the tick loop checks for due jobs.
    pub poll_interval_secs: u64,
    /// Upper bound on regions taken from storage for a weather run.
    pub weather_region_limit: usize,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            etl_enabled: profiled_env_flag(p, "ENABLE_ETL_SCHEDULER", true),
            forecast_enabled: profiled_env_flag(p, "ENABLE_FORECAST_SCHEDULER", true),
            disease_cron: profiled_env_or(p, "DISEASE_CRON", &d.disease_cron),
            weather_cron: profiled_env_or(p, "WEATHER_CRON", &d.weather_cron),
            auxiliary_cron: profiled_env_or(p, "AUXILIARY_CRON", &d.auxiliary_cron),
            forecast_cron: profiled_env_or(p, "FORECAST_CRON", &d.forecast_cron),
            poll_interval_secs: profiled_env_u64(p, "SCHEDULER_POLL_SECS", d.poll_interval_secs),
            weather_region_limit: profiled_env_u32(p, "WEATHER_REGION_LIMIT", 50) as usize,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            etl_enabled: true,
            forecast_enabled: true,
            disease_cron: "0 2 * * *".to_string(),
            weather_cron: "0 */6 * * *".to_string(),
            auxiliary_cron: "30 2 * * *".to_string(),
            forecast_cron: "0 3 * * *".to_string(),
            poll_interval_secs: 30,
            weather_region_limit: 50,
        }
    }
}

// ── Disease source ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseSourceConfig {
    pub api_url: String,
    /// Disease stamped onto every record this source produces.
    pub disease: Disease,
    /// Country whose aggregate is fanned out across the region registry.
    pub country: String,
    /// Restrict the fan-out to these registry regions (`TARGET_REGIONS`).
    pub target_regions: Option<Vec<String>>,
    pub timeout_secs: u64,
    /// Fixed seed for the fan-out jitter (reproducible runs).
    pub jitter_seed: Option<u64>,
}

impl DiseaseSourceConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            api_url: profiled_env_or(p, "DISEASE_API_URL", &d.api_url),
            disease: profiled_env_opt(p, "DISEASE_TYPE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.disease),
            country: profiled_env_or(p, "DISEASE_COUNTRY", &d.country),
            target_regions: profiled_env_opt(p, "TARGET_REGIONS").map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            timeout_secs: profiled_env_u64(p, "DISEASE_TIMEOUT_SECS", d.timeout_secs),
            jitter_seed: profiled_env_opt(p, "DISEASE_JITTER_SEED").and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for DiseaseSourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://disease.sh/v3/covid-19".to_string(),
            disease: Disease::Covid19,
            country: "India".to_string(),
            target_regions: None,
            timeout_secs: 10,
            jitter_seed: None,
        }
    }
}

// ── Auxiliary (news) source ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxiliarySourceConfig {
    /// `ENABLE_AUXILIARY_ETL`, default off.
    pub enabled: bool,
    pub news_api_url: String,
    #[serde(skip_serializing)]
    pub news_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl AuxiliarySourceConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            enabled: profiled_env_flag(p, "ENABLE_AUXILIARY_ETL", false),
            news_api_url: profiled_env_or(p, "NEWS_API_URL", &d.news_api_url),
            news_api_key: profiled_credential(p, "NEWS_API_KEY"),
            timeout_secs: profiled_env_u64(p, "NEWS_TIMEOUT_SECS", d.timeout_secs),
        }
    }
}

impl Default for AuxiliarySourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            news_api_url: "https://newsapi.org/v2".to_string(),
            news_api_key: None,
            timeout_secs: 10,
        }
    }
}

// ── Weather ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Primary source, no credential required.
    pub open_meteo_url: String,
    /// Fallback source base URL.
    pub open_weather_url: String,
    #[serde(skip_serializing)]
    pub open_weather_api_key: Option<String>,
    pub primary_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    /// IANA timezone passed to the primary source.
    pub timezone: String,
    /// Pause between upstream calls during backfill.
    pub backfill_delay_ms: u64,
    pub backfill_days: u32,
}

impl WeatherConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            open_meteo_url: profiled_env_or(p, "OPEN_METEO_URL", &d.open_meteo_url),
            open_weather_url: profiled_env_or(p, "WEATHER_API_URL", &d.open_weather_url),
            open_weather_api_key: profiled_credential(p, "OPENWEATHER_API_KEY"),
            primary_timeout_secs: profiled_env_u64(
                p,
                "OPEN_METEO_TIMEOUT_SECS",
                d.primary_timeout_secs,
            ),
            fallback_timeout_secs: profiled_env_u64(
                p,
                "OPENWEATHER_TIMEOUT_SECS",
                d.fallback_timeout_secs,
            ),
            timezone: profiled_env_or(p, "WEATHER_TIMEZONE", &d.timezone),
            backfill_delay_ms: profiled_env_u64(p, "BACKFILL_DELAY_MS", d.backfill_delay_ms),
            backfill_days: profiled_env_u32(p, "BACKFILL_DAYS", d.backfill_days),
        }
    }

    /// The fallback source is only tried when it has a usable credential.
    pub fn fallback_configured(&self) -> bool {
        self.open_weather_api_key.is_some()
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            open_meteo_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            open_weather_url: "https://api.openweathermap.org/data/2.5".to_string(),
            open_weather_api_key: None,
            primary_timeout_secs: 10,
            fallback_timeout_secs: 5,
            timezone: "Asia/Kolkata".to_string(),
            backfill_delay_ms: 1000,
            backfill_days: 90,
        }
    }
}

// ── Forecasting collaborator ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub service_url: String,
    /// Eligibility threshold: minimum historical points per group.
    pub min_data_points: usize,
    pub horizon_days: u32,
    /// Window of history sent to the collaborator.
    pub history_days: u32,
    pub timeout_secs: u64,
}

impl ForecastConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            service_url: profiled_env_or(p, "FORECASTING_SERVICE_URL", &d.service_url),
            min_data_points: profiled_env_u32(p, "FORECAST_MIN_DATA_POINTS", 7) as usize,
            horizon_days: profiled_env_u32(p, "FORECAST_HORIZON_DAYS", d.horizon_days),
            history_days: profiled_env_u32(p, "FORECAST_HISTORY_DAYS", d.history_days),
            timeout_secs: profiled_env_u64(p, "FORECAST_TIMEOUT_SECS", d.timeout_secs),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000".to_string(),
            min_data_points: 7,
            horizon_days: 14,
            history_days: 30,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast.min_data_points, 7);
        assert_eq!(config.forecast.horizon_days, 14);
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn rejects_bad_cron() {
        let mut config = Config::default();
        config.scheduler.weather_cron = "every six hours".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCron {
                key: "WEATHER_CRON".to_string(),
                expr: "every six hours".to_string(),
            })
        );
    }

    #[test]
    fn rejects_zero_threshold_and_bad_url() {
        let mut config = Config::default();
        config.forecast.min_data_points = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.forecast.service_url = "localhost:5000".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "FORECASTING_SERVICE_URL"
        ));
    }

    #[test]
    fn urls_need_http_scheme_and_host() {
        for bad in ["http://", "not a url", "ftp://example.com", "mailto:ops@example.com"] {
            let mut config = Config::default();
            config.forecast.service_url = bad.to_string();
            let rejected_key = match config.validate() {
                Err(ConfigError::InvalidValue { key, .. }) => key,
                other => panic!("accepted {bad:?}: {other:?}"),
            };
            assert_eq!(rejected_key, "FORECASTING_SERVICE_URL");
        }

        let mut config = Config::default();
        config.disease_source.api_url = "http://".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.forecast.service_url = "http://forecaster:5000/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn postgres_backend_needs_credentials() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Postgres;
        assert!(config.validate().is_err());
        config.storage.postgres.username = Some("medsentinel".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn placeholder_credentials_are_ignored() {
        assert!(is_placeholder("your_openweather_api_key_here"));
        assert!(is_placeholder("  "));
        assert!(!is_placeholder("3f9a0c"));
    }

    #[test]
    fn cron_accepts_five_and_six_fields() {
        assert!(parse_cron("0 */6 * * *").is_ok());
        assert!(parse_cron("0 0 */6 * * *").is_ok());
        assert!(parse_cron("not cron").is_err());
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        env::set_var("MEDSENTINEL_TEST_LOOKUP", "plain");
        env::set_var("STAGING_MEDSENTINEL_TEST_LOOKUP", "staged");
        assert_eq!(
            profiled_env_opt("STAGING", "MEDSENTINEL_TEST_LOOKUP").as_deref(),
            Some("staged")
        );
        assert_eq!(
            profiled_env_opt("", "MEDSENTINEL_TEST_LOOKUP").as_deref(),
            Some("plain")
        );
    }

    #[test]
    fn flags_respect_their_default() {
        env::set_var("MEDSENTINEL_TEST_FLAG_OFF", "false");
        env::set_var("MEDSENTINEL_TEST_FLAG_ON", "true");
        assert!(!profiled_env_flag("", "MEDSENTINEL_TEST_FLAG_OFF", true));
        assert!(profiled_env_flag("", "MEDSENTINEL_TEST_FLAG_ON", false));
        assert!(profiled_env_flag("", "MEDSENTINEL_TEST_FLAG_UNSET", true));
        assert!(!profiled_env_flag("", "MEDSENTINEL_TEST_FLAG_UNSET", false));
    }
}
