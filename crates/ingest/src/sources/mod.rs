//! Upstream source seams. Each trait has one HTTP implementation; tests
//! substitute in-process fakes.

pub mod disease_sh;
pub mod news_api;
pub mod open_meteo;
pub mod open_weather;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use medsentinel_core::KnownRegion;

use crate::error::ExtractionError;

pub use disease_sh::DiseaseShClient;
pub use news_api::NewsApiClient;
pub use open_meteo::OpenMeteoClient;
pub use open_weather::OpenWeatherClient;

/// Aggregate case counts (disease.sh-compatible payloads).
#[async_trait]
pub trait DiseaseSource: Send + Sync {
    /// Aggregate for a single country.
    async fn country(&self, country: &str) -> Result<Value, ExtractionError>;

    /// Coarse list of every country's aggregate.
    async fn all_countries(&self) -> Result<Vec<Value>, ExtractionError>;
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// False when no usable credential is present.
    fn is_configured(&self) -> bool;

    /// Newest-first articles matching `query`.
    async fn search(&self, query: &str, page_size: u32)
        -> Result<Vec<NewsArticle>, ExtractionError>;
}

/// Which upstream shape a weather payload has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherProvider {
    OpenMeteo,
    OpenWeatherMap,
}

impl WeatherProvider {
    pub fn tag(&self) -> &'static str {
        match self {
            WeatherProvider::OpenMeteo => "openmeteo",
            WeatherProvider::OpenWeatherMap => "openweathermap",
        }
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn provider(&self) -> WeatherProvider;

    /// Current conditions at the region's coordinates.
    async fn current(&self, region: &KnownRegion) -> Result<Value, ExtractionError>;

    /// Daily aggregates for one past day.
    async fn daily(&self, region: &KnownRegion, _day: NaiveDate) -> Result<Value, ExtractionError> {
        Err(ExtractionError::NotConfigured(format!(
            "{} has no historical endpoint (region {})",
            self.provider().tag(),
            region.region
        )))
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET `url` and decode a JSON body, mapping non-2xx to `Status`.
pub(crate) async fn get_json<Q: serde::Serialize + ?Sized>(
    client: &Client,
    url: &str,
    query: &Q,
) -> Result<Value, ExtractionError> {
    debug!("GET {}", url);
    let response = client.get(url).query(query).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ExtractionError::Status { status, body });
    }

    Ok(response.json().await?)
}
