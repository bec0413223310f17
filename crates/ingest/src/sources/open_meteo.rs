use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;

use medsentinel_core::config::WeatherConfig;
use medsentinel_core::KnownRegion;

use super::{get_json, http_client, WeatherProvider, WeatherSource};
use crate::error::ExtractionError;

/// Open-Meteo: primary source, no credential required.
pub struct OpenMeteoClient {
    client: Client,
    url: String,
    timezone: String,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            client: http_client(config.primary_timeout_secs),
            url: config.open_meteo_url.clone(),
            timezone: config.timezone.clone(),
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    fn provider(&self) -> WeatherProvider {
        WeatherProvider::OpenMeteo
    }

    async fn current(&self, region: &KnownRegion) -> Result<Value, ExtractionError> {
        let latitude = region.latitude.to_string();
        let longitude = region.longitude.to_string();
        get_json(
            &self.client,
            &self.url,
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", "temperature_2m,relative_humidity_2m,precipitation"),
                ("timezone", self.timezone.as_str()),
            ],
        )
        .await
    }

    async fn daily(&self, region: &KnownRegion, day: NaiveDate) -> Result<Value, ExtractionError> {
        let latitude = region.latitude.to_string();
        let longitude = region.longitude.to_string();
        let day = day.format("%Y-%m-%d").to_string();
        get_json(
            &self.client,
            &self.url,
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,relative_humidity_2m_mean,precipitation_sum",
                ),
                ("start_date", day.as_str()),
                ("end_date", day.as_str()),
                ("timezone", self.timezone.as_str()),
            ],
        )
        .await
    }
}
