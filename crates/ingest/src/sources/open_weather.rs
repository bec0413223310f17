use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use medsentinel_core::config::WeatherConfig;
use medsentinel_core::KnownRegion;

use super::{get_json, http_client, WeatherProvider, WeatherSource};
use crate::error::ExtractionError;

/// OpenWeatherMap current weather: fallback source, needs an API key.
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// `None` when no usable key is configured.
    pub fn from_config(config: &WeatherConfig) -> Option<Self> {
        let api_key = config.open_weather_api_key.clone()?;
        Some(Self {
            client: http_client(config.fallback_timeout_secs),
            base_url: config.open_weather_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    fn provider(&self) -> WeatherProvider {
        WeatherProvider::OpenWeatherMap
    }

    async fn current(&self, region: &KnownRegion) -> Result<Value, ExtractionError> {
        let url = format!("{}/weather", self.base_url);
        let lat = region.latitude.to_string();
        let lon = region.longitude.to_string();
        get_json(
            &self.client,
            &url,
            &[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ],
        )
        .await
    }
}
