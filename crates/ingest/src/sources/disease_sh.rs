use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use medsentinel_core::config::DiseaseSourceConfig;

use super::{get_json, http_client, DiseaseSource};
use crate::error::ExtractionError;

/// disease.sh-compatible aggregate API.
pub struct DiseaseShClient {
    client: Client,
    base_url: String,
}

impl DiseaseShClient {
    pub fn new(config: &DiseaseSourceConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DiseaseSource for DiseaseShClient {
    async fn country(&self, country: &str) -> Result<Value, ExtractionError> {
        let url = format!("{}/countries/{}", self.base_url, country);
        let body = get_json(&self.client, &url, &[("strict", "true")]).await?;
        if !body.is_object() {
            return Err(ExtractionError::Malformed(format!(
                "expected an object for country {country}"
            )));
        }
        Ok(body)
    }

    async fn all_countries(&self) -> Result<Vec<Value>, ExtractionError> {
        let url = format!("{}/countries", self.base_url);
        match get_json(&self.client, &url, &[] as &[(&str, &str)]).await? {
            Value::Array(items) => Ok(items),
            _ => Err(ExtractionError::Malformed("expected an array of countries".into())),
        }
    }
}
