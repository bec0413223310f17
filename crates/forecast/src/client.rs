use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use medsentinel_core::config::ForecastConfig;

use crate::error::ForecastError;
use crate::types::{ForecastRequest, ForecastResponse};

/// Request/response contract of the external forecasting service.
#[async_trait]
pub trait ForecastClient: Send + Sync {
    /// True only when the service reports status "ok".
    async fn health(&self) -> bool;

    async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, ForecastError>;
}

pub struct HttpForecastClient {
    client: Client,
    base_url: String,
}

impl HttpForecastClient {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.service_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ForecastClient for HttpForecastClient {
    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let body: Result<Value, reqwest::Error> = async {
            self.client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match body {
            Ok(body) => body.get("status").and_then(Value::as_str) == Some("ok"),
            Err(e) => {
                warn!(error = %e, "Forecasting service health check failed");
                false
            }
        }
    }

    async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, ForecastError> {
        let url = format!("{}/forecast", self.base_url);
        debug!("Forecast request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ForecastError::Collaborator(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            // FastAPI-style errors carry the reason in `detail`.
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(ForecastError::Collaborator(format!("{status}: {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| ForecastError::InvalidResponse(e.to_string()))
    }
}
