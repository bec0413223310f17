use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use medsentinel_core::config::AuxiliarySourceConfig;

use super::{get_json, http_client, NewsArticle, NewsSource};
use crate::error::ExtractionError;

/// NewsAPI `/everything` search.
pub struct NewsApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsApiClient {
    pub fn new(config: &AuxiliarySourceConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.news_api_url.trim_end_matches('/').to_string(),
            api_key: config.news_api_key.clone(),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[async_trait]
impl NewsSource for NewsApiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(
        &self,
        query: &str,
        page_size: u32,
    ) -> Result<Vec<NewsArticle>, ExtractionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ExtractionError::NotConfigured("NEWS_API_KEY".into()))?;
        let url = format!("{}/everything", self.base_url);
        let page_size = page_size.to_string();
        let body = get_json(
            &self.client,
            &url,
            &[
                ("q", query),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ],
        )
        .await?;
        let parsed: SearchResponse = serde_json::from_value(body)
            .map_err(|e| ExtractionError::Malformed(format!("news response: {e}")))?;
        Ok(parsed.articles)
    }
}
