//! Outbreak mentions mined from news articles. Low-confidence data: an
//! article counts when it names a monitored city, and the case count is
//! whatever number precedes "cases", "patients" or "people".

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};

use medsentinel_core::{CaseObservation, CaseStore, Disease, KnownRegion, KNOWN_REGIONS};

use crate::disease::parse_date;
use crate::error::PipelineError;
use crate::pipeline::{upsert_cases, LoadResult, Pipeline};
use crate::sources::{NewsArticle, NewsSource};

pub const NEWS_DISEASES: [Disease; 4] = [
    Disease::Dengue,
    Disease::Malaria,
    Disease::Cholera,
    Disease::Flu,
];

const PAGE_SIZE: u32 = 10;

fn case_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(cases?|patients?|people)").expect("static regex")
    })
}

pub struct AuxiliaryPipeline {
    source: Arc<dyn NewsSource>,
    store: Arc<dyn CaseStore>,
    enabled: bool,
    country: String,
}

impl AuxiliaryPipeline {
    pub fn new(
        source: Arc<dyn NewsSource>,
        store: Arc<dyn CaseStore>,
        enabled: bool,
        country: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            enabled,
            country: country.into(),
        }
    }
}

/// Build a record when the article mentions a registry city.
pub fn article_to_case(article: &NewsArticle, disease: Disease) -> Option<CaseObservation> {
    let text = format!(
        "{} {}",
        article.title.as_deref().unwrap_or_default(),
        article.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    let city: &KnownRegion = KNOWN_REGIONS
        .iter()
        .find(|r| text.contains(&r.region.to_lowercase()))?;

    let cases = case_count_pattern()
        .captures(&text)
        .and_then(|c| c[1].parse::<u64>().ok())
        .unwrap_or(0);

    let date = article
        .published_at
        .as_deref()
        .and_then(|p| parse_date(p).ok())
        .unwrap_or_else(Utc::now);

    let mut case = CaseObservation::new(city.region, city.region, city.state, disease, date);
    case.new_cases = cases;
    case.total_cases = cases;
    case.source = "news".to_string();
    if let Some(title) = &article.title {
        case.extension.insert("articleTitle".into(), title.as_str().into());
    }
    if let Some(url) = &article.url {
        case.extension.insert("articleUrl".into(), url.as_str().into());
    }
    if let Some(published) = &article.published_at {
        case.extension.insert("publishedAt".into(), published.as_str().into());
    }
    case.extension.insert("confidence".into(), "low".into());
    case.extension.insert("dataSource".into(), "auxiliary-etl".into());
    Some(case)
}

#[async_trait]
impl Pipeline for AuxiliaryPipeline {
    type Raw = Vec<(Disease, NewsArticle)>;
    type Record = CaseObservation;

    fn name(&self) -> &'static str {
        "auxiliary"
    }

    async fn extract(&self) -> Result<Self::Raw, PipelineError> {
        if !self.enabled {
            return Err(PipelineError::Skipped(
                "auxiliary ingestion is disabled (ENABLE_AUXILIARY_ETL)".into(),
            ));
        }
        if !self.source.is_configured() {
            return Err(PipelineError::Skipped("news API key not configured".into()));
        }

        let mut articles = Vec::new();
        for disease in NEWS_DISEASES {
            let query = format!("{} outbreak {}", disease, self.country);
            match self.source.search(&query, PAGE_SIZE).await {
                Ok(found) => {
                    info!(disease = %disease, articles = found.len(), "Fetched news");
                    articles.extend(found.into_iter().map(|a| (disease, a)));
                }
                Err(e) => warn!(disease = %disease, error = %e, "Failed to fetch news"),
            }
        }
        Ok(articles)
    }

    fn transform(&self, raw: Self::Raw) -> Result<Vec<CaseObservation>, PipelineError> {
        let records: Vec<_> = raw
            .iter()
            .filter_map(|(disease, article)| article_to_case(article, *disease))
            .collect();
        if records.is_empty() {
            return Err(PipelineError::Skipped(
                "no articles mentioned a monitored region".into(),
            ));
        }
        Ok(records)
    }

    async fn load(&self, records: Vec<CaseObservation>) -> Result<LoadResult, PipelineError> {
        Ok(upsert_cases(self.store.as_ref(), records).await)
    }
}
