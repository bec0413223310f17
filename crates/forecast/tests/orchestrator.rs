use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use medsentinel_core::config::ForecastConfig;
use medsentinel_core::{
    CaseObservation, CaseStore, Disease, GroupKey, PredictionKey, PredictionStore, RiskLevel,
};
use medsentinel_forecast::{
    ForecastClient, ForecastError, ForecastPoint, ForecastRequest, ForecastResponse,
    ForecastRunOptions, Orchestrator,
};
use medsentinel_storage::{seed_cases, InMemoryStore, SeedOptions};

// ── Fake collaborator ─────────────────────────────────────────

struct FakeForecaster {
    healthy: bool,
    failing_region: Option<&'static str>,
    health_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
}

impl FakeForecaster {
    fn new(healthy: bool) -> Self {
        Self {
            healthy,
            failing_region: None,
            health_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
        }
    }

    fn failing_for(region: &'static str) -> Self {
        Self {
            failing_region: Some(region),
            ..Self::new(true)
        }
    }

    fn calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst) + self.forecast_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastClient for FakeForecaster {
    async fn health(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.healthy
    }

    async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, ForecastError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_region == Some(request.region.as_str()) {
            return Err(ForecastError::Collaborator("500: model diverged".into()));
        }
        let start = Utc::now().date_naive();
        let forecast_points = (1..=request.forecast_days)
            .map(|i| ForecastPoint {
                date: format!("{}T00:00:00", start + Duration::days(i64::from(i))),
                predicted_cases: 10.4 + f64::from(i),
                lower_bound: -1.0,
                upper_bound: 30.0,
            })
            .collect();
        Ok(ForecastResponse {
            region: request.region.clone(),
            district: request.district.clone(),
            state: request.state.clone(),
            disease: request.disease.to_string(),
            forecast_points,
            confidence: 0.75,
            risk_level: "high".into(),
            risk_score: 0.7,
            model_version: "fake-1".into(),
        })
    }
}

fn orchestrator(store: &Arc<InMemoryStore>, client: Arc<FakeForecaster>) -> Orchestrator {
    Orchestrator::new(store.clone(), store.clone(), client, ForecastConfig::default())
}

fn pune_dengue() -> GroupKey {
    GroupKey {
        region: "Pune".into(),
        district: "Pune".into(),
        state: "Maharashtra".into(),
        disease: Disease::Dengue,
    }
}

async fn insert_days(store: &InMemoryStore, group: &GroupKey, days: i64) {
    for day in 0..days {
        let date = Utc::now() - Duration::days(day) - Duration::hours(1);
        let mut case = CaseObservation::new(
            &group.region,
            &group.district,
            &group.state,
            group.disease,
            date,
        );
        case.new_cases = 5;
        case.total_cases = 100;
        case.source = "test".into();
        store.upsert_case(case).await.unwrap();
    }
}

// ── Eligibility ───────────────────────────────────────────────

#[tokio::test]
async fn six_points_rejected_without_collaborator_call() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(FakeForecaster::new(true));
    let orch = orchestrator(&store, client.clone());
    insert_days(&store, &pune_dengue(), 6).await;

    assert!(orch.available_regions(None).await.unwrap().is_empty());
    let err = orch.generate_and_save(&pune_dengue(), None).await.unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { got: 6, need: 7, .. }));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn seven_points_forecast_and_persist() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(FakeForecaster::new(true));
    let orch = orchestrator(&store, client.clone());
    insert_days(&store, &pune_dengue(), 7).await;

    let groups = orch.available_regions(Some(Disease::Dengue)).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 7);

    let done = orch.generate_and_save(&pune_dengue(), Some(5)).await.unwrap();
    assert_eq!(done.saved_count, 5);
    assert_eq!(store.count_predictions().await.unwrap(), 5);

    let key = PredictionKey {
        region: "Pune".into(),
        district: "Pune".into(),
        disease: Disease::Dengue,
        forecast_date: Utc::now().date_naive() + Duration::days(1),
    };
    let saved = store.find_prediction(&key).await.unwrap().unwrap();
    assert_eq!(saved.predicted_cases, 11);
    assert_eq!(saved.confidence_interval.lower, 0);
    assert_eq!(saved.risk_level, RiskLevel::High);
    assert_eq!(saved.model_version, "fake-1");

    // Re-running replaces rather than duplicates.
    orch.generate_and_save(&pune_dengue(), Some(5)).await.unwrap();
    assert_eq!(store.count_predictions().await.unwrap(), 5);
}

#[tokio::test]
async fn unhealthy_collaborator_is_unavailable() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(FakeForecaster::new(false));
    let orch = orchestrator(&store, client.clone());
    insert_days(&store, &pune_dengue(), 10).await;

    assert!(!orch.check_health().await);
    let err = orch.generate_and_save(&pune_dengue(), None).await.unwrap_err();
    assert!(matches!(err, ForecastError::CollaboratorUnavailable(_)));
    assert_eq!(client.forecast_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.count_predictions().await.unwrap(), 0);
}

// ── Fan-out ───────────────────────────────────────────────────

#[tokio::test]
async fn failing_groups_do_not_stop_the_run() {
    let store = Arc::new(InMemoryStore::new());
    seed_cases(
        store.as_ref(),
        &SeedOptions {
            days: 30,
            rng_seed: Some(7),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let client = Arc::new(FakeForecaster::failing_for("Delhi"));
    let orch = orchestrator(&store, client);

    let summary = orch
        .generate_all(&ForecastRunOptions {
            disease: None,
            horizon_days: Some(3),
        })
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.total, 40);
    assert_eq!(summary.successful + summary.failed, 40);
    assert_eq!(summary.failed, 5);
    assert!(summary
        .results
        .iter()
        .filter(|r| !r.success)
        .all(|r| r.group.region == "Delhi"
            && r.error.as_deref().unwrap_or("").contains("diverged")));
    assert_eq!(store.count_predictions().await.unwrap(), 35 * 3);
}

#[tokio::test]
async fn empty_store_reports_nothing_to_do() {
    let store = Arc::new(InMemoryStore::new());
    let orch = orchestrator(&store, Arc::new(FakeForecaster::new(true)));
    let summary = orch.generate_all(&ForecastRunOptions::default()).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.message, "No regions with sufficient data");
}
