use std::sync::Arc;

use chrono::{Duration, Utc};

use medsentinel_core::{CaseObservation, CaseStore, Disease};
use medsentinel_monitor::{Freshness, JobStatus, Monitor, Severity};
use medsentinel_storage::InMemoryStore;

fn monitor() -> (Arc<InMemoryStore>, Monitor) {
    let store = Arc::new(InMemoryStore::new());
    let monitor = Monitor::new(store.clone(), store.clone());
    (store, monitor)
}

async fn insert(store: &InMemoryStore, region: &str, hours_ago: i64, weather: bool) {
    let date = Utc::now() - Duration::hours(hours_ago);
    let mut case = CaseObservation::new(region, region, "Maharashtra", Disease::Dengue, date);
    case.source = "test".into();
    if weather {
        case.temperature = Some(30.0);
        case.humidity = Some(70.0);
    }
    store.upsert_case(case).await.unwrap();
}

#[tokio::test]
async fn freshness_per_category() {
    let (store, monitor) = monitor();
    insert(&store, "Pune", 30, false).await;
    insert(&store, "Mumbai", 50, true).await;

    let freshness = monitor.data_freshness().await.unwrap();
    let cases = freshness.cases.unwrap();
    assert_eq!(cases.freshness, Freshness::Stale);
    assert!((cases.age_hours - 30.0).abs() < 0.05);
    assert_eq!(freshness.weather.unwrap().freshness, Freshness::Outdated);
    assert!(freshness.predictions.is_none());
}

#[tokio::test]
async fn empty_store_has_no_metrics() {
    let (_, monitor) = monitor();
    let freshness = monitor.data_freshness().await.unwrap();
    assert!(freshness.cases.is_none());
    assert!(freshness.weather.is_none());

    let health = monitor.check_data_health().await.unwrap();
    assert!(!health.healthy);
    assert!(health.issues.iter().any(|i| i.severity == Severity::Low));
    assert!(health.issues.iter().any(|i| i.message.contains("0.0%")));
}

#[tokio::test]
async fn quality_counts() {
    let (store, monitor) = monitor();
    insert(&store, "Pune", 1, true).await;
    insert(&store, "Pune", 49, false).await;
    insert(&store, "Nagpur", 97, false).await;

    let quality = monitor.data_quality().await.unwrap();
    assert_eq!(quality.total_cases, 3);
    assert_eq!(quality.cases_with_weather, 1);
    assert_eq!(quality.cases_without_weather, 2);
    assert_eq!(quality.missing_data.temperature, 2);
    assert_eq!(quality.missing_data.rainfall, 3);
    assert_eq!(quality.cases_by_region["Pune"], 2);
    assert_eq!(quality.cases_by_disease["Dengue"], 3);
    assert_eq!(quality.date_range.days_covered, 4);
}

#[tokio::test]
async fn history_is_bounded() {
    let (_, monitor) = monitor();
    for i in 0..150 {
        let status = if i % 2 == 0 { JobStatus::Success } else { JobStatus::Failed };
        monitor.record_job_execution(&format!("job-{i}"), status, None, None);
    }

    assert_eq!(monitor.job_history(None).len(), 50);
    let all = monitor.job_history(Some(1000));
    assert_eq!(all.len(), 100);
    assert_eq!(all[0].job_name, "job-149");
    assert_eq!(all[99].job_name, "job-50");

    let stats = monitor.job_statistics();
    assert_eq!(stats.overall.total, 100);
    assert_eq!(stats.overall.successful + stats.overall.failed, 100);
}
