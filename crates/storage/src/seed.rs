//! Synthetic history for local runs: every registry region reports every
//! seeded disease on every day of the window.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use medsentinel_core::{
    CaseObservation, CaseStore, Disease, StoreError, UpsertOutcome, KNOWN_REGIONS,
};

pub const SEED_DISEASES: [Disease; 5] = [
    Disease::Dengue,
    Disease::Malaria,
    Disease::Covid19,
    Disease::Flu,
    Disease::Cholera,
];

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub days: u32,
    /// Attach synthetic weather to every record.
    pub with_weather: bool,
    /// Fixed RNG seed for reproducible fixtures.
    pub rng_seed: Option<u64>,
    /// Most recent day of the window (defaults to now).
    pub until: Option<DateTime<Utc>>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            days: 30,
            with_weather: true,
            rng_seed: None,
            until: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedSummary {
    pub inserted: u64,
    pub updated: u64,
}

/// Build the synthetic records without touching storage.
pub fn generate_cases(opts: &SeedOptions) -> Vec<CaseObservation> {
    let mut rng = match opts.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let until = opts.until.unwrap_or_else(Utc::now);
    let per_day = KNOWN_REGIONS.len() * SEED_DISEASES.len();
    let mut cases = Vec::with_capacity(opts.days as usize * per_day);

    for offset in 0..opts.days {
        let date = until - Duration::days(offset as i64);
        for region in KNOWN_REGIONS.iter() {
            for disease in SEED_DISEASES {
                let mut case = CaseObservation::new(
                    region.region,
                    region.district,
                    region.state,
                    disease,
                    date,
                );
                case.new_cases = rng.gen_range(1..=50);
                case.total_cases = case.new_cases + rng.gen_range(0..1000);
                case.population = Some(rng.gen_range(1_000_000..6_000_000));
                if opts.with_weather {
                    case.temperature = Some(rng.gen_range(25..40) as f64);
                    case.humidity = Some(rng.gen_range(50..90) as f64);
                    case.rainfall = Some((rng.gen::<f64>() * 2000.0).round() / 100.0);
                    case.weather_source = Some("seed".to_string());
                    case.weather_updated_at = Some(date);
                }
                case.source = "seed".to_string();
                cases.push(case);
            }
        }
    }
    cases
}

/// Generate and upsert synthetic records.
pub async fn seed_cases(
    store: &dyn CaseStore,
    opts: &SeedOptions,
) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();
    for case in generate_cases(opts) {
        match store.upsert_case(case).await? {
            UpsertOutcome::Inserted => summary.inserted += 1,
            UpsertOutcome::Updated => summary.updated += 1,
        }
    }
    info!(inserted = summary.inserted, updated = summary.updated, "Seeded cases");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use medsentinel_core::CaseFilter;

    #[test]
    fn generates_full_grid() {
        let cases = generate_cases(&SeedOptions {
            days: 3,
            rng_seed: Some(1),
            ..Default::default()
        });
        assert_eq!(cases.len(), 3 * 8 * 5);
        assert!(cases.iter().all(|c| c.new_cases >= 1 && c.total_cases >= c.new_cases));
        assert!(cases.iter().all(|c| c.check().is_ok()));
    }

    #[tokio::test]
    async fn reseeding_same_window_updates() {
        let store = InMemoryStore::new();
        let opts = SeedOptions {
            days: 2,
            with_weather: false,
            rng_seed: Some(7),
            until: Some(Utc::now()),
        };
        let first = seed_cases(&store, &opts).await.unwrap();
        let second = seed_cases(&store, &opts).await.unwrap();
        assert_eq!(first.inserted, 80);
        assert_eq!(second.updated, 80);
        assert_eq!(store.count_cases(CaseFilter::WithWeather).await.unwrap(), 0);
    }
}
