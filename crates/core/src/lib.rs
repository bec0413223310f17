pub mod config;
pub mod error;
pub mod model;
pub mod region;
pub mod store;

pub use config::Config;
pub use error::*;
pub use model::*;
pub use region::{find_region, select_regions, KnownRegion, KNOWN_REGIONS};
pub use store::{CaseField, CaseFilter, CaseStore, GroupSummary, PredictionStore, UpsertOutcome};
