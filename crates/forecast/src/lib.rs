//! Client for the external forecasting service and the orchestrator that
//! fans forecasts out over every eligible region/disease group.

pub mod client;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use client::{ForecastClient, HttpForecastClient};
pub use error::ForecastError;
pub use orchestrator::{ForecastRunOptions, GroupForecast, Orchestrator};
pub use types::{
    ForecastPoint, ForecastRequest, ForecastResponse, ForecastSummary, GroupResult, HistoricalPoint,
};
