pub mod auxiliary;
pub mod backfill;
pub mod disease;
pub mod error;
pub mod pipeline;
pub mod sources;
pub mod weather;

pub use auxiliary::AuxiliaryPipeline;
pub use backfill::{BackfillResult, WeatherBackfill};
pub use disease::DiseasePipeline;
pub use error::{ExtractionError, PipelineError};
pub use pipeline::{upsert_cases, LoadError, LoadResult, Pipeline};
pub use sources::{DiseaseSource, NewsArticle, NewsSource, WeatherProvider, WeatherSource};
pub use weather::{RegionSelection, RegionWeather, WeatherPipeline};
