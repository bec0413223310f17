use clap::{Parser, Subcommand};

use medsentinel_core::Disease;

/// Epidemiological ingestion, monitoring and forecast orchestration.
#[derive(Parser, Debug)]
#[command(name = "medsentinel", version, about)]
pub struct Cli {
    /// Configuration profile; keys are looked up as `{PROFILE}_{KEY}` first
    #[arg(long, global = true, env = "MEDSENTINEL_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the ETL and forecast schedulers and run until interrupted
    Serve {
        /// Seed synthetic case history before starting
        #[arg(long)]
        seed: bool,
    },
    /// Run one ingestion pipeline now
    Ingest {
        #[command(subcommand)]
        target: IngestTarget,
    },
    /// Forecast orchestration
    Forecast {
        #[command(subcommand)]
        action: ForecastAction,
    },
    /// Data freshness, quality and job history
    Monitor {
        #[command(subcommand)]
        action: MonitorAction,
    },
    /// Fill historical weather into cases that lack it
    BackfillWeather {
        /// Comma-separated regions (default: every region in storage)
        #[arg(long, value_delimiter = ',')]
        regions: Option<Vec<String>>,
        /// Days back to consider
        #[arg(long)]
        days: Option<u32>,
    },
    /// Insert synthetic case history for every registry city
    Seed {
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// Leave weather fields empty
        #[arg(long)]
        no_weather: bool,
        /// Fixed RNG seed for reproducible data
        #[arg(long)]
        rng_seed: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum IngestTarget {
    Disease,
    Weather {
        /// Comma-separated regions (default: regions already in storage)
        #[arg(long, value_delimiter = ',')]
        regions: Option<Vec<String>>,
    },
    Auxiliary,
}

#[derive(Subcommand, Debug)]
pub enum ForecastAction {
    /// Forecast every eligible group
    All {
        #[arg(long)]
        disease: Option<Disease>,
        /// Horizon in days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Forecast a single group
    Group {
        #[arg(long)]
        region: String,
        /// Defaults to the registry district, then the region
        #[arg(long)]
        district: Option<String>,
        /// Defaults to the registry state
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        disease: Disease,
        #[arg(long)]
        days: Option<u32>,
    },
    /// List groups with enough history to forecast
    Regions {
        #[arg(long)]
        disease: Option<Disease>,
    },
    /// Check the forecasting service health
    Health,
}

#[derive(Subcommand, Debug)]
pub enum MonitorAction {
    Freshness,
    Quality,
    Health,
    Jobs {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weather_regions() {
        let cli = Cli::try_parse_from([
            "medsentinel",
            "ingest",
            "weather",
            "--regions",
            "Pune,Mumbai",
        ])
        .unwrap();
        match cli.command {
            Command::Ingest {
                target: IngestTarget::Weather { regions },
            } => assert_eq!(regions, Some(vec!["Pune".to_string(), "Mumbai".to_string()])),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_forecast_group() {
        let cli = Cli::try_parse_from([
            "medsentinel",
            "forecast",
            "group",
            "--region",
            "Delhi",
            "--disease",
            "covid-19",
        ])
        .unwrap();
        match cli.command {
            Command::Forecast {
                action: ForecastAction::Group { region, disease, district, .. },
            } => {
                assert_eq!(region, "Delhi");
                assert_eq!(disease, Disease::Covid19);
                assert!(district.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_disease() {
        let args = ["medsentinel", "forecast", "regions", "--disease", "plague"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
