mod cli;
mod commands;
mod startup;
mod state;

use anyhow::Context;
use clap::Parser;

use medsentinel_core::Config;

use crate::cli::Cli;

fn load_config(profile: Option<&str>) -> anyhow::Result<Config> {
    let config = match profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// `RUST_LOG` filter, defaulting to `info`.
fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before RUST_LOG is read and before clap reads
    // env-backed arguments.
    medsentinel_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.profile.as_deref())?;
    let state = startup::build_app_state(config).await?;
    commands::dispatch(&state, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn log_filter_sees_dotenv_values() {
        let dir = std::env::temp_dir().join(format!("medsentinel-dotenv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        std::fs::write(&path, "RUST_LOG=warn\n").unwrap();

        std::env::remove_var("RUST_LOG");
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::INFO));

        dotenvy::from_path(&path).unwrap();
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::WARN));

        std::env::remove_var("RUST_LOG");
        std::fs::remove_dir_all(&dir).ok();
    }
}
