use std::io;

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Select, Text};
use station_core::{
    Config, ProviderId, Units, WeatherProvider,
    provider::{default_provider_from_config, provider_from_config},
};
use tracing::info;

use crate::{display::TextRenderer, scheduler::Station};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wxstation", version, about = "Weather station display for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure a provider and the station location.
    Configure {
        /// Provider short name, e.g. "openweathermap", "openmeteo" or "wunderground".
        provider: String,
    },

    /// Fetch once and print every screen.
    Show {
        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<String>,
    },

    /// Keep the display current until interrupted with Ctrl-C.
    Run {
        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { provider } => {
                let config = Config::load()?;
                let provider = resolve_provider(&config, provider.as_deref())?;
                let mut station = Station::new(
                    provider,
                    TextRenderer::new(io::stdout().lock(), config.station.units),
                    config.schedule.forecast_days,
                );

                station.start().await;
                station.refresh_conditions().await;
                station.refresh_forecasts().await;
                station.show_all()
            }
            Command::Run { provider } => {
                let config = Config::load()?;
                let provider = resolve_provider(&config, provider.as_deref())?;
                info!("starting with provider {}", provider.id());

                let mut station = Station::new(
                    provider,
                    TextRenderer::new(io::stdout(), config.station.units),
                    config.schedule.forecast_days,
                );
                let shutdown = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("cannot listen for Ctrl-C: {e}");
                        std::future::pending::<()>().await;
                    }
                };
                station.run(&config.schedule, shutdown).await
            }
        }
    }
}

fn resolve_provider(config: &Config, name: Option<&str>) -> anyhow::Result<WeatherProvider> {
    match name {
        Some(name) => provider_from_config(ProviderId::try_from(name)?, config),
        None => default_provider_from_config(config),
    }
}

/// Interactive setup: API key (when the provider needs one), units and location.
fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.needs_api_key() {
        let message = format!("API key for {id}:");
        let mut prompt = Text::new(&message);
        if let Some(existing) = config.provider_api_key(id) {
            prompt = prompt.with_default(existing);
        }
        let key = prompt.prompt().context("Failed to read API key")?;
        config.upsert_provider_api_key(id, key.trim().to_string());
    }
    config.set_default_provider(id);

    let station = &mut config.station;

    let units = Select::new("Units:", vec!["metric", "imperial"])
        .with_starting_cursor(usize::from(!station.units.is_metric()))
        .prompt()
        .context("Failed to read units")?;
    station.units = if units == "imperial" { Units::Imperial } else { Units::Metric };

    station.nearest = Confirm::new("Use coordinates instead of a station name?")
        .with_default(station.nearest)
        .with_help_message("Open-Meteo takes the nearest position from your IP address")
        .prompt()
        .context("Failed to read location mode")?;

    if station.nearest {
        station.latitude = CustomType::<f64>::new("Latitude:")
            .with_default(station.latitude)
            .prompt()
            .context("Failed to read latitude")?;
        station.longitude = CustomType::<f64>::new("Longitude:")
            .with_default(station.longitude)
            .prompt()
            .context("Failed to read longitude")?;
    } else {
        station.query = Text::new("Station (city,country):")
            .with_default(&station.query)
            .prompt()
            .context("Failed to read station")?;
    }

    station.timezone = Text::new("Time zone (UTC, +01:00 or Europe/Dublin):")
        .with_default(&station.timezone)
        .prompt()
        .context("Failed to read time zone")?;
    station_core::tz::zone_from_name(&station.timezone)?;

    config.save()?;
    println!("Saved {} as the default provider in {}", id, Config::config_file_path()?.display());
    Ok(())
}
