//! Core library for the `wxstation` weather display.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather provider core and its backends (OpenWeatherMap, Open-Meteo, Wunderground)
//! - Shared records (conditions, forecasts, statistics) and the renderer interface
//!
//! It is used by `station-cli`, but the provider core takes its transport, clock zone
//! and memory probe as parameters so it can run against fakes in tests.

pub mod astro;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod model;
pub mod provider;
pub mod render;
pub mod stats;
pub mod tz;
pub mod wmo;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ProviderConfig, ScheduleConfig, StationConfig};
pub use error::FetchError;
pub use model::{ClockTime, Conditions, Forecast, Units};
pub use provider::{ProviderId, Settings, WeatherProvider};
pub use render::{Renderer, Screen};
pub use stats::Statistics;
