use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{model::Units, provider::ProviderId};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Where the station is and how its readings are shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub units: Units,

    /// Locate the station from its coordinates (or the network) instead of `query`.
    pub nearest: bool,

    /// Station query understood by the provider, e.g. "Dublin,IE".
    pub query: String,

    pub latitude: f64,
    pub longitude: f64,

    /// "UTC", a fixed offset like "+01:00", or an IANA zone like "Europe/Dublin".
    pub timezone: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            nearest: false,
            query: "Dublin,IE".to_string(),
            latitude: 53.3498,
            longitude: -6.2603,
            timezone: "UTC".to_string(),
        }
    }
}

/// Refresh and screen-cycle timing for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub conditions_interval_secs: u64,
    pub forecasts_interval_secs: u64,
    /// Delay before retrying after a failed fetch.
    pub retry_interval_secs: u64,
    /// How long each screen stays up.
    pub screen_secs: u64,
    /// Forecast slots kept in memory.
    pub forecast_days: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            conditions_interval_secs: 10 * 60,
            forecasts_interval_secs: 60 * 60,
            retry_interval_secs: 60,
            screen_secs: 15,
            forecast_days: 5,
        }
    }
}

impl ScheduleConfig {
    pub fn conditions_interval(&self) -> Duration {
        Duration::from_secs(self.conditions_interval_secs.max(1))
    }

    pub fn forecasts_interval(&self) -> Duration {
        Duration::from_secs(self.forecasts_interval_secs.max(1))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(1))
    }

    pub fn screen_interval(&self) -> Duration {
        Duration::from_secs(self.screen_secs.max(1))
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "openweathermap" or "openmeteo".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.openweathermap]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `wxstation configure <provider>` (e.g. `wxstation configure openmeteo`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wxstation", "wxstation")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    /// Keyless providers are always configured.
    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.needs_api_key() || self.provider_api_key(provider_id).is_some()
    }
}
