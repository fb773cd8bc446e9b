use crate::{
    Config,
    error::{FailureKind, FetchError},
    http::{Connector, HttpJsonFetcher, TcpConnector},
    memory::{HeapProbe, SystemHeap},
    model::{Conditions, Forecast, Units},
    provider::{openmeteo::OpenMeteo, openweather::OpenWeatherMap, wunderground::Wunderground},
    stats::Statistics,
    tz::{TimeZoneConverter, zone_from_name},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug};
use tracing::{debug, info, warn};

pub mod openmeteo;
pub mod openweather;
pub mod wunderground;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeatherMap,
    OpenMeteo,
    Wunderground,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeatherMap => "openweathermap",
            ProviderId::OpenMeteo => "openmeteo",
            ProviderId::Wunderground => "wunderground",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeatherMap, ProviderId::OpenMeteo, ProviderId::Wunderground]
    }

    pub fn needs_api_key(&self) -> bool {
        !matches!(self, ProviderId::OpenMeteo)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweathermap" | "openweather" | "owm" => Ok(ProviderId::OpenWeatherMap),
            "openmeteo" | "open-meteo" => Ok(ProviderId::OpenMeteo),
            "wunderground" | "wu" => Ok(ProviderId::Wunderground),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweathermap, openmeteo, wunderground."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Conditions,
    Forecasts,
}

impl RequestKind {
    fn as_str(self) -> &'static str {
        match self {
            RequestKind::Conditions => "conditions",
            RequestKind::Forecasts => "forecasts",
        }
    }
}

/// Where to ask for weather.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Station query, e.g. "Dublin,IE".
    pub query: String,
    /// Use coordinates rather than the station query.
    pub nearest: bool,
}

/// What a backend needs to shape requests and normalize values.
#[derive(Debug)]
pub struct Settings {
    pub units: Units,
    pub api_key: String,
    pub location: Location,
    pub tz: Box<dyn TimeZoneConverter>,
}

impl Settings {
    pub fn from_config(config: &Config, api_key: String) -> anyhow::Result<Self> {
        let station = &config.station;
        Ok(Self {
            units: station.units,
            api_key,
            location: Location {
                latitude: station.latitude,
                longitude: station.longitude,
                query: station.query.clone(),
                nearest: station.nearest,
            },
            tz: zone_from_name(&station.timezone)?,
        })
    }
}

/// An auxiliary request a backend makes once, before normal fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub host: &'static str,
    pub target: String,
    pub budget: usize,
}

/// One upstream weather API: how to ask it, and how to read its answers.
///
/// Update methods deserialize everything they need before touching `out`;
/// a missing required container is reported as a `serde_json::Error`.
pub trait Backend: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    fn host(&self) -> &'static str;

    /// Largest document expected for `kind`, in bytes. Also the free-memory floor.
    fn budget(&self, kind: RequestKind) -> usize;

    /// Append path and query for `kind` to the request line.
    fn request_target(&self, kind: RequestKind, settings: &Settings, out: &mut String);

    /// Copy a conditions document into `out`; `Ok(false)` when it is not newer than `out.epoch`.
    fn update_conditions(&self, doc: &Value, out: &mut Conditions, settings: &Settings) -> serde_json::Result<bool>;

    /// Fill `out` from a forecast document, one slot per day.
    fn update_forecasts(&self, doc: &Value, out: &mut [Forecast], settings: &Settings) -> serde_json::Result<()>;

    /// Lookup to run in `begin`, if this backend needs one.
    fn geolocation(&self, _settings: &Settings) -> Option<Lookup> {
        None
    }

    /// Apply the lookup result to `location`, returning the resolved city name.
    fn apply_geolocation(&self, _doc: &Value, _location: &mut Location) -> serde_json::Result<String> {
        Ok(String::new())
    }
}

pub fn backend_for(id: ProviderId) -> Box<dyn Backend> {
    match id {
        ProviderId::OpenWeatherMap => Box::new(OpenWeatherMap),
        ProviderId::OpenMeteo => Box::new(OpenMeteo),
        ProviderId::Wunderground => Box::new(Wunderground),
    }
}

/// Fetches and normalizes weather from one backend, keeping failure statistics.
#[derive(Debug)]
pub struct WeatherProvider<C = TcpConnector> {
    backend: Box<dyn Backend>,
    fetcher: HttpJsonFetcher<C>,
    heap: Box<dyn HeapProbe>,
    settings: Settings,
}

impl WeatherProvider<TcpConnector> {
    pub fn new(backend: Box<dyn Backend>, settings: Settings) -> Self {
        Self::with_connector(backend, settings, TcpConnector)
    }
}

impl<C: Connector> WeatherProvider<C> {
    pub fn with_connector(backend: Box<dyn Backend>, settings: Settings, connector: C) -> Self {
        Self {
            backend,
            fetcher: HttpJsonFetcher::new(connector),
            heap: Box::new(SystemHeap),
            settings,
        }
    }

    pub fn with_fetcher(mut self, fetcher: HttpJsonFetcher<C>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_heap_probe(mut self, heap: impl HeapProbe + 'static) -> Self {
        self.heap = Box::new(heap);
        self
    }

    pub fn id(&self) -> ProviderId {
        self.backend.id()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// One-time setup before the first fetch. Failures are logged and ignored.
    pub async fn begin(&mut self, conditions: &mut Conditions) {
        let Some(lookup) = self.backend.geolocation(&self.settings) else {
            return;
        };

        let doc = match self.fetch_document(lookup.host, lookup.budget, "geolocation", &lookup.target).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("geolocation failed, using configured location: {e}");
                return;
            }
        };

        let mut location = self.settings.location.clone();
        match self.backend.apply_geolocation(&doc, &mut location) {
            Ok(city) => {
                info!(
                    "located {} at {:.4},{:.4}",
                    city, location.latitude, location.longitude
                );
                self.settings.location = location;
                if !city.is_empty() {
                    conditions.city = city;
                }
            }
            Err(e) => warn!("geolocation response unusable, using configured location: {e}"),
        }
    }

    /// Refresh `out` with current conditions.
    ///
    /// Returns `true` only when `out` was replaced by a strictly newer observation.
    /// A `false` with no failure counter incremented means the data was stale.
    pub async fn fetch_conditions(&mut self, out: &mut Conditions, stats: &mut Statistics) -> bool {
        match self.try_fetch_conditions(out).await {
            Ok(Some(previous)) => {
                stats.num_updates += 1;
                if previous != 0 {
                    stats.update(out.epoch - previous);
                }
                stats.last_fetch_conditions = Some(Utc::now());
                info!("{}: conditions updated ({} {}{})", self.id(), out.weather, out.temp, self.settings.units.temperature_symbol());
                true
            }
            Ok(None) => {
                debug!("{}: no new conditions", self.id());
                false
            }
            Err(e) => {
                record_failure(&e, stats);
                warn!("{}: conditions fetch failed: {e}", self.id());
                false
            }
        }
    }

    /// Overwrite every slot of `out` with a fresh forecast.
    pub async fn fetch_forecasts(&mut self, out: &mut [Forecast], stats: &mut Statistics) -> bool {
        match self.try_fetch_forecasts(out).await {
            Ok(()) => {
                stats.last_fetch_forecasts = Some(Utc::now());
                info!("{}: forecasts updated ({} days)", self.id(), out.iter().filter(|f| !f.is_empty()).count());
                true
            }
            Err(e) => {
                record_failure(&e, stats);
                warn!("{}: forecast fetch failed: {e}", self.id());
                false
            }
        }
    }

    /// `Some(previous_epoch)` when `out` was updated, `None` when the response was stale.
    async fn try_fetch_conditions(&self, out: &mut Conditions) -> Result<Option<i64>, FetchError> {
        let doc = self.fetch_kind(RequestKind::Conditions).await?;

        let mut next = out.clone();
        let fresh = self
            .backend
            .update_conditions(&doc, &mut next, &self.settings)
            .map_err(|source| FetchError::Parse { what: "conditions", source })?;

        if !fresh || next.epoch <= out.epoch {
            return Ok(None);
        }
        let previous = out.epoch;
        *out = next;
        Ok(Some(previous))
    }

    async fn try_fetch_forecasts(&self, out: &mut [Forecast]) -> Result<(), FetchError> {
        let doc = self.fetch_kind(RequestKind::Forecasts).await?;

        let mut next = vec![Forecast::default(); out.len()];
        self.backend
            .update_forecasts(&doc, &mut next, &self.settings)
            .map_err(|source| FetchError::Parse { what: "forecasts", source })?;

        out.clone_from_slice(&next);
        Ok(())
    }

    async fn fetch_kind(&self, kind: RequestKind) -> Result<Value, FetchError> {
        let budget = self.backend.budget(kind);
        self.check_memory(budget)?;

        let mut target = String::new();
        self.backend.request_target(kind, &self.settings, &mut target);
        self.fetch_document(self.backend.host(), budget, kind.as_str(), &target).await
    }

    async fn fetch_document(&self, host: &str, budget: usize, what: &'static str, target: &str) -> Result<Value, FetchError> {
        let body = self.fetcher.connect_and_get(host, |t| t.push_str(target)).await?;
        let doc = self.fetcher.read_document(host, body, budget).await?;
        debug!("{}: {} bytes of {}", host, doc.len(), what);

        // One value, like a streaming parser would take; a chunked trailer may follow it.
        let mut de = serde_json::Deserializer::from_slice(&doc);
        Value::deserialize(&mut de).map_err(|source| FetchError::Parse { what, source })
    }

    fn check_memory(&self, needed: usize) -> Result<(), FetchError> {
        match self.heap.available() {
            Some(available) if available <= needed => {
                Err(FetchError::MemoryPressure { available, needed })
            }
            _ => Ok(()),
        }
    }
}

fn record_failure(err: &FetchError, stats: &mut Statistics) {
    match err.kind() {
        FailureKind::Connect => stats.connect_failures += 1,
        FailureKind::Parse => stats.parse_failures += 1,
        FailureKind::Memory => stats.mem_failures += 1,
    }
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(id: ProviderId, config: &Config) -> anyhow::Result<WeatherProvider> {
    let api_key = match config.provider_api_key(id) {
        Some(key) => key.to_owned(),
        None if id.needs_api_key() => {
            return Err(anyhow::anyhow!(
                "No API key configured for provider '{id}'.\n\
                     Hint: run `wxstation configure {id}` and enter your API key."
            ));
        }
        None => String::new(),
    };

    let settings = Settings::from_config(config, api_key)?;
    Ok(WeatherProvider::new(backend_for(id), settings))
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<WeatherProvider> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

// Normalization helpers shared by the backends.

pub(crate) fn round(value: f64) -> i32 {
    value.round() as i32
}

pub(crate) fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

pub(crate) fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa * 0.029_53
}

/// Pressure reported in hPa, converted for display.
pub(crate) fn pressure_from_hpa(hpa: f64, units: Units) -> f32 {
    let value = match units {
        Units::Metric => hpa,
        Units::Imperial => hpa_to_inhg(hpa),
    };
    value as f32
}

/// 16-point compass name for a bearing in degrees.
pub(crate) fn compass_point(degrees: i32) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
    ];
    let index = ((f64::from(degrees.rem_euclid(360)) / 22.5).round() as usize) % POINTS.len();
    POINTS[index]
}

pub(crate) fn short_weekday(local_epoch: i64) -> String {
    chrono::DateTime::from_timestamp(local_epoch, 0)
        .map(|dt| dt.format("%a").to_string())
        .unwrap_or_default()
}
