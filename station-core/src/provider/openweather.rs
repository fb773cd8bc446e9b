use serde::Deserialize;
use serde_json::Value;

use crate::{
    astro::{moon_age, moon_phase},
    http::encode_query,
    model::{ClockTime, Conditions, Forecast, Units},
    provider::{Backend, ProviderId, RequestKind, Settings, compass_point, percent, pressure_from_hpa, round, short_weekday},
};

/// 3-hourly entries in a forecast response; 40 covers five days.
const FORECAST_ENTRIES: usize = 40;

const SECONDS_PER_DAY: i64 = 86_400;
const NOON: i64 = 12 * 3_600;

/// OpenWeatherMap current weather and 5-day / 3-hour forecast.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenWeatherMap;

impl Backend for OpenWeatherMap {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeatherMap
    }

    fn host(&self) -> &'static str {
        "api.openweathermap.org"
    }

    fn budget(&self, kind: RequestKind) -> usize {
        match kind {
            RequestKind::Conditions => 4 * 1024,
            RequestKind::Forecasts => 32 * 1024,
        }
    }

    fn request_target(&self, kind: RequestKind, settings: &Settings, out: &mut String) {
        out.push_str("/data/2.5/");
        out.push_str(match kind {
            RequestKind::Conditions => "weather",
            RequestKind::Forecasts => "forecast",
        });

        let location = &settings.location;
        if location.nearest {
            out.push_str(&format!("?lat={}&lon={}", location.latitude, location.longitude));
        } else {
            out.push_str("?q=");
            out.push_str(&encode_query(&location.query));
        }

        if kind == RequestKind::Forecasts {
            out.push_str(&format!("&cnt={FORECAST_ENTRIES}"));
        }

        out.push_str("&appid=");
        out.push_str(&encode_query(&settings.api_key));
        out.push_str(match settings.units {
            Units::Metric => "&units=metric",
            Units::Imperial => "&units=imperial",
        });
    }

    fn update_conditions(&self, doc: &Value, out: &mut Conditions, settings: &Settings) -> serde_json::Result<bool> {
        let parsed = OwCurrentResponse::deserialize(doc)?;

        let epoch = settings.tz.to_local(parsed.dt);
        if epoch <= out.epoch {
            return Ok(false);
        }

        out.epoch = epoch;
        out.moon_age = moon_age(epoch);
        out.moon_phase = moon_phase(out.moon_age).to_string();
        out.moonrise = None;
        out.moonset = None;

        let weather = parsed.weather.first();
        out.weather = weather.map(OwWeather::summary).unwrap_or_default();
        out.icon = weather.map(|w| w.icon.clone()).unwrap_or_default();

        out.temp = round(parsed.main.temp);
        out.feels_like = parsed.main.feels_like.map(round).unwrap_or(out.temp);
        out.humidity = parsed.main.humidity.map(percent);
        out.pressure = parsed.main.pressure.map(|p| pressure_from_hpa(p, settings.units));
        out.pressure_trend = 0;

        out.wind = parsed.wind.speed.map(|s| wind_speed(s, settings.units));
        out.wind_degrees = parsed.wind.deg.map(round);
        out.wind_dir = out.wind_degrees.map(compass_point).unwrap_or_default().to_string();

        out.sunrise = parsed.sys.sunrise.and_then(|t| ClockTime::from_local_epoch(settings.tz.to_local(t)));
        out.sunset = parsed.sys.sunset.and_then(|t| ClockTime::from_local_epoch(settings.tz.to_local(t)));

        if !parsed.name.is_empty() {
            out.city = match parsed.sys.country.as_deref() {
                Some(country) if !country.is_empty() => format!("{}, {}", parsed.name, country),
                _ => parsed.name,
            };
        }

        Ok(true)
    }

    fn update_forecasts(&self, doc: &Value, out: &mut [Forecast], settings: &Settings) -> serde_json::Result<()> {
        let parsed = OwForecastResponse::deserialize(doc)?;

        // Entries arrive in time order; group them by local calendar day.
        let mut days: Vec<(i64, Vec<(i64, &OwForecastEntry)>)> = Vec::new();
        for entry in &parsed.list {
            let local = settings.tz.to_local(entry.dt);
            let day = local.div_euclid(SECONDS_PER_DAY);
            match days.last_mut() {
                Some((d, entries)) if *d == day => entries.push((local, entry)),
                _ => days.push((day, vec![(local, entry)])),
            }
        }

        for (slot, (day, entries)) in out.iter_mut().zip(&days) {
            *slot = summarize_day(*day * SECONDS_PER_DAY, entries, settings.units);
        }
        Ok(())
    }
}

/// Fold one day's 3-hourly entries into a daily forecast.
fn summarize_day(midnight: i64, entries: &[(i64, &OwForecastEntry)], units: Units) -> Forecast {
    let temps_high = entries.iter().map(|(_, e)| e.main.temp_max.unwrap_or(e.main.temp));
    let temps_low = entries.iter().map(|(_, e)| e.main.temp_min.unwrap_or(e.main.temp));
    let speeds: Vec<f64> = entries.iter().filter_map(|(_, e)| e.wind.speed).collect();
    let gusts = entries.iter().filter_map(|(_, e)| e.wind.gust.or(e.wind.speed));
    let humidities: Vec<f64> = entries.iter().filter_map(|(_, e)| e.main.humidity).collect();

    // The entry nearest local noon stands for the whole day.
    let representative = entries
        .iter()
        .min_by_key(|(local, _)| (local - midnight - NOON).abs())
        .map(|(_, e)| *e);

    let wind_degrees = representative.and_then(|e| e.wind.deg).map(round);
    let weather = representative.and_then(|e| e.weather.first());

    Forecast {
        epoch: midnight,
        day: short_weekday(midnight),
        temp_high: round(temps_high.fold(f64::MIN, f64::max)),
        temp_low: round(temps_low.fold(f64::MAX, f64::min)),
        ave_wind: mean(&speeds).map(|s| wind_speed(s, units)),
        max_wind: gusts.reduce(f64::max).map(|g| wind_speed(g, units)),
        wind_degrees,
        wind_dir: wind_degrees.map(compass_point).unwrap_or_default().to_string(),
        ave_humidity: mean(&humidities).map(percent),
        conditions: weather.map(OwWeather::summary).unwrap_or_default(),
        icon: weather.map(|w| w.icon.clone()).unwrap_or_default(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Metric responses give wind in m/s; the display wants km/h. Imperial is already mph.
fn wind_speed(speed: f64, units: Units) -> i32 {
    match units {
        Units::Metric => (speed * 3.6).ceil() as i32,
        Units::Imperial => round(speed),
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    pressure: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

impl OwWeather {
    fn summary(&self) -> String {
        if self.description.is_empty() { self.main.clone() } else { self.description.clone() }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
    gust: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    #[serde(default)]
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}
