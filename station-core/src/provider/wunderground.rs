use serde::{Deserialize, de::Error as _};
use serde_json::Value;

use crate::{
    astro::{moon_age, moon_phase},
    http::encode_path,
    model::{ClockTime, Conditions, Forecast},
    provider::{Backend, ProviderId, RequestKind, Settings, compass_point, percent, round},
};

/// The legacy Weather Underground REST API.
///
/// Most numbers come back as JSON strings (`"12.4"`, `"81%"`, `"NA"`), so the
/// documents are read into loose [`Value`] fields and converted with [`number`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Wunderground;

impl Backend for Wunderground {
    fn id(&self) -> ProviderId {
        ProviderId::Wunderground
    }

    fn host(&self) -> &'static str {
        "api.wunderground.com"
    }

    fn budget(&self, kind: RequestKind) -> usize {
        match kind {
            RequestKind::Conditions => 8 * 1024,
            RequestKind::Forecasts => 16 * 1024,
        }
    }

    fn request_target(&self, kind: RequestKind, settings: &Settings, out: &mut String) {
        let location = &settings.location;

        out.push_str("/api/");
        out.push_str(&encode_path(&settings.api_key));
        out.push('/');

        let loc = if location.nearest {
            out.push_str("geolookup/");
            format!("{},{}", location.latitude, location.longitude)
        } else {
            location.query.clone()
        };

        out.push_str(match kind {
            RequestKind::Conditions => "astronomy/conditions",
            RequestKind::Forecasts => "forecast",
        });
        out.push_str("/q/");
        out.push_str(&encode_path(&loc));
        out.push_str(".json");
    }

    fn update_conditions(&self, doc: &Value, out: &mut Conditions, settings: &Settings) -> serde_json::Result<bool> {
        let parsed = WuConditionsResponse::deserialize(doc)?;
        let obs = parsed.current_observation;

        let Some(observed) = number(&obs.observation_epoch) else {
            return Ok(false);
        };
        let epoch = settings.tz.to_local(observed as i64);
        if epoch <= out.epoch {
            return Ok(false);
        }

        let metric = settings.units.is_metric();
        let pick = |c: &Option<Value>, f: &Option<Value>| number(if metric { c } else { f });
        let temp = pick(&obs.temp_c, &obs.temp_f)
            .map(round)
            .ok_or_else(|| serde_json::Error::custom("observation has no temperature"))?;

        out.epoch = epoch;
        out.weather = obs.weather;
        out.temp = temp;
        out.feels_like = pick(&obs.feelslike_c, &obs.feelslike_f).map(round).unwrap_or(temp);
        out.wind = pick(&obs.wind_kph, &obs.wind_mph).map(round);
        out.pressure = pick(&obs.pressure_mb, &obs.pressure_in).map(|p| p as f32);
        out.pressure_trend = pressure_trend(&obs.pressure_trend);
        out.humidity = number(&obs.relative_humidity).map(percent);

        out.wind_degrees = number(&obs.wind_degrees).map(round);
        out.wind_dir = if obs.wind_dir.is_empty() {
            out.wind_degrees.map(compass_point).unwrap_or_default().to_string()
        } else {
            obs.wind_dir
        };

        if !obs.observation_location.city.is_empty() {
            out.city = obs.observation_location.city;
        }

        out.sunrise = parsed.sun_phase.sunrise.clock();
        out.sunset = parsed.sun_phase.sunset.clock();
        out.moonrise = parsed.moon_phase.moonrise.clock();
        out.moonset = parsed.moon_phase.moonset.clock();

        out.moon_age = number(&parsed.moon_phase.age_of_moon).map(round).unwrap_or_else(|| moon_age(epoch));
        out.moon_phase = if parsed.moon_phase.phase_of_moon.is_empty() {
            moon_phase(out.moon_age).to_string()
        } else {
            parsed.moon_phase.phase_of_moon
        };

        out.icon = match (ClockTime::from_local_epoch(epoch), out.sunrise, out.sunset) {
            (Some(now), Some(rise), Some(set)) if now.hour < rise.hour || now.hour > set.hour => {
                format!("nt_{}", obs.icon)
            }
            _ => obs.icon,
        };

        Ok(true)
    }

    fn update_forecasts(&self, doc: &Value, out: &mut [Forecast], settings: &Settings) -> serde_json::Result<()> {
        let days = WuForecastResponse::deserialize(doc)?.forecast.simpleforecast.forecastday;
        let metric = settings.units.is_metric();

        for (slot, day) in out.iter_mut().zip(days) {
            let (Some(epoch), Some(high), Some(low)) = (number(&day.date.epoch), day.high.value(metric), day.low.value(metric))
            else {
                // A day without a date or temperatures ends the usable forecast.
                break;
            };
            let wind_degrees = number(&day.avewind.degrees).map(round);

            *slot = Forecast {
                epoch: settings.tz.to_local(epoch as i64),
                day: day.date.weekday_short,
                temp_high: high,
                temp_low: low,
                ave_wind: day.avewind.speed(metric),
                max_wind: day.maxwind.speed(metric),
                wind_degrees,
                wind_dir: if day.avewind.dir.is_empty() {
                    wind_degrees.map(compass_point).unwrap_or_default().to_string()
                } else {
                    day.avewind.dir
                },
                ave_humidity: number(&day.avehumidity).map(percent),
                conditions: day.conditions,
                icon: day.icon,
            };
        }
        Ok(())
    }
}

/// A number sent either as a JSON number or as a numeric string, possibly with a `%` suffix.
fn number(value: &Option<Value>) -> Option<f64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

/// `"+"` rising, `"-"` falling, otherwise the sign of any number given.
fn pressure_trend(value: &Option<Value>) -> i8 {
    match value {
        Some(Value::String(s)) if s.trim() == "+" => 1,
        Some(Value::String(s)) if s.trim() == "-" => -1,
        _ => match number(value) {
            Some(n) if n > 0.0 => 1,
            Some(n) if n < 0.0 => -1,
            _ => 0,
        },
    }
}

#[derive(Debug, Default, Deserialize)]
struct WuPlace {
    #[serde(default)]
    city: String,
}

#[derive(Debug, Deserialize)]
struct WuObservation {
    observation_epoch: Option<Value>,
    #[serde(default)]
    weather: String,
    #[serde(default)]
    icon: String,
    temp_c: Option<Value>,
    temp_f: Option<Value>,
    feelslike_c: Option<Value>,
    feelslike_f: Option<Value>,
    wind_kph: Option<Value>,
    wind_mph: Option<Value>,
    pressure_mb: Option<Value>,
    pressure_in: Option<Value>,
    pressure_trend: Option<Value>,
    relative_humidity: Option<Value>,
    wind_degrees: Option<Value>,
    #[serde(default)]
    wind_dir: String,
    #[serde(default)]
    observation_location: WuPlace,
}

#[derive(Debug, Default, Deserialize)]
struct WuHourMinute {
    hour: Option<Value>,
    minute: Option<Value>,
}

impl WuHourMinute {
    /// `None` unless both parts are whole numbers within a day.
    fn clock(&self) -> Option<ClockTime> {
        let part = |value: &Option<Value>| {
            number(value)
                .filter(|n| n.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(n))
                .map(|n| n as u8)
        };
        ClockTime::new(part(&self.hour)?, part(&self.minute)?)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WuSunPhase {
    #[serde(default)]
    sunrise: WuHourMinute,
    #[serde(default)]
    sunset: WuHourMinute,
}

#[derive(Debug, Default, Deserialize)]
struct WuMoonPhase {
    #[serde(rename = "ageOfMoon")]
    age_of_moon: Option<Value>,
    #[serde(rename = "phaseofMoon", default)]
    phase_of_moon: String,
    #[serde(default)]
    moonrise: WuHourMinute,
    #[serde(default)]
    moonset: WuHourMinute,
}

#[derive(Debug, Deserialize)]
struct WuConditionsResponse {
    current_observation: WuObservation,
    #[serde(default)]
    sun_phase: WuSunPhase,
    #[serde(default)]
    moon_phase: WuMoonPhase,
}

#[derive(Debug, Default, Deserialize)]
struct WuDate {
    epoch: Option<Value>,
    #[serde(default)]
    weekday_short: String,
}

#[derive(Debug, Default, Deserialize)]
struct WuTemperature {
    celsius: Option<Value>,
    fahrenheit: Option<Value>,
}

impl WuTemperature {
    fn value(&self, metric: bool) -> Option<i32> {
        number(if metric { &self.celsius } else { &self.fahrenheit }).map(round)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WuWind {
    kph: Option<Value>,
    mph: Option<Value>,
    degrees: Option<Value>,
    #[serde(default)]
    dir: String,
}

impl WuWind {
    fn speed(&self, metric: bool) -> Option<i32> {
        number(if metric { &self.kph } else { &self.mph }).map(round)
    }
}

#[derive(Debug, Deserialize)]
struct WuForecastDay {
    #[serde(default)]
    date: WuDate,
    #[serde(default)]
    high: WuTemperature,
    #[serde(default)]
    low: WuTemperature,
    #[serde(default)]
    maxwind: WuWind,
    #[serde(default)]
    avewind: WuWind,
    avehumidity: Option<Value>,
    #[serde(default)]
    conditions: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WuSimpleForecast {
    forecastday: Vec<WuForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WuForecast {
    simpleforecast: WuSimpleForecast,
}

#[derive(Debug, Deserialize)]
struct WuForecastResponse {
    forecast: WuForecast,
}
