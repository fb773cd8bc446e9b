use serde::{Deserialize, de::Error as _};
use serde_json::Value;

use crate::{
    astro::{moon_age, moon_phase},
    http::encode_query,
    model::{ClockTime, Conditions, Forecast, Units},
    provider::{Backend, Location, Lookup, ProviderId, RequestKind, Settings, compass_point, percent, pressure_from_hpa, round, short_weekday},
    wmo::{weather_description, weather_icon},
};

const CONDITIONS_VARIABLES: &str = "&current=temperature_2m,relative_humidity_2m,apparent_temperature,is_day,weather_code,surface_pressure,wind_speed_10m,wind_direction_10m&forecast_days=1&daily=sunrise,sunset";

const FORECAST_VARIABLES: &str = "&daily=weather_code,temperature_2m_max,temperature_2m_min,wind_speed_10m_max,wind_gusts_10m_max,wind_direction_10m_dominant&forecast_days=7";

const GEOCODING_HOST: &str = "geocoding-api.open-meteo.com";
const IP_LOCATION_HOST: &str = "ip-api.com";

/// Open-Meteo: keyless, located by coordinates only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenMeteo;

impl Backend for OpenMeteo {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn host(&self) -> &'static str {
        "api.open-meteo.com"
    }

    fn budget(&self, _kind: RequestKind) -> usize {
        4 * 1024
    }

    fn request_target(&self, kind: RequestKind, settings: &Settings, out: &mut String) {
        let location = &settings.location;
        out.push_str(&format!(
            "/v1/forecast?latitude={}&longitude={}&timeformat=unixtime&timezone=auto",
            location.latitude, location.longitude
        ));
        out.push_str(match settings.units {
            Units::Metric => "&temperature_unit=celsius&wind_speed_unit=kmh&precipitation_unit=mm",
            Units::Imperial => "&temperature_unit=fahrenheit&wind_speed_unit=mph&precipitation_unit=inch",
        });
        out.push_str(match kind {
            RequestKind::Conditions => CONDITIONS_VARIABLES,
            RequestKind::Forecasts => FORECAST_VARIABLES,
        });
    }

    fn update_conditions(&self, doc: &Value, out: &mut Conditions, settings: &Settings) -> serde_json::Result<bool> {
        let parsed = OmConditionsResponse::deserialize(doc)?;
        let current = parsed.current;

        let epoch = settings.tz.to_local(current.time);
        if epoch <= out.epoch {
            return Ok(false);
        }

        out.epoch = epoch;
        out.moon_age = moon_age(epoch);
        out.moon_phase = moon_phase(out.moon_age).to_string();
        out.moonrise = None;
        out.moonset = None;

        let code = current.weather_code.unwrap_or(-1);
        out.weather = weather_description(code).to_string();
        out.icon = current.weather_code.map(|c| weather_icon(c, current.is_day != Some(0))).unwrap_or_default();

        out.temp = round(current.temperature_2m);
        out.feels_like = current.apparent_temperature.map(round).unwrap_or(out.temp);
        out.humidity = current.relative_humidity_2m.map(percent);
        out.pressure = current.surface_pressure.map(|p| pressure_from_hpa(p, settings.units));
        out.pressure_trend = 0;

        out.wind = current.wind_speed_10m.map(round);
        out.wind_degrees = current.wind_direction_10m.map(round);
        out.wind_dir = out.wind_degrees.map(compass_point).unwrap_or_default().to_string();

        let local_clock = |t: Option<&i64>| t.and_then(|&t| ClockTime::from_local_epoch(settings.tz.to_local(t)));
        out.sunrise = local_clock(parsed.daily.sunrise.first());
        out.sunset = local_clock(parsed.daily.sunset.first());

        Ok(true)
    }

    fn update_forecasts(&self, doc: &Value, out: &mut [Forecast], settings: &Settings) -> serde_json::Result<()> {
        let daily = OmForecastResponse::deserialize(doc)?.daily;

        for (i, (slot, &time)) in out.iter_mut().zip(&daily.time).enumerate() {
            let (Some(high), Some(low)) = (at(&daily.temperature_2m_max, i), at(&daily.temperature_2m_min, i)) else {
                // Days past the model horizon come back as nulls.
                break;
            };

            let epoch = settings.tz.to_local(time);
            let code = at(&daily.weather_code, i).map(round);
            let wind_degrees = at(&daily.wind_direction_10m_dominant, i).map(round);

            *slot = Forecast {
                epoch,
                day: short_weekday(epoch),
                temp_high: round(high),
                temp_low: round(low),
                ave_wind: at(&daily.wind_speed_10m_max, i).map(round),
                max_wind: at(&daily.wind_gusts_10m_max, i).map(round),
                wind_degrees,
                wind_dir: wind_degrees.map(compass_point).unwrap_or_default().to_string(),
                ave_humidity: None,
                conditions: weather_description(code.unwrap_or(-1)).to_string(),
                icon: code.map(|c| weather_icon(c, true)).unwrap_or_default(),
            };
        }
        Ok(())
    }

    fn geolocation(&self, settings: &Settings) -> Option<Lookup> {
        let location = &settings.location;
        if location.nearest {
            return Some(Lookup {
                host: IP_LOCATION_HOST,
                target: "/json?fields=status,lat,lon,city,countryCode".to_string(),
                budget: 1024,
            });
        }

        let name = location.query.split(',').next().unwrap_or_default().trim();
        if name.is_empty() {
            return None;
        }
        Some(Lookup {
            host: GEOCODING_HOST,
            target: format!("/v1/search?name={}&count=1&language=en&format=json", encode_query(name)),
            budget: 4 * 1024,
        })
    }

    fn apply_geolocation(&self, doc: &Value, location: &mut Location) -> serde_json::Result<String> {
        if location.nearest {
            let found = IpLocation::deserialize(doc)?;
            if found.status != "success" {
                return Err(serde_json::Error::custom(format!("ip lookup status '{}'", found.status)));
            }
            location.latitude = found.lat;
            location.longitude = found.lon;
            return Ok(city_label(&found.city, &found.country_code));
        }

        let found = GeocodingResponse::deserialize(doc)?
            .results
            .into_iter()
            .next()
            .ok_or_else(|| serde_json::Error::custom(format!("no place named '{}'", location.query)))?;
        location.latitude = found.latitude;
        location.longitude = found.longitude;
        Ok(city_label(&found.name, &found.country_code))
    }
}

fn at<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

fn city_label(name: &str, country: &str) -> String {
    if country.is_empty() { name.to_string() } else { format!("{name}, {country}") }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: i64,
    temperature_2m: f64,
    relative_humidity_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    is_day: Option<u8>,
    weather_code: Option<i32>,
    surface_pressure: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OmSunTimes {
    #[serde(default)]
    sunrise: Vec<i64>,
    #[serde(default)]
    sunset: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct OmConditionsResponse {
    current: OmCurrent,
    #[serde(default)]
    daily: OmSunTimes,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<i64>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_gusts_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m_dominant: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    daily: OmDaily,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpLocation {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country_code: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WeatherProvider, memory::FixedHeap, testing::ScriptedConnector};
    use serde_json::json;

    fn settings(units: Units, nearest: bool) -> Settings {
        Settings {
            units,
            api_key: String::new(),
            location: Location { latitude: 53.35, longitude: -6.26, query: "Dublin,IE".into(), nearest },
            tz: Box::new(chrono::Utc),
        }
    }

    fn current() -> Value {
        json!({
            "latitude": 53.34,
            "longitude": -6.25,
            "utc_offset_seconds": 0,
            "timezone": "Europe/Dublin",
            "current": {
                "time": 1_730_971_800,
                "interval": 900,
                "temperature_2m": 13.6,
                "relative_humidity_2m": 88,
                "apparent_temperature": 12.1,
                "is_day": 1,
                "weather_code": 3,
                "surface_pressure": 1022,
                "wind_speed_10m": 14.2,
                "wind_direction_10m": 134
            },
            "daily": {"time": [1_730_937_600], "sunrise": [1_730_964_978], "sunset": [1_730_997_677]}
        })
    }

    #[test]
    fn conditions_request_carries_units_and_variables() {
        let mut target = String::new();
        OpenMeteo.request_target(RequestKind::Conditions, &settings(Units::Imperial, false), &mut target);

        assert!(target.starts_with("/v1/forecast?latitude=53.35&longitude=-6.26&timeformat=unixtime&timezone=auto"));
        assert!(target.contains("&temperature_unit=fahrenheit&wind_speed_unit=mph"));
        assert!(target.ends_with("&forecast_days=1&daily=sunrise,sunset"));
        assert!(target.contains("&current=temperature_2m,"));
    }

    #[test]
    fn forecast_request_asks_for_a_week() {
        let mut target = String::new();
        OpenMeteo.request_target(RequestKind::Forecasts, &settings(Units::Metric, false), &mut target);

        assert!(target.contains("&temperature_unit=celsius&wind_speed_unit=kmh"));
        assert!(target.ends_with("wind_direction_10m_dominant&forecast_days=7"));
    }

    #[test]
    fn normalizes_current_weather() {
        let mut c = Conditions { city: "Dublin, IE".into(), ..Default::default() };
        assert!(OpenMeteo.update_conditions(&current(), &mut c, &settings(Units::Metric, false)).unwrap());

        assert_eq!(c.epoch, 1_730_971_800);
        assert_eq!(c.city, "Dublin, IE");
        assert_eq!(c.weather, "overcast");
        assert_eq!(c.icon, "3d");
        assert_eq!(c.temp, 14);
        assert_eq!(c.feels_like, 12);
        assert_eq!(c.humidity, Some(88));
        assert_eq!(c.pressure, Some(1022.0));
        assert_eq!(c.pressure_trend, 0);
        assert_eq!(c.wind, Some(14));
        assert_eq!(c.wind_degrees, Some(134));
        assert_eq!(c.wind_dir, "SE");
        // 2024-11-07 07:36:18 and 16:41:17
        assert_eq!(c.sunrise, ClockTime::new(7, 36));
        assert_eq!(c.sunset, ClockTime::new(16, 41));
        assert_eq!(c.moon_phase, moon_phase(moon_age(1_730_971_800)));
    }

    #[test]
    fn night_icon_and_unknown_code() {
        let mut doc = current();
        doc["current"]["is_day"] = json!(0);
        doc["current"]["weather_code"] = json!(42);

        let mut c = Conditions::default();
        OpenMeteo.update_conditions(&doc, &mut c, &settings(Units::Metric, false)).unwrap();

        assert_eq!(c.icon, "42n");
        assert_eq!(c.weather, "unknown");
    }

    #[test]
    fn conditions_without_current_is_a_parse_error() {
        let doc = json!({"daily": {"time": [1]}});
        assert!(OpenMeteo.update_conditions(&doc, &mut Conditions::default(), &settings(Units::Metric, false)).is_err());
    }

    #[test]
    fn current_without_temperature_is_a_parse_error() {
        let doc = json!({"current": {"time": 1_730_971_800}});
        let mut c = Conditions::default();
        assert!(OpenMeteo.update_conditions(&doc, &mut c, &settings(Units::Metric, false)).is_err());
        assert_eq!(c, Conditions::default());
    }

    #[test]
    fn missing_wind_is_unknown_and_calm_is_zero() {
        let mut doc = current();
        doc["current"]["wind_speed_10m"] = json!(null);
        doc["current"]["wind_direction_10m"] = json!(null);
        doc["current"]["temperature_2m"] = json!(0.0);

        let mut c = Conditions::default();
        assert!(OpenMeteo.update_conditions(&doc, &mut c, &settings(Units::Metric, false)).unwrap());
        assert_eq!(c.temp, 0);
        assert_eq!((c.wind, c.wind_degrees), (None, None));
        assert_eq!(c.wind_dir, "");

        doc["current"]["time"] = json!(1_730_972_700);
        doc["current"]["wind_speed_10m"] = json!(0.0);
        doc["current"]["wind_direction_10m"] = json!(0);
        assert!(OpenMeteo.update_conditions(&doc, &mut c, &settings(Units::Metric, false)).unwrap());
        assert_eq!((c.wind, c.wind_degrees), (Some(0), Some(0)));
        assert_eq!(c.wind_dir, "N");
    }

    #[test]
    fn not_newer_is_stale() {
        let mut c = Conditions { epoch: 1_730_971_800, ..Default::default() };
        assert!(!OpenMeteo.update_conditions(&current(), &mut c, &settings(Units::Metric, false)).unwrap());
    }

    #[test]
    fn forecast_stops_at_first_missing_day() {
        let doc = json!({
            "daily": {
                "time": [1_730_937_600, 1_731_024_000, 1_731_110_400],
                "weather_code": [3, 61, null],
                "temperature_2m_max": [14.2, 11.6, null],
                "temperature_2m_min": [13.1, 7.4, null],
                "wind_speed_10m_max": [16.9, 22.0, null],
                "wind_gusts_10m_max": [34.9, 41.8, null],
                "wind_direction_10m_dominant": [148, 270, null]
            }
        });
        let mut out = vec![Forecast::default(); 4];

        OpenMeteo.update_forecasts(&doc, &mut out, &settings(Units::Metric, false)).unwrap();

        assert_eq!(out[0].epoch, 1_730_937_600);
        assert_eq!(out[0].day, "Thu");
        assert_eq!(out[0].conditions, "overcast");
        assert_eq!((out[0].temp_high, out[0].temp_low), (14, 13));
        assert_eq!((out[0].ave_wind, out[0].max_wind), (Some(17), Some(35)));
        assert_eq!(out[0].wind_dir, "SSE");
        assert_eq!(out[0].ave_humidity, None);

        assert_eq!(out[1].conditions, "slight rain");
        assert_eq!(out[1].icon, "61d");
        assert_eq!(out[1].wind_dir, "W");

        assert!(out[2].is_empty());
        assert!(out[3].is_empty());
    }

    #[test]
    fn forecast_without_daily_is_a_parse_error() {
        let mut out = vec![Forecast::default(); 2];
        assert!(OpenMeteo.update_forecasts(&json!({"error": true}), &mut out, &settings(Units::Metric, false)).is_err());
    }

    #[test]
    fn geocoding_lookup_uses_station_name() {
        let lookup = OpenMeteo.geolocation(&settings(Units::Metric, false)).expect("station is named");
        assert_eq!(lookup.host, "geocoding-api.open-meteo.com");
        assert_eq!(lookup.target, "/v1/search?name=Dublin&count=1&language=en&format=json");
    }

    #[test]
    fn ip_lookup_in_nearest_mode() {
        let lookup = OpenMeteo.geolocation(&settings(Units::Metric, true)).expect("nearest always looks up");
        assert_eq!(lookup.host, "ip-api.com");
        assert!(lookup.target.starts_with("/json?fields="));
    }

    #[tokio::test]
    async fn begin_geocodes_station() {
        let connector = ScriptedConnector::new().respond_json(
            r#"{"results":[{"id":2964574,"name":"Dublin","latitude":53.33306,"longitude":-6.24889,"country_code":"IE","timezone":"Europe/Dublin"}],"generationtime_ms":0.6}"#,
        );
        let mut provider = WeatherProvider::with_connector(Box::new(OpenMeteo), settings(Units::Metric, false), connector.clone())
            .with_heap_probe(FixedHeap(1 << 20));
        let mut conditions = Conditions::default();

        provider.begin(&mut conditions).await;

        assert_eq!(connector.hosts(), vec![("geocoding-api.open-meteo.com".to_string(), 80)]);
        assert_eq!(conditions.city, "Dublin, IE");
        assert_eq!(provider.settings().location.latitude, 53.33306);
        assert_eq!(provider.settings().location.longitude, -6.24889);
    }

    #[tokio::test]
    async fn begin_locates_by_ip_when_nearest() {
        let connector = ScriptedConnector::new()
            .respond_json(r#"{"status":"success","city":"Cork","countryCode":"IE","lat":51.8985,"lon":-8.4756}"#);
        let mut provider = WeatherProvider::with_connector(Box::new(OpenMeteo), settings(Units::Metric, true), connector.clone())
            .with_heap_probe(FixedHeap(1 << 20));
        let mut conditions = Conditions::default();

        provider.begin(&mut conditions).await;

        assert_eq!(conditions.city, "Cork, IE");
        assert_eq!(provider.settings().location.latitude, 51.8985);
    }

    #[tokio::test]
    async fn failed_lookup_keeps_configured_location() {
        let connector = ScriptedConnector::new()
            .respond_json(r#"{"results":[]}"#)
            .refuse();
        let mut provider = WeatherProvider::with_connector(Box::new(OpenMeteo), settings(Units::Metric, false), connector.clone())
            .with_heap_probe(FixedHeap(1 << 20));
        let mut conditions = Conditions::default();

        provider.begin(&mut conditions).await;
        provider.begin(&mut conditions).await;

        assert_eq!(connector.connections(), 2);
        assert_eq!(conditions.city, "");
        assert_eq!(provider.settings().location.latitude, 53.35);
    }

    #[tokio::test]
    async fn fetches_through_the_provider() {
        let connector = ScriptedConnector::new().respond_json(&current().to_string());
        let mut provider = WeatherProvider::with_connector(Box::new(OpenMeteo), settings(Units::Metric, false), connector.clone())
            .with_heap_probe(FixedHeap(1 << 20));
        let mut conditions = Conditions::default();
        let mut stats = crate::Statistics::default();

        assert!(provider.fetch_conditions(&mut conditions, &mut stats).await);
        assert_eq!(stats.num_updates, 1);
        assert!(connector.requests()[0].starts_with("GET /v1/forecast?latitude=53.35&longitude=-6.26&"));
        assert!(connector.requests()[0].contains("\r\nHost: api.open-meteo.com\r\n"));
    }

    #[tokio::test]
    async fn single_chunk_response_updates_conditions() {
        let body = current().to_string();
        let connector = ScriptedConnector::new().respond(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{body}\r\n0\r\n\r\n",
            body.len()
        ));
        let mut provider = WeatherProvider::with_connector(Box::new(OpenMeteo), settings(Units::Metric, false), connector)
            .with_heap_probe(FixedHeap(1 << 20));
        let mut conditions = Conditions::default();
        let mut stats = crate::Statistics::default();

        assert!(provider.fetch_conditions(&mut conditions, &mut stats).await);
        assert_eq!(stats.parse_failures, 0);
        assert_eq!(conditions.epoch, 1_730_971_800);
    }
}
