use std::fmt;

use chrono::{DateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Display units. Every backend normalizes into these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn is_metric(self) -> bool {
        self == Units::Metric
    }

    pub fn temperature_symbol(self) -> char {
        match self {
            Units::Metric => 'C',
            Units::Imperial => 'F',
        }
    }

    pub fn wind_unit(self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "mph",
        }
    }

    pub fn pressure_unit(self) -> &'static str {
        match self {
            Units::Metric => "hPa",
            Units::Imperial => "inHg",
        }
    }
}

/// Hour and minute of a local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Time of day of a local epoch (an epoch already shifted by the station offset).
    pub fn from_local_epoch(epoch: i64) -> Option<Self> {
        let dt = DateTime::from_timestamp(epoch, 0)?;
        Self::new(dt.hour() as u8, dt.minute() as u8)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Latest normalized observation. `epoch == 0` means nothing has been fetched yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// Observation time, local epoch seconds.
    pub epoch: i64,
    pub city: String,
    pub weather: String,
    pub icon: String,
    pub temp: i32,
    pub feels_like: i32,
    pub humidity: Option<u8>,
    pub wind: Option<i32>,
    pub wind_degrees: Option<i32>,
    /// Compass name of `wind_degrees`, empty when the bearing is unknown.
    pub wind_dir: String,
    pub pressure: Option<f32>,
    /// -1 falling, 0 steady or unknown, +1 rising.
    pub pressure_trend: i8,
    pub sunrise: Option<ClockTime>,
    pub sunset: Option<ClockTime>,
    pub moonrise: Option<ClockTime>,
    pub moonset: Option<ClockTime>,
    pub moon_phase: String,
    pub moon_age: i32,
}

/// One day of forecast; slot index in the forecast slice is the day offset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Forecast {
    /// Local midnight of the forecast day, 0 when the slot is empty.
    pub epoch: i64,
    pub day: String,
    pub temp_high: i32,
    pub temp_low: i32,
    pub ave_wind: Option<i32>,
    pub max_wind: Option<i32>,
    pub wind_degrees: Option<i32>,
    pub wind_dir: String,
    pub ave_humidity: Option<u8>,
    pub conditions: String,
    pub icon: String,
}

impl Forecast {
    pub fn is_empty(&self) -> bool {
        self.epoch == 0
    }
}
