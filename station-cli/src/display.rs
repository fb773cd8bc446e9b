//! Plain-text renderer: every screen as a few lines on a terminal.

use std::{fmt::Display, io::Write};

use anyhow::Result;
use station_core::{ClockTime, Conditions, Forecast, Renderer, Statistics, Units};

pub struct TextRenderer<W: Write> {
    out: W,
    units: Units,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, units: Units) -> Self {
        Self { out, units }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn degrees(&self, value: i32) -> String {
        format!("{value}°{}", self.units.temperature_symbol())
    }

    fn speed(&self, value: Option<i32>) -> String {
        or_dashes(value.map(|v| format!("{v} {}", self.units.wind_unit())))
    }
}

/// Unknown values show as `--`.
fn or_dashes<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "--".to_string(), |v| v.to_string())
}

/// `" WSW"`, or nothing when the direction is unknown.
fn spaced(direction: &str) -> String {
    if direction.is_empty() { String::new() } else { format!(" {direction}") }
}

fn trend_word(trend: i8) -> &'static str {
    match trend {
        t if t > 0 => "rising",
        t if t < 0 => "falling",
        _ => "steady",
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render_conditions(&mut self, c: &Conditions) -> Result<()> {
        let updated = (c.epoch != 0).then(|| ClockTime::from_local_epoch(c.epoch)).flatten();
        let pressure = c.pressure.map(|p| match self.units {
            Units::Metric => format!("{p:.0} {}", self.units.pressure_unit()),
            Units::Imperial => format!("{p:.2} {}", self.units.pressure_unit()),
        });
        let humidity = c.humidity.map(|h| format!("{h}%"));

        writeln!(self.out, "== {} ==", if c.city.is_empty() { "Current conditions" } else { c.city.as_str() })?;
        writeln!(self.out, "Updated   {}", or_dashes(updated))?;
        writeln!(self.out, "Weather   {} [{}]", c.weather, c.icon)?;
        writeln!(self.out, "Temp      {} (feels like {})", self.degrees(c.temp), self.degrees(c.feels_like))?;
        writeln!(self.out, "Humidity  {}", or_dashes(humidity))?;
        let bearing = c.wind_degrees.map(|d| format!(" ({d}°)")).unwrap_or_default();
        writeln!(self.out, "Wind      {}{}{}", self.speed(c.wind), spaced(&c.wind_dir), bearing)?;
        writeln!(self.out, "Pressure  {} {}", or_dashes(pressure), trend_word(c.pressure_trend))?;
        writeln!(self.out)?;
        Ok(())
    }

    fn render_astronomy(&mut self, c: &Conditions) -> Result<()> {
        writeln!(self.out, "== Astronomy ==")?;
        writeln!(self.out, "Sunrise   {}   Sunset  {}", or_dashes(c.sunrise), or_dashes(c.sunset))?;
        writeln!(self.out, "Moonrise  {}   Moonset {}", or_dashes(c.moonrise), or_dashes(c.moonset))?;
        writeln!(self.out, "Moon      {}, {} days", c.moon_phase, c.moon_age)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn render_forecast(&mut self, f: &Forecast) -> Result<()> {
        let humidity = f.ave_humidity.map(|h| format!("{h}%"));

        writeln!(self.out, "== {} ==", f.day)?;
        writeln!(self.out, "Weather   {} [{}]", f.conditions, f.icon)?;
        writeln!(self.out, "High/Low  {} / {}", self.degrees(f.temp_high), self.degrees(f.temp_low))?;
        writeln!(
            self.out,
            "Wind      {}{} (max {})",
            self.speed(f.ave_wind),
            spaced(&f.wind_dir),
            self.speed(f.max_wind)
        )?;
        writeln!(self.out, "Humidity  {}", or_dashes(humidity))?;
        writeln!(self.out)?;
        Ok(())
    }

    fn render_about(&mut self, s: &Statistics) -> Result<()> {
        let stamp = |t: Option<chrono::DateTime<chrono::Utc>>| t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());

        writeln!(self.out, "== About ==")?;
        writeln!(self.out, "Updates   {}", s.num_updates)?;
        writeln!(
            self.out,
            "Age       last {}s, min {}s, max {}s, avg {}",
            s.last_age,
            s.min_age,
            s.max_age,
            or_dashes(s.average_age().map(|a| format!("{a}s")))
        )?;
        writeln!(
            self.out,
            "Failures  connect {}, parse {}, memory {}",
            s.connect_failures, s.parse_failures, s.mem_failures
        )?;
        writeln!(self.out, "Fetched   conditions {}", or_dashes(stamp(s.last_fetch_conditions)))?;
        writeln!(self.out, "          forecasts  {}", or_dashes(stamp(s.last_fetch_forecasts)))?;
        writeln!(self.out)?;
        Ok(())
    }
}
