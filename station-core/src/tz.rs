//! UTC → local time conversion.
//!
//! Every epoch stored in [`Conditions`](crate::Conditions) and
//! [`Forecast`](crate::Forecast) is "local": UTC seconds shifted by the station's
//! offset, so that reading it back as UTC yields the wall-clock time at the station.

use std::fmt::Debug;

use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;

pub trait TimeZoneConverter: Send + Sync + Debug {
    /// Offset from UTC in seconds at the instant `utc`.
    fn offset_at(&self, utc: i64) -> i64;

    fn to_local(&self, utc: i64) -> i64 {
        utc + self.offset_at(utc)
    }
}

impl TimeZoneConverter for Utc {
    fn offset_at(&self, _utc: i64) -> i64 {
        0
    }
}

impl TimeZoneConverter for FixedOffset {
    fn offset_at(&self, _utc: i64) -> i64 {
        i64::from(self.local_minus_utc())
    }
}

impl TimeZoneConverter for Tz {
    fn offset_at(&self, utc: i64) -> i64 {
        DateTime::from_timestamp(utc, 0)
            .map(|dt| i64::from(self.offset_from_utc_datetime(&dt.naive_utc()).fix().local_minus_utc()))
            .unwrap_or(0)
    }
}

/// Resolve a zone from configuration: `"UTC"`, a fixed offset such as `"+01:00"`,
/// or an IANA name such as `"Europe/Dublin"`.
pub fn zone_from_name(name: &str) -> Result<Box<dyn TimeZoneConverter>> {
    let name = name.trim();

    if name.is_empty() || name.eq_ignore_ascii_case("utc") {
        return Ok(Box::new(Utc));
    }

    if name.starts_with('+') || name.starts_with('-') {
        let offset: FixedOffset = name
            .parse()
            .map_err(|_| anyhow!("Invalid UTC offset '{name}'. Expected a value like +01:00."))?;
        return Ok(Box::new(offset));
    }

    let tz: Tz = name
        .parse()
        .map_err(|_| anyhow!("Unknown time zone '{name}'. Use an IANA name like Europe/Dublin."))?;
    Ok(Box::new(tz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_is_identity() {
        assert_eq!(Utc.to_local(1_700_000_000), 1_700_000_000);
    }

    #[test]
    fn fixed_offset_shifts() {
        let zone = zone_from_name("+02:00").expect("offset should parse");
        assert_eq!(zone.to_local(1_000), 1_000 + 7_200);

        let zone = zone_from_name("-05:30").expect("offset should parse");
        assert_eq!(zone.to_local(100_000), 100_000 - 19_800);
    }

    #[test]
    fn named_zone_follows_daylight_saving() {
        let zone = zone_from_name("Europe/Dublin").expect("zone should parse");

        // 2024-01-15 12:00 UTC: winter, GMT
        assert_eq!(zone.offset_at(1_705_320_000), 0);
        // 2024-07-15 12:00 UTC: summer, IST
        assert_eq!(zone.offset_at(1_721_044_800), 3_600);
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let err = zone_from_name("Mars/Olympus").unwrap_err();
        assert!(err.to_string().contains("Unknown time zone"));
    }

    #[test]
    fn empty_name_means_utc() {
        let zone = zone_from_name("").expect("empty name is UTC");
        assert_eq!(zone.offset_at(42), 0);
    }
}
