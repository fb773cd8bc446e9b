//! Lunar age and phase, computed from an epoch alone.

/// A new moon used as the reference point (1999-08-11).
const REFERENCE_NEW_MOON: i64 = 937_008_000;

/// Mean synodic month in days.
const LUNAR_PERIOD_DAYS: f64 = 29.530_588_853;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Age of the moon in whole days (0..=30) at `epoch`.
pub fn moon_age(epoch: i64) -> i32 {
    let days = (epoch - REFERENCE_NEW_MOON) as f64 / SECONDS_PER_DAY;
    days.rem_euclid(LUNAR_PERIOD_DAYS).round() as i32
}

/// Name of the phase for a moon age in days.
pub fn moon_phase(age: i32) -> &'static str {
    match age {
        0 => "New Moon",
        1..=6 => "Waxing Crescent",
        7 => "First Quarter",
        8..=14 => "Waxing Gibbous",
        15 => "Full Moon",
        16..=21 => "Waning Gibbous",
        22 => "Last Quarter",
        23..=28 => "Waning Crescent",
        _ => "New Moon",
    }
}
