use chrono::{DateTime, Utc};
use serde::Serialize;

/// Update and failure counters for the lifetime of the process.
///
/// Ages are the seconds between two consecutive successful condition updates,
/// so a growing `last_age` means the upstream data is going stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub num_updates: u32,
    pub connect_failures: u32,
    pub parse_failures: u32,
    pub mem_failures: u32,
    pub last_age: i64,
    pub min_age: i64,
    pub max_age: i64,
    pub total: i64,
    pub samples: u32,
    pub last_fetch_conditions: Option<DateTime<Utc>>,
    pub last_fetch_forecasts: Option<DateTime<Utc>>,
}

impl Statistics {
    /// Record one age sample.
    pub fn update(&mut self, age: i64) {
        self.last_age = age;
        self.total += age;
        self.samples += 1;
        if self.samples == 1 || age > self.max_age {
            self.max_age = age;
        }
        if self.samples == 1 || age < self.min_age {
            self.min_age = age;
        }
    }

    pub fn average_age(&self) -> Option<i64> {
        (self.samples > 0).then(|| self.total / i64::from(self.samples))
    }

    pub fn failures(&self) -> u32 {
        self.connect_failures + self.parse_failures + self.mem_failures
    }
}
