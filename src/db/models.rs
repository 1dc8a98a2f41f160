use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the readings table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub id: i64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied fields for a reading that has not been persisted yet.
///
/// When `timestamp` is `None` the store stamps the reading with the time of
/// insertion. Timestamps are stored with microsecond resolution; any finer
/// fraction is truncated, and the returned row carries the stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewReading {
    pub temperature: f64,
    pub humidity: f64,
    pub location: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewReading {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
            ..Self::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Optional constraints applied by `ReadingsStore::list`.
/// `since` and `until` are both inclusive.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub location: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Window into the ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}
