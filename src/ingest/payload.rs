use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::models::NewReading;

/// JSON document published by a sensor node, e.g.
/// `{"temperature": 21.4, "humidity": 48.2}`.
#[derive(Debug, Deserialize)]
pub struct DevicePayload {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DevicePayload {
    /// Payload `location` wins over `default_location`.
    pub fn into_new_reading(self, default_location: Option<&str>) -> NewReading {
        NewReading {
            temperature: self.temperature,
            humidity: self.humidity,
            location: self.location.or_else(|| default_location.map(str::to_owned)),
            timestamp: self.timestamp,
        }
    }
}

pub fn parse(bytes: &[u8], default_location: Option<&str>) -> Result<NewReading> {
    let payload: DevicePayload =
        serde_json::from_slice(bytes).context("payload is not a valid reading document")?;
    Ok(payload.into_new_reading(default_location))
}
