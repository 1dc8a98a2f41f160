use crate::db::models::TemperatureReading;

/// Human-readable one-line rendering of a reading for logs and debugging.
pub fn describe(reading: &TemperatureReading) -> String {
    format!(
        "<TemperatureReading(id={}, temp={:?}, hum={:?}, location={}, timestamp={})>",
        reading.id,
        reading.temperature,
        reading.humidity,
        reading.location.as_deref().unwrap_or("None"),
        reading.timestamp.to_rfc3339(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn reading(location: Option<&str>) -> TemperatureReading {
        TemperatureReading {
            id: 7,
            temperature: 21.5,
            humidity: 40.0,
            location: location.map(str::to_owned),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn describes_all_fields() {
        assert_eq!(
            describe(&reading(Some("lab-1"))),
            "<TemperatureReading(id=7, temp=21.5, hum=40.0, location=lab-1, timestamp=2024-03-01T12:30:00+00:00)>"
        );
    }

    #[test]
    fn missing_location_renders_none() {
        assert!(describe(&reading(None)).contains("location=None,"));
    }
}
