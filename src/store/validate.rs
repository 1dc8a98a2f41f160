use chrono::{DateTime, Utc};

use crate::db::models::{NewReading, Page, ReadingFilter};

use super::error::{Result, StoreError};

/// Earliest instant a Postgres `timestamptz` can hold (4714-11-24 00:00 BC),
/// as microseconds since the Unix epoch. The latest one lies beyond chrono's
/// own range.
const MIN_TIMESTAMP_MICROS: i64 = -210_866_803_200_000_000;

pub(crate) fn reading(new: &NewReading) -> Result<()> {
    reading_at(new, "")
}

/// Validates every entry of a batch, reporting the first offending entry as
/// `readings[<index>].<field>`.
pub(crate) fn batch(readings: &[NewReading], max_len: i64) -> Result<()> {
    if readings.len() as i64 > max_len {
        return Err(StoreError::validation(
            "readings",
            format!("batch of {} exceeds the maximum of {max_len}", readings.len()),
        ));
    }
    readings
        .iter()
        .enumerate()
        .try_for_each(|(i, r)| reading_at(r, &format!("readings[{i}].")))
}

pub(crate) fn page(page: &Page, max_limit: i64) -> Result<()> {
    if page.limit < 1 || page.limit > max_limit {
        return Err(StoreError::validation(
            "limit",
            format!("must be between 1 and {max_limit}, got {}", page.limit),
        ));
    }
    if page.offset < 0 {
        return Err(StoreError::validation(
            "offset",
            format!("must not be negative, got {}", page.offset),
        ));
    }
    Ok(())
}

pub(crate) fn filter(filter: &ReadingFilter) -> Result<()> {
    if let Some(location) = &filter.location {
        no_nul("", "location", location)?;
    }
    if let Some(since) = filter.since {
        representable("", "since", since)?;
    }
    if let Some(until) = filter.until {
        representable("", "until", until)?;
    }
    if let (Some(since), Some(until)) = (filter.since, filter.until) {
        if since > until {
            return Err(StoreError::validation(
                "since",
                format!("{since} is after until ({until})"),
            ));
        }
    }
    Ok(())
}

fn reading_at(new: &NewReading, prefix: &str) -> Result<()> {
    finite(prefix, "temperature", new.temperature)?;
    finite(prefix, "humidity", new.humidity)?;
    if let Some(location) = &new.location {
        no_nul(prefix, "location", location)?;
    }
    if let Some(timestamp) = new.timestamp {
        representable(prefix, "timestamp", timestamp)?;
    }
    Ok(())
}

/// Postgres `TEXT` cannot store the NUL character.
fn no_nul(prefix: &str, field: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(StoreError::validation(
            format!("{prefix}{field}"),
            "must not contain NUL characters",
        ));
    }
    Ok(())
}

fn representable(prefix: &str, field: &str, value: DateTime<Utc>) -> Result<()> {
    if value.timestamp_micros() < MIN_TIMESTAMP_MICROS {
        return Err(StoreError::validation(
            format!("{prefix}{field}"),
            format!("{value} is before the earliest storable instant"),
        ));
    }
    Ok(())
}

fn finite(prefix: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::validation(
            format!("{prefix}{field}"),
            format!("must be a finite number, got {value}"),
        ))
    }
}
