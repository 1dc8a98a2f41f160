use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::{NewReading, Page, ReadingFilter, TemperatureReading};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: i64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<TemperatureReading> for ReadingDto {
    fn from(r: TemperatureReading) -> Self {
        Self {
            id: r.id,
            temperature: r.temperature,
            humidity: r.humidity,
            location: r.location,
            timestamp: r.timestamp,
        }
    }
}

/// Request body for `POST /readings`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReadingRequest {
    pub temperature: f64,
    pub humidity: f64,
    pub location: Option<String>,
    /// Observation time (RFC3339). Defaults to the moment of insertion.
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<CreateReadingRequest> for NewReading {
    fn from(r: CreateReadingRequest) -> Self {
        Self {
            temperature: r.temperature,
            humidity: r.humidity,
            location: r.location,
            timestamp: r.timestamp,
        }
    }
}

/// Request body for `POST /readings/batch`. Stored atomically.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    pub readings: Vec<CreateReadingRequest>,
}

/// Query string for `GET /readings`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub location: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    /// `default_limit` applies when the query omits `limit`.
    pub fn into_parts(self, default_limit: i64) -> (ReadingFilter, Page) {
        let page = Page::new(
            self.limit.unwrap_or(default_limit),
            self.offset.unwrap_or(0),
        );
        let filter = ReadingFilter {
            location: self.location,
            since: self.since,
            until: self.until,
        };
        (filter, page)
    }
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDto {
    pub error: String,
    /// Offending field, present for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
