use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use utoipa::OpenApi;

use super::{
    dto::{CreateBatchRequest, CreateReadingRequest, ErrorDto, ListParams, ReadingDto},
    errors::AppError,
};
use crate::{db::models::Page, store::ReadingsStore};

// Extractors are taken as `Result<_, Rejection>` so malformed input is
// reported through `AppError` with an `ErrorDto` body.

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Store a single reading. The timestamp defaults to the insertion time.
#[utoipa::path(
    post,
    path = "/readings",
    request_body = CreateReadingRequest,
    responses(
        (status = 201, description = "Reading stored", body = ReadingDto),
        (status = 400, description = "Malformed JSON body", body = ErrorDto),
        (status = 422, description = "Invalid reading", body = ErrorDto),
        (status = 503, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "readings"
)]
pub async fn create_reading(
    State(store): State<ReadingsStore>,
    body: Result<Json<CreateReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReadingDto>), AppError> {
    let Json(body) = body?;
    let reading = store.create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(reading.into())))
}

/// Store several readings atomically: either all are persisted or none.
#[utoipa::path(
    post,
    path = "/readings/batch",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Readings stored", body = Vec<ReadingDto>),
        (status = 400, description = "Malformed JSON body", body = ErrorDto),
        (status = 422, description = "Invalid reading in batch", body = ErrorDto),
        (status = 503, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "readings"
)]
pub async fn create_readings_batch(
    State(store): State<ReadingsStore>,
    body: Result<Json<CreateBatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<ReadingDto>>), AppError> {
    let Json(body) = body?;
    let batch = body.readings.into_iter().map(Into::into).collect();
    let readings = store.create_batch(batch).await?;
    Ok((
        StatusCode::CREATED,
        Json(readings.into_iter().map(Into::into).collect()),
    ))
}

/// Fetch a single reading by id.
#[utoipa::path(
    get,
    path = "/readings/{id}",
    params(
        ("id" = i64, Path, description = "Reading id"),
    ),
    responses(
        (status = 200, description = "Reading", body = ReadingDto),
        (status = 400, description = "Id is not an integer", body = ErrorDto),
        (status = 404, description = "No reading with that id", body = ErrorDto),
        (status = 503, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "readings"
)]
pub async fn get_reading(
    State(store): State<ReadingsStore>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ReadingDto>, AppError> {
    let Path(id) = id?;
    Ok(Json(store.get(id).await?.into()))
}

/// List readings ordered by `timestamp ASC, id ASC`.
/// Optionally filter by location and an inclusive time range.
#[utoipa::path(
    get,
    path = "/readings",
    params(
        ("location" = Option<String>, Query, description = "Exact location label"),
        ("since" = Option<DateTime<Utc>>, Query, description = "Start of time range (RFC3339, inclusive)"),
        ("until" = Option<DateTime<Utc>>, Query, description = "End of time range (RFC3339, inclusive)"),
        ("limit" = Option<i64>, Query, description = "Page size, 1..=1000 (default 100, capped at the store maximum)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip (default 0)"),
    ),
    responses(
        (status = 200, description = "Readings", body = Vec<ReadingDto>),
        (status = 400, description = "Malformed query string", body = ErrorDto),
        (status = 422, description = "Invalid filter or page", body = ErrorDto),
        (status = 503, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(store): State<ReadingsStore>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let Query(params) = params?;
    let (filter, page) = params.into_parts(Page::DEFAULT_LIMIT.min(store.max_limit()));
    let rows = store.list(&filter, page).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Fetch the latest reading for every location.
#[utoipa::path(
    get,
    path = "/readings/latest",
    responses(
        (status = 200, description = "Latest reading per location", body = Vec<ReadingDto>),
        (status = 503, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "readings"
)]
pub async fn get_latest_readings(
    State(store): State<ReadingsStore>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let rows = store.latest_per_location().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        create_reading,
        create_readings_batch,
        get_reading,
        list_readings,
        get_latest_readings,
        health
    ),
    components(schemas(ReadingDto, CreateReadingRequest, CreateBatchRequest, ErrorDto)),
    tags(
        (name = "readings", description = "Temperature and humidity readings"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Temperature Readings API",
        version = "0.1.0",
        description = "REST API for storing and querying temperature/humidity readings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
