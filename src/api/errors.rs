use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::dto::ErrorDto;
use crate::store::StoreError;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status_and_field(&self) -> (StatusCode, Option<String>) {
        if let Some(r) = self.0.downcast_ref::<JsonRejection>() {
            return (r.status(), None);
        }
        if let Some(r) = self.0.downcast_ref::<QueryRejection>() {
            return (r.status(), None);
        }
        if let Some(r) = self.0.downcast_ref::<PathRejection>() {
            return (r.status(), None);
        }
        match self.0.downcast_ref::<StoreError>() {
            Some(StoreError::Validation { field, .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(field.clone()))
            }
            Some(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, None),
            Some(StoreError::Storage(_)) => (StatusCode::SERVICE_UNAVAILABLE, None),
            None => (StatusCode::INTERNAL_SERVER_ERROR, None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field) = self.status_and_field();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        let body = Json(ErrorDto {
            error: self.0.to_string(),
            field,
        });
        (status, body).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
