//! HTTP error mapping (spec §4.9, component I), same shape as the teacher's
//! `server/errors.rs::AppError` but driven off the crate's own `CoreError`
//! taxonomy (§7) instead of ad hoc status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::errors::CoreError;

pub struct AppError {
    status: StatusCode,
    tag: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.tag,
            "message": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(core) = err.downcast_ref::<CoreError>() {
            return core.into();
        }
        tracing::error!("internal error: {err:#}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            tag: "internal",
            message: format!("{err:#}"),
        }
    }
}

impl From<&CoreError> for AppError {
    fn from(err: &CoreError) -> Self {
        let status = match err {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Ambiguous(_) => StatusCode::CONFLICT,
            CoreError::BadQuery(_) => StatusCode::BAD_REQUEST,
            CoreError::ParseError(_) => StatusCode::BAD_REQUEST,
            CoreError::FsConsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::IndexCorrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::ChildSpawnFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            tag: err.tag(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("serialization error: {err}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            tag: "internal",
            message: format!("serialization error: {err}"),
        }
    }
}
