use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Date text that is neither `YYYY-MM-DD` nor `DD.MM.YYYY`, or names a day
/// that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unrecognized date format: '{0}'")]
    UnknownFormat(String),

    #[error("not a valid calendar date: '{0}'")]
    InvalidDate(String),
}

/// Failure talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store operation '{0}' timed out")]
    Timeout(&'static str),
}

/// Application-level error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_ERROR",
                    "The record store is unavailable".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
