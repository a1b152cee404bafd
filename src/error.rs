//! Application error type shared by the pipeline, the data sources and the
//! HTTP layer.
//!
//! Configuration problems are kept apart from query failures so startup can
//! report "fix your environment" instead of a downstream connection error.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

/// All errors produced by `colombia-tempflow`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The data source answered but the statement did not succeed, or its
    /// result could not be read back as observations.
    #[error("query failed: {0}")]
    Query(String),

    /// PostgreSQL backend failure.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// Warehouse HTTP transport failure.
    #[error("warehouse request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A date in the loaded table could not be parsed; the load is aborted.
    #[error("invalid date {value:?} in row {row}")]
    InvalidDate { row: usize, value: String },

    /// The caller sent parameters the pipeline cannot work with.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// HTTP status reported to the caller of a route.
    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Query(_) | AppError::Db(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // ---
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("rejecting request: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
