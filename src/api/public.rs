//! Public API types

use std::fmt::Display;

use anyhow::anyhow;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

// Errors

pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    pub fn new(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(msg: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, anyhow!("{}", msg))
    }

    /// The upstream answered but not with success. Its status and body
    /// are passed along verbatim for diagnosis.
    pub fn upstream(status: StatusCode, body: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            anyhow!("Upstream error {}: {}", status.as_u16(), body),
        )
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        if self.status.is_server_error() {
            tracing::error!("{}", self.error);
        } else {
            tracing::warn!("{}", self.error);
        }

        let body = if self.status.is_server_error() {
            format!("Something went wrong: {}", self.error)
        } else {
            self.error.to_string()
        };

        (self.status, body).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`. Anything
/// that goes wrong before the upstream answers is reported as a bad
/// request carrying the error message.
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.into())
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}
