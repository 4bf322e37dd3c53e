//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; any [`sr_core::Error`]
//! converts with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: sr_core::Error,
}

impl AppError {
    pub fn new(inner: sr_core::Error) -> Self {
        Self { inner }
    }
}

impl From<sr_core::Error> for AppError {
    fn from(e: sr_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let mut body = json!({
            "error": self.inner.code(),
            "message": self.inner.to_string(),
        });
        if let Some(details) = self.inner.diagnostics() {
            body["details"] = json!(details);
        }

        (status, axum::Json(body)).into_response()
    }
}
