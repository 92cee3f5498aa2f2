//! Centralized error funnel
//!
//! The only place an error body is written. Operational errors keep their
//! status and message; anything else collapses to a generic 500 unless the
//! process runs in development mode.

use crate::error::AppError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bulkbuy_core::RunMode;
use serde::Serialize;
use tracing::{error, warn};

/// Message shown for non-operational failures outside development
pub const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// Error envelope sent to clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Renders [`AppError`]s into responses
#[derive(Debug, Clone, Copy)]
pub struct ErrorFunnel {
    mode: RunMode,
}

impl ErrorFunnel {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Build the envelope for an error without logging it
    pub fn body(&self, err: &AppError) -> (StatusCode, ErrorBody) {
        if self.mode.is_development() {
            return (
                err.status(),
                ErrorBody {
                    status: err.status_label(),
                    message: err.message().to_string(),
                    kind: Some(err.kind().as_str()),
                    detail: err.detail().map(str::to_string),
                },
            );
        }

        if err.is_operational() {
            (
                err.status(),
                ErrorBody {
                    status: err.status_label(),
                    message: err.message().to_string(),
                    kind: None,
                    detail: None,
                },
            )
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    status: "error",
                    message: GENERIC_MESSAGE.to_string(),
                    kind: None,
                    detail: None,
                },
            )
        }
    }

    /// Log the error and write its response
    pub fn render(&self, err: &AppError) -> Response {
        if err.status().is_server_error() {
            error!(
                kind = err.kind().as_str(),
                detail = err.detail().unwrap_or_default(),
                "{}",
                err.message()
            );
        } else {
            warn!(kind = err.kind().as_str(), "{}", err.message());
        }

        let (status, body) = self.body(err);
        (status, Json(body)).into_response()
    }
}

impl Default for ErrorFunnel {
    fn default() -> Self {
        Self::new(RunMode::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_operational_client_error() {
        let funnel = ErrorFunnel::new(RunMode::Production);
        let response = funnel.render(&AppError::not_found("No products found"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_of(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No products found");
        assert!(body.get("kind").is_none());
    }

    #[tokio::test]
    async fn test_operational_server_error_keeps_message() {
        let funnel = ErrorFunnel::default();
        let err = AppError::new(ErrorKind::ServiceUnavailable, "Database unavailable")
            .with_detail("connection refused");
        let response = funnel.render(&err);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = json_of(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Database unavailable");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_unexpected_error_hidden_in_production() {
        let funnel = ErrorFunnel::new(RunMode::Production);
        let err = AppError::unexpected("index out of bounds").with_detail("src/lib.rs:10");
        let response = funnel.render(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_of(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], GENERIC_MESSAGE);
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_development_exposes_detail() {
        let funnel = ErrorFunnel::new(RunMode::Development);
        let err = AppError::unexpected("index out of bounds").with_detail("src/lib.rs:10");
        let body = json_of(funnel.render(&err)).await;

        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "index out of bounds");
        assert_eq!(body["kind"], "unexpected");
        assert_eq!(body["detail"], "src/lib.rs:10");
    }
}
