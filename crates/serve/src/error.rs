//! Operational errors raised while serving a request
//!
//! Every failure on the request path is expressed as an [`AppError`]. Handlers
//! return `Result<_, AppError>`; converting the error into a response only
//! marks the response as failed and carries the error forward in the response
//! extensions. The pipeline hands it to the
//! [`ErrorFunnel`](crate::funnel::ErrorFunnel), which writes the body.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bulkbuy_core::BulkbuyError;
use thiserror::Error;

/// Closed set of failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    UnsupportedMediaType,
    RateLimited,
    Internal,
    ServiceUnavailable,
    /// A failure nobody anticipated, such as a panic
    Unexpected,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal | Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether the error was raised deliberately and its message is safe to
    /// show to clients
    pub fn is_operational(self) -> bool {
        !matches!(self, Self::Unexpected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PayloadTooLarge => "payload_too_large",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::RateLimited => "rate_limited",
            Self::Internal => "internal",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unexpected => "unexpected",
        }
    }
}

/// An error on the request path
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    detail: Option<String>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach diagnostic detail shown only in development mode
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// The catch-all error for a path no route serves
    pub fn route_not_found(url: &str) -> Self {
        Self::not_found(format!("Can't find {} on this server", url))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn is_operational(&self) -> bool {
        self.kind.is_operational()
    }

    /// `"fail"` for client errors, `"error"` for server errors
    pub fn status_label(&self) -> &'static str {
        if self.status().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }
}

/// Response extension carrying an error that still has to be rendered
#[derive(Debug, Clone)]
pub struct Forwarded(pub AppError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(Forwarded(self));
        response
    }
}

/// Remove and return the error a response is carrying, if any
pub fn take_forwarded(response: &mut Response) -> Option<AppError> {
    response
        .extensions_mut()
        .remove::<Forwarded>()
        .map(|Forwarded(err)| err)
}

impl From<BulkbuyError> for AppError {
    fn from(err: BulkbuyError) -> Self {
        match err {
            BulkbuyError::Validation { message } => Self::bad_request(message),
            BulkbuyError::NotFound { resource } => Self::not_found(format!("{} not found", resource)),
            BulkbuyError::Conflict { message } => Self::conflict(message),
            BulkbuyError::Database { message } => {
                Self::new(ErrorKind::ServiceUnavailable, "Database unavailable")
                    .with_detail(message)
            }
            other => Self::internal("Internal server error").with_detail(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::MissingJsonContentType(_) => ErrorKind::UnsupportedMediaType,
            JsonRejection::BytesRejection(_) => ErrorKind::PayloadTooLarge,
            _ => ErrorKind::BadRequest,
        };
        Self::new(kind, rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_label() {
        assert_eq!(AppError::bad_request("x").status_label(), "fail");
        assert_eq!(AppError::rate_limited("x").status_label(), "fail");
        assert_eq!(AppError::internal("x").status_label(), "error");
        assert_eq!(AppError::unexpected("x").status_label(), "error");
    }

    #[test]
    fn test_only_unexpected_is_non_operational() {
        assert!(AppError::not_found("x").is_operational());
        assert!(AppError::internal("x").is_operational());
        assert!(!AppError::unexpected("x").is_operational());
    }

    #[test]
    fn test_kind_status_codes() {
        assert_eq!(ErrorKind::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorKind::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ErrorKind::Unexpected.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorKind::ServiceUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_into_response_forwards_error() {
        let mut response = AppError::not_found("No products found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let err = take_forwarded(&mut response).unwrap();
        assert_eq!(err.message(), "No products found");
        assert!(take_forwarded(&mut response).is_none());
    }

    #[test]
    fn test_route_not_found_message() {
        let err = AppError::route_not_found("/api/v1/nope");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Can't find /api/v1/nope on this server");
    }

    #[test]
    fn test_from_domain_error() {
        let err: AppError = BulkbuyError::conflict("email taken").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = BulkbuyError::validation("bad price").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = BulkbuyError::database("connection refused").into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.detail(), Some("connection refused"));

        let err: AppError = BulkbuyError::network("reset").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.message(), "Internal server error");
    }
}
