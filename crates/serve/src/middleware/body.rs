//! Size-bounded body buffering and JSON parsing

use crate::context::RequestContext;
use crate::error::AppError;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use axum::http::header;
use http_body_util::LengthLimitError;
use std::error::Error as StdError;

/// Message for bodies over the limit
pub const TOO_LARGE_MESSAGE: &str = "Request entity too large";

/// Buffers the body up to a limit and parses JSON payloads
#[derive(Debug, Clone, Copy)]
pub struct BodyParser {
    limit: usize,
}

impl BodyParser {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

/// Whether the content type is JSON (`application/json` or `+json`)
pub fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn exceeded_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

#[async_trait]
impl Stage for BodyParser {
    fn name(&self) -> &'static str {
        "body"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        let declared = ctx
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.limit) {
            return StageOutcome::Fail(AppError::payload_too_large(TOO_LARGE_MESSAGE));
        }

        let Some(body) = ctx.take_body() else {
            return StageOutcome::Continue;
        };

        let bytes = match axum::body::to_bytes(body, self.limit).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let inner = err.into_inner();
                if exceeded_limit(inner.as_ref()) {
                    return StageOutcome::Fail(AppError::payload_too_large(TOO_LARGE_MESSAGE));
                }
                return StageOutcome::Fail(
                    AppError::bad_request("Failed to read request body").with_detail(inner.to_string()),
                );
            }
        };

        let json_body = ctx
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_json);

        if json_body && !bytes.is_empty() {
            match serde_json::from_slice(&bytes) {
                Ok(value) => ctx.json = Some(value),
                Err(e) => {
                    return StageOutcome::Fail(AppError::bad_request(format!(
                        "Invalid JSON in request body: {}",
                        e
                    )))
                }
            }
        }

        ctx.body = bytes;
        StageOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    fn context(content_type: &str, body: impl Into<Body>) -> RequestContext {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/products")
            .header("content-type", content_type)
            .body(body.into())
            .unwrap();
        RequestContext::new(request, false)
    }

    fn failure(outcome: StageOutcome) -> AppError {
        match outcome {
            StageOutcome::Fail(err) => err,
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_is_json() {
        assert!(is_json("application/json"));
        assert!(is_json("application/json; charset=utf-8"));
        assert!(is_json("application/vnd.api+json"));
        assert!(!is_json("text/plain"));
        assert!(!is_json("application/x-www-form-urlencoded"));
    }

    #[tokio::test]
    async fn test_parses_json_body() {
        let mut ctx = context("application/json", r#"{"name":"Rice"}"#);
        let outcome = BodyParser::new(1024).on_request(&mut ctx).await;
        assert!(matches!(outcome, StageOutcome::Continue));
        assert_eq!(ctx.json, Some(json!({"name": "Rice"})));
    }

    #[tokio::test]
    async fn test_non_json_body_is_kept_raw() {
        let mut ctx = context("text/plain", "hello");
        BodyParser::new(1024).on_request(&mut ctx).await;
        assert!(ctx.json.is_none());
        assert_eq!(&ctx.body[..], b"hello");
    }

    #[tokio::test]
    async fn test_oversized_stream_rejected() {
        let mut ctx = context("application/json", vec![b' '; 2048]);
        ctx.parts.headers.remove(header::CONTENT_LENGTH);
        let err = failure(BodyParser::new(1024).on_request(&mut ctx).await);
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        assert_eq!(err.message(), TOO_LARGE_MESSAGE);
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_rejected() {
        let mut ctx = context("application/json", "{}");
        ctx.parts
            .headers
            .insert(header::CONTENT_LENGTH, "999999".parse().unwrap());
        let err = failure(BodyParser::new(10 * 1024).on_request(&mut ctx).await);
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let mut ctx = context("application/json", "{not json");
        let err = failure(BodyParser::new(1024).on_request(&mut ctx).await);
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.message().starts_with("Invalid JSON"));
    }
}
