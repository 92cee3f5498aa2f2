//! Development request logging

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use axum::http::header;
use axum::response::Response;
use bulkbuy_core::RunMode;
use tracing::info;

/// Logs one line per request in development mode
#[derive(Debug, Clone, Copy)]
pub struct DevLogger {
    mode: RunMode,
}

impl DevLogger {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_development()
    }
}

#[async_trait]
impl Stage for DevLogger {
    fn name(&self) -> &'static str {
        "dev_logging"
    }

    async fn on_request(&self, _ctx: &mut RequestContext) -> StageOutcome {
        StageOutcome::Continue
    }

    async fn on_response(&self, ctx: &RequestContext, response: Response) -> Response {
        if self.is_active() {
            let size = response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            info!(
                method = %ctx.parts.method,
                path = %ctx.original_url,
                status = response.status().as_u16(),
                latency_ms = ctx.started_at.elapsed().as_millis() as u64,
                size,
                client = %ctx.client_id,
                "Request completed"
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    #[test]
    fn test_active_only_in_development() {
        assert!(DevLogger::new(RunMode::Development).is_active());
        assert!(!DevLogger::new(RunMode::Production).is_active());
    }

    #[tokio::test]
    async fn test_response_passes_through() {
        bulkbuy_infra::init_test_logger();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let ctx = RequestContext::new(request, false);
        let response = DevLogger::new(RunMode::Development)
            .on_response(&ctx, StatusCode::CREATED.into_response())
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
