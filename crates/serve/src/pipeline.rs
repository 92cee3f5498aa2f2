//! Fixed-order request pipeline
//!
//! Every request flows through the same stages in the same order:
//!
//! 1. **security_headers** - hardening response headers
//! 2. **cors** - cross-origin headers and preflight answers
//! 3. **rate_limit** - per-client window counter under the API prefix
//! 4. **body** - size-bounded buffering and JSON parsing
//! 5. **nosql_sanitize** - strip operator keys from body and query
//! 6. **xss_sanitize** - escape markup in body, query and path
//! 7. **parameter_pollution** - collapse repeated query keys
//! 8. **compression** - gzip eligible responses
//! 9. **dev_logging** - request log lines in development mode
//! 10. **static_files** - serve the public directory
//! 11. **request_time** - stamp the receive time
//!
//! and finally the router. A stage either lets the request continue, answers
//! it, or fails it. Failures go to the [`ErrorFunnel`], as do errors carried
//! back from handlers. After the response exists, every stage that saw the
//! request gets its response hook, innermost first.

use crate::context::{ClientId, PollutedQuery, RequestContext, RequestTime};
use crate::error::{take_forwarded, AppError};
use crate::funnel::ErrorFunnel;
use crate::middleware::rate_limit::RateLimitStore;
use crate::middleware::{
    body::BodyParser, compression::Compression, logging::DevLogger, pollution::PollutionGuard,
    query, rate_limit::RateLimiter, sanitize::NoSqlSanitizer, sanitize::XssSanitizer,
    security::CorsStage, security::SecurityHeaders, static_files::StaticFiles,
    timestamp::RequestTimestamp,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{OriginalUri, Request, State};
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use bulkbuy_core::BulkbuyConfig;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// What a stage decided about the request
pub enum StageOutcome {
    /// Hand the request to the next stage
    Continue,
    /// Stop here and send this response
    Respond(Response),
    /// Stop here and send this error through the funnel
    Fail(AppError),
}

/// One named step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome;

    /// Runs once the response exists, for every stage that saw the request
    async fn on_response(&self, _ctx: &RequestContext, response: Response) -> Response {
        response
    }
}

/// The fixed stage chain in front of the router
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    funnel: ErrorFunnel,
    trust_proxy: bool,
}

impl Pipeline {
    /// Build the standard chain from configuration
    pub fn from_config(config: &BulkbuyConfig, rate_store: Arc<dyn RateLimitStore>) -> Self {
        let funnel = ErrorFunnel::new(config.mode);
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(SecurityHeaders::new()),
            Box::new(CorsStage::new((&config.cors).into())),
            Box::new(RateLimiter::new(config.rate_limit.clone(), rate_store)),
            Box::new(BodyParser::new(config.body_limit_bytes)),
            Box::new(NoSqlSanitizer::new(config.sanitize.replace_with.clone())),
            Box::new(XssSanitizer),
            Box::new(PollutionGuard::new(config.sanitize.query_whitelist.clone())),
            Box::new(Compression::new(config.compression.clone(), funnel)),
            Box::new(DevLogger::new(config.mode)),
            Box::new(StaticFiles::new(&config.server.public_dir)),
            Box::new(RequestTimestamp),
        ];

        Self {
            stages,
            funnel,
            trust_proxy: config.server.trust_proxy,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_stages(stages: Vec<Box<dyn Stage>>, funnel: ErrorFunnel) -> Self {
        Self {
            stages,
            funnel,
            trust_proxy: false,
        }
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn funnel(&self) -> ErrorFunnel {
        self.funnel
    }

    /// Run a request through the stages and then `terminal`
    pub async fn handle<F, Fut>(&self, request: Request, terminal: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut ctx = RequestContext::new(request, self.trust_proxy);
        let mut entered = 0;
        let mut outcome = None;

        for stage in &self.stages {
            entered += 1;
            match stage.on_request(&mut ctx).await {
                StageOutcome::Continue => {}
                StageOutcome::Respond(response) => {
                    debug!(stage = stage.name(), "Stage answered request");
                    outcome = Some(response);
                    break;
                }
                StageOutcome::Fail(err) => {
                    debug!(stage = stage.name(), error = %err, "Stage failed request");
                    outcome = Some(self.funnel.render(&err));
                    break;
                }
            }
        }

        let mut response = match outcome {
            Some(response) => response,
            None => match rebuild_request(&mut ctx) {
                Ok(request) => {
                    let response = terminal(request).await;
                    self.finish(&ctx, response)
                }
                Err(err) => self.funnel.render(&err),
            },
        };

        for stage in self.stages[..entered].iter().rev() {
            response = stage.on_response(&ctx, response).await;
        }

        response
    }

    /// Render a forwarded handler error, or turn a method mismatch into the
    /// catch-all not-found error
    fn finish(&self, ctx: &RequestContext, mut response: Response) -> Response {
        if let Some(err) = take_forwarded(&mut response) {
            return self.funnel.render(&err);
        }

        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return self
                .funnel
                .render(&AppError::route_not_found(&ctx.original_url));
        }

        response
    }
}

/// Reassemble the request handed to the router from the sanitized context
fn rebuild_request(ctx: &mut RequestContext) -> Result<Request, AppError> {
    let query = query::serialize(&ctx.query);
    let path_and_query = if query.is_empty() {
        ctx.path.clone()
    } else {
        format!("{}?{}", ctx.path, query)
    };
    let mut uri_parts = ctx.parts.uri.clone().into_parts();
    uri_parts.path_and_query = Some(
        path_and_query
            .parse()
            .map_err(|e| AppError::bad_request(format!("Invalid request target: {}", e)))?,
    );
    let uri = Uri::from_parts(uri_parts)
        .map_err(|e| AppError::bad_request(format!("Invalid request target: {}", e)))?;

    let mut headers = ctx.parts.headers.clone();
    let body = match &ctx.json {
        Some(json) => {
            let bytes = serde_json::to_vec(json).map_err(|e| {
                AppError::internal("Failed to encode request body").with_detail(e.to_string())
            })?;
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            Body::from(bytes)
        }
        None => Body::from(ctx.body.clone()),
    };

    let mut request = Request::new(body);
    *request.method_mut() = ctx.parts.method.clone();
    *request.uri_mut() = uri;
    *request.version_mut() = ctx.parts.version;
    *request.headers_mut() = headers;

    let mut extensions = std::mem::take(&mut ctx.parts.extensions);
    let original_url = ctx
        .original_url
        .parse()
        .unwrap_or_else(|_| ctx.parts.uri.clone());
    extensions.insert(OriginalUri(original_url));
    extensions.insert(ClientId(ctx.client_id.clone()));
    if let Some(at) = ctx.request_time {
        extensions.insert(RequestTime(at));
    }
    if !ctx.polluted.is_empty() {
        extensions.insert(PollutedQuery(ctx.polluted.clone()));
    }
    *request.extensions_mut() = extensions;

    Ok(request)
}

/// `from_fn_with_state` adapter running the pipeline in front of `next`
pub async fn run_pipeline(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    pipeline.handle(request, |req| next.run(req)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use bulkbuy_core::RunMode;
    use parking_lot::Mutex;

    /// Records the order stage hooks run in
    struct Probe {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        outcome: fn() -> StageOutcome,
    }

    #[async_trait]
    impl Stage for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_request(&self, _ctx: &mut RequestContext) -> StageOutcome {
            self.log.lock().push(format!("req:{}", self.name));
            (self.outcome)()
        }

        async fn on_response(&self, _ctx: &RequestContext, response: Response) -> Response {
            self.log.lock().push(format!("res:{}", self.name));
            response
        }
    }

    fn probe(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        outcome: fn() -> StageOutcome,
    ) -> Box<dyn Stage> {
        Box::new(Probe {
            name,
            log: log.clone(),
            outcome,
        })
    }

    fn cont() -> StageOutcome {
        StageOutcome::Continue
    }

    fn teapot() -> StageOutcome {
        StageOutcome::Respond(StatusCode::IM_A_TEAPOT.into_response())
    }

    fn deny() -> StageOutcome {
        StageOutcome::Fail(AppError::rate_limited("slow down"))
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_hooks_unwind() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::from_stages(
            vec![probe("a", &log, cont), probe("b", &log, cont)],
            ErrorFunnel::default(),
        );

        let response = pipeline
            .handle(get("/"), |_| async { StatusCode::OK.into_response() })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock(), vec!["req:a", "req:b", "res:b", "res:a"]);
    }

    #[tokio::test]
    async fn test_respond_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::from_stages(
            vec![
                probe("a", &log, cont),
                probe("b", &log, teapot),
                probe("c", &log, cont),
            ],
            ErrorFunnel::default(),
        );

        let response = pipeline
            .handle(get("/"), |_| async { StatusCode::OK.into_response() })
            .await;

        // The terminal would have answered 200
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(*log.lock(), vec!["req:a", "req:b", "res:b", "res:a"]);
    }

    #[tokio::test]
    async fn test_fail_goes_through_funnel() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::from_stages(
            vec![probe("a", &log, deny), probe("b", &log, cont)],
            ErrorFunnel::default(),
        );

        let response = pipeline
            .handle(get("/"), |_| async { StatusCode::OK.into_response() })
            .await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "slow down");
        assert_eq!(*log.lock(), vec!["req:a", "res:a"]);
    }

    #[tokio::test]
    async fn test_forwarded_handler_error_is_rendered() {
        let pipeline = Pipeline::from_stages(vec![], ErrorFunnel::new(RunMode::Production));

        let response = pipeline
            .handle(get("/"), |_| async {
                AppError::not_found("No products found").into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<crate::error::Forwarded>().is_none());
        let body = body_json(response).await;
        assert_eq!(body["message"], "No products found");
    }

    #[tokio::test]
    async fn test_method_not_allowed_becomes_not_found() {
        let pipeline = Pipeline::from_stages(vec![], ErrorFunnel::default());

        let response = pipeline
            .handle(get("/success?x=1"), |_| async {
                StatusCode::METHOD_NOT_ALLOWED.into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Can't find /success?x=1 on this server");
    }

    #[tokio::test]
    async fn test_terminal_sees_rewritten_query_and_extensions() {
        struct Rewrite;

        #[async_trait]
        impl Stage for Rewrite {
            fn name(&self) -> &'static str {
                "rewrite"
            }

            async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
                ctx.query.insert("keyword".into(), "safe".into());
                ctx.polluted.insert("sort".into(), serde_json::json!(["a", "b"]));
                StageOutcome::Continue
            }
        }

        let pipeline = Pipeline::from_stages(vec![Box::new(Rewrite)], ErrorFunnel::default());
        let response = pipeline
            .handle(get("/search?keyword=evil"), |req| async move {
                assert_eq!(req.uri().query(), Some("keyword=safe"));
                let OriginalUri(original) = req.extensions().get::<OriginalUri>().unwrap().clone();
                assert_eq!(original.to_string(), "/search?keyword=evil");
                assert!(req.extensions().get::<PollutedQuery>().is_some());
                assert!(req.extensions().get::<ClientId>().is_some());
                StatusCode::NO_CONTENT.into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_standard_stage_order() {
        let config = BulkbuyConfig::default();
        let store = Arc::new(crate::middleware::rate_limit::InMemoryRateLimitStore::new());
        let pipeline = Pipeline::from_config(&config, store);
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "security_headers",
                "cors",
                "rate_limit",
                "body",
                "nosql_sanitize",
                "xss_sanitize",
                "parameter_pollution",
                "compression",
                "dev_logging",
                "static_files",
                "request_time",
            ]
        );
    }
}
