//! Security headers and CORS stages
//!
//! Hardening headers are added to every response without overwriting any
//! header a handler already set. CORS headers go on every response, and
//! preflight requests are answered before they reach the router.

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bulkbuy_core::config::CorsSettings;

/// Default hardening headers
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';script-src 'self';script-src-attr 'none';style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Adds [`SECURITY_HEADERS`] to responses
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(header::HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn new() -> Self {
        let headers = SECURITY_HEADERS
            .iter()
            .map(|(name, value)| {
                (
                    header::HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();
        Self { headers }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        headers.remove("x-powered-by");
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    async fn on_request(&self, _ctx: &mut RequestContext) -> StageOutcome {
        StageOutcome::Continue
    }

    async fn on_response(&self, _ctx: &RequestContext, mut response: Response) -> Response {
        self.apply(response.headers_mut());
        response
    }
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins
    pub allow_origins: Vec<String>,
    /// Allowed HTTP methods
    pub allow_methods: Vec<String>,
    /// Exposed headers
    pub expose_headers: Vec<String>,
    /// Max age for preflight cache in seconds
    pub max_age: u64,
    /// Allow credentials
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            expose_headers: vec![
                "x-ratelimit-limit".to_string(),
                "x-ratelimit-remaining".to_string(),
                "x-ratelimit-reset".to_string(),
                "retry-after".to_string(),
            ],
            max_age: 86400,
            allow_credentials: false,
        }
    }
}

impl From<&CorsSettings> for CorsConfig {
    fn from(settings: &CorsSettings) -> Self {
        Self {
            allow_origins: settings.allow_origins.clone(),
            max_age: settings.max_age,
            allow_credentials: settings.allow_credentials,
            ..Self::default()
        }
    }
}

impl CorsConfig {
    fn allows_any(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }

    /// The `Access-Control-Allow-Origin` value for a request origin
    fn allowed_origin<'a>(&self, origin: Option<&'a str>) -> Option<&'a str> {
        match origin {
            // Credentials cannot be combined with a wildcard
            Some(origin) if self.allow_credentials && self.allows_any() => Some(origin),
            _ if self.allows_any() => Some("*"),
            Some(origin) if self.allow_origins.iter().any(|o| o == origin) => Some(origin),
            _ => None,
        }
    }
}

/// Handles preflight requests and adds CORS headers to responses
#[derive(Debug, Clone)]
pub struct CorsStage {
    config: CorsConfig,
}

impl CorsStage {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn is_preflight(ctx: &RequestContext) -> bool {
        ctx.parts.method == Method::OPTIONS
            && ctx
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    fn add_headers(&self, ctx: &RequestContext, response: &mut Response) {
        let origin = ctx
            .headers()
            .get(header::ORIGIN)
            .and_then(|h| h.to_str().ok());
        let headers = response.headers_mut();

        if let Some(allowed) = self.config.allowed_origin(origin) {
            if let Ok(value) = HeaderValue::from_str(allowed) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            if allowed != "*" {
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
        }

        if self.config.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        if let Ok(value) = HeaderValue::from_str(&self.config.expose_headers.join(", ")) {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, value);
        }

        if Self::is_preflight(ctx) {
            if let Ok(value) = HeaderValue::from_str(&self.config.allow_methods.join(",")) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
            }
            // Reflect the requested headers
            if let Some(requested) = ctx.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
                headers.append(
                    header::VARY,
                    HeaderValue::from_static("Access-Control-Request-Headers"),
                );
            }
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.config.max_age));
        }
    }
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        if Self::is_preflight(ctx) {
            let mut response = StatusCode::NO_CONTENT.into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            return StageOutcome::Respond(response);
        }
        StageOutcome::Continue
    }

    async fn on_response(&self, ctx: &RequestContext, mut response: Response) -> Response {
        self.add_headers(ctx, &mut response);
        response
    }
}
