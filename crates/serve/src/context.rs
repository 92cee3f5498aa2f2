//! Per-request state threaded through the pipeline stages

use crate::middleware::query;
use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap, Request};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::Instant;

/// Time the request was received, available to handlers as an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime(pub DateTime<Utc>);

/// Client identifier used for rate limiting, available to handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

/// Query keys that arrived with repeated values, before they were collapsed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollutedQuery(pub Map<String, Value>);

/// Mutable view of an in-flight request
pub struct RequestContext {
    /// Method, URI, headers and extensions as received
    pub parts: Parts,
    /// Request path, rewritten by sanitization
    pub path: String,
    /// Path and query exactly as received
    pub original_url: String,
    /// Parsed query string
    pub query: Map<String, Value>,
    /// Values removed by parameter-pollution protection
    pub polluted: Map<String, Value>,
    /// Raw body, buffered by the body stage
    pub body: Bytes,
    /// Parsed JSON body
    pub json: Option<Value>,
    pub client_id: String,
    pub request_time: Option<DateTime<Utc>>,
    pub started_at: Instant,
    /// Stage-private values that are not forwarded to handlers
    pub locals: axum::http::Extensions,
    // Body is not Sync; the lock keeps the context shareable across hooks
    unread_body: Mutex<Option<Body>>,
}

impl RequestContext {
    pub fn new(request: Request<Body>, trust_proxy: bool) -> Self {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();
        let original_url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());
        let query = parts.uri.query().map(query::parse).unwrap_or_default();
        let client_id = client_id(&parts, trust_proxy);

        Self {
            parts,
            path,
            original_url,
            query,
            polluted: Map::new(),
            body: Bytes::new(),
            json: None,
            client_id,
            request_time: None,
            started_at: Instant::now(),
            locals: axum::http::Extensions::new(),
            unread_body: Mutex::new(Some(body)),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Take the body stream; `None` once it has been taken
    pub fn take_body(&mut self) -> Option<Body> {
        self.unread_body.get_mut().take()
    }
}

/// Client address, optionally taken from the first `X-Forwarded-For` entry
fn client_id(parts: &Parts, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_context_parses_query() {
        let ctx = RequestContext::new(request("/api/v1/search/product?keyword=shirt"), false);
        assert_eq!(ctx.path, "/api/v1/search/product");
        assert_eq!(ctx.original_url, "/api/v1/search/product?keyword=shirt");
        assert_eq!(ctx.query["keyword"], "shirt");
    }

    #[test]
    fn test_client_id_from_connect_info() {
        let mut req = request("/");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        let ctx = RequestContext::new(req, false);
        assert_eq!(ctx.client_id, "192.0.2.1");
    }

    #[test]
    fn test_client_id_trusting_proxy() {
        let ctx = RequestContext::new(request("/"), true);
        assert_eq!(ctx.client_id, "203.0.113.7");
    }

    #[test]
    fn test_client_id_unknown() {
        let ctx = RequestContext::new(request("/"), false);
        assert_eq!(ctx.client_id, "unknown");
    }

    #[test]
    fn test_take_body_once() {
        let mut ctx = RequestContext::new(request("/"), false);
        assert!(ctx.take_body().is_some());
        assert!(ctx.take_body().is_none());
    }
}
