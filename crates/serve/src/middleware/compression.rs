//! gzip response compression
//!
//! A response is compressed when the client accepts gzip, the content type
//! is textual, nothing upstream already encoded it, and the body size is
//! known and lies between the threshold and the buffer cap. A body that
//! fails while being buffered is replaced by an internal error.

use crate::context::RequestContext;
use crate::error::AppError;
use crate::funnel::ErrorFunnel;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use bulkbuy_core::config::CompressionSettings;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use std::io::Write;
use tracing::{debug, warn};

/// Compresses eligible responses with gzip
#[derive(Debug, Clone)]
pub struct Compression {
    settings: CompressionSettings,
    funnel: ErrorFunnel,
}

impl Compression {
    /// Buffering failures are rendered through `funnel`
    pub fn new(settings: CompressionSettings, funnel: ErrorFunnel) -> Self {
        Self { settings, funnel }
    }

    fn level(&self) -> GzLevel {
        GzLevel::new(self.settings.level.min(9))
    }

    /// gzip the whole of `data`
    pub fn gzip(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), self.level());
        encoder.write_all(data)?;
        encoder.finish()
    }
}

/// Whether an `Accept-Encoding` value admits gzip
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    let mut wildcard = false;
    for part in accept_encoding.split(',') {
        let mut params = part.split(';');
        let coding = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let quality = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .filter_map(|q| q.trim().parse::<f32>().ok())
            .next()
            .unwrap_or(1.0);

        match coding.as_str() {
            "gzip" | "x-gzip" => return quality > 0.0,
            "*" => wildcard = quality > 0.0,
            _ => {}
        }
    }
    wildcard
}

/// Whether a content type is worth compressing
pub fn is_compressible(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
        || matches!(
            essence.as_str(),
            "application/json"
                | "application/javascript"
                | "application/xml"
                | "application/x-www-form-urlencoded"
                | "image/svg+xml"
        )
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl Stage for Compression {
    fn name(&self) -> &'static str {
        "compression"
    }

    async fn on_request(&self, _ctx: &mut RequestContext) -> StageOutcome {
        StageOutcome::Continue
    }

    async fn on_response(&self, ctx: &RequestContext, response: Response) -> Response {
        if !self.settings.enabled
            || ctx.parts.method == Method::HEAD
            || matches!(
                response.status(),
                StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED
            )
            || response.headers().contains_key(header::CONTENT_ENCODING)
            || !header_str(ctx.headers(), header::ACCEPT_ENCODING).is_some_and(accepts_gzip)
            || !header_str(response.headers(), header::CONTENT_TYPE).is_some_and(is_compressible)
        {
            return response;
        }

        let size = header_str(response.headers(), header::CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| response.body().size_hint().exact());
        let Some(size) = size.and_then(|s| usize::try_from(s).ok()) else {
            return response;
        };
        if size < self.settings.threshold_bytes || size > self.settings.max_buffer_bytes {
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, self.settings.max_buffer_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return self.funnel.render(
                    &AppError::internal("Failed to read response body").with_detail(e.to_string()),
                );
            }
        };

        if bytes.len() < self.settings.threshold_bytes {
            return Response::from_parts(parts, Body::from(bytes));
        }

        match self.gzip(&bytes) {
            Ok(compressed) => {
                debug!(
                    original = bytes.len(),
                    compressed = compressed.len(),
                    "Compressed response"
                );
                parts
                    .headers
                    .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(compressed.len()));
                parts
                    .headers
                    .append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
                Response::from_parts(parts, Body::from(compressed))
            }
            Err(e) => {
                warn!(error = %e, "gzip failed, sending uncompressed");
                Response::from_parts(parts, Body::from(bytes))
            }
        }
    }
}
