//! Per-client rate limiting
//!
//! Fixed-window counting keyed by client identifier. Only paths under the
//! configured prefix are counted. Window state lives behind the
//! [`RateLimitStore`] trait so the counter can move out of process.

use crate::context::RequestContext;
use crate::error::AppError;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bulkbuy_core::config::RateLimitSettings;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Counter state of one client window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests counted in the current window, including this one
    pub count: u64,
    /// When the current window opened
    pub window_start: Instant,
}

impl RateWindow {
    /// Time left until the window resets
    pub fn remaining_time(&self, window: Duration, now: Instant) -> Duration {
        (self.window_start + window).saturating_duration_since(now)
    }
}

/// Storage for rate limit windows
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count a request for `key` and return the updated window
    async fn increment(&self, key: &str, window: Duration) -> RateWindow;

    /// Forget the window of `key`
    async fn reset(&self, key: &str);

    /// Drop expired windows, returning how many were removed
    async fn prune(&self, window: Duration) -> usize;
}

/// Process-local window store
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request at an explicit instant
    pub fn hit_at(&self, key: &str, window: Duration, now: Instant) -> RateWindow {
        let mut windows = self.windows.lock();
        let entry = windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;
        *entry
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    fn prune_at(&self, window: Duration, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) < window);
        before - windows.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn increment(&self, key: &str, window: Duration) -> RateWindow {
        self.hit_at(key, window, Instant::now())
    }

    async fn reset(&self, key: &str) {
        self.windows.lock().remove(key);
    }

    async fn prune(&self, window: Duration) -> usize {
        self.prune_at(window, Instant::now())
    }
}

/// Limit status recorded for the response hook
#[derive(Debug, Clone, Copy)]
struct RateLimitInfo {
    limit: u64,
    remaining: u64,
    reset_secs: u64,
}

/// Whether `path` lies under `prefix`, compared segment-wise and
/// case-insensitively
pub fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    let path = path.as_bytes();
    let prefix = prefix.as_bytes();
    if path.len() < prefix.len() || !path[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return false;
    }
    path.len() == prefix.len() || path[prefix.len()] == b'/'
}

/// Counts requests per client and rejects those over the limit
pub struct RateLimiter {
    settings: RateLimitSettings,
    window: Duration,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    /// Creates a limiter over `store`
    ///
    /// # Arguments
    ///
    /// * `settings` - Limit, window length, path prefix and rejection message
    /// * `store` - Window storage shared by every request
    pub fn new(settings: RateLimitSettings, store: Arc<dyn RateLimitStore>) -> Self {
        let window = Duration::from_secs(settings.window_secs.max(1));
        Self {
            settings,
            window,
            store,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn write_headers(info: &RateLimitInfo, status: StatusCode, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(info.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset_secs));
        if status == StatusCode::TOO_MANY_REQUESTS {
            headers.insert("retry-after", HeaderValue::from(info.reset_secs));
        }
    }
}

#[async_trait]
impl Stage for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        if !under_prefix(&ctx.path, &self.settings.path_prefix) {
            return StageOutcome::Continue;
        }

        let now = Instant::now();
        let state = self.store.increment(&ctx.client_id, self.window).await;
        let reset = state.remaining_time(self.window, now);
        let info = RateLimitInfo {
            limit: self.settings.max_requests,
            remaining: self.settings.max_requests.saturating_sub(state.count),
            // Round up so clients never retry early
            reset_secs: reset.as_secs() + u64::from(reset.subsec_nanos() > 0),
        };
        ctx.locals.insert(info);

        if state.count > self.settings.max_requests {
            warn!(
                client = %ctx.client_id,
                path = %ctx.path,
                count = state.count,
                limit = self.settings.max_requests,
                "Rate limit exceeded"
            );
            return StageOutcome::Fail(AppError::rate_limited(self.settings.message.clone()));
        }

        debug!(client = %ctx.client_id, count = state.count, "Request counted");
        StageOutcome::Continue
    }

    async fn on_response(&self, ctx: &RequestContext, mut response: Response) -> Response {
        if let Some(info) = ctx.locals.get::<RateLimitInfo>() {
            let status = response.status();
            Self::write_headers(info, status, response.headers_mut());
        }
        response
    }
}

/// Periodically drop expired windows from `store`
pub fn spawn_pruner(
    store: Arc<dyn RateLimitStore>,
    window: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.prune(window).await;
            if removed > 0 {
                debug!(removed, "Pruned expired rate limit windows");
            }
        }
    })
}
