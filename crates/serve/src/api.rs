//! Top-level routes
//!
//! - `/` landing page
//! - `/success`, `/cancel` payment result pages
//! - `/api/v1/...` the versioned API groups
//!
//! Anything else falls through to a 404 naming the requested URL.

pub mod v1;

use crate::error::AppError;
use crate::handlers::{landing_page, payment_cancel, payment_success, AppState};
use axum::extract::OriginalUri;
use axum::routing::get;
use axum::Router;

/// API version
pub const API_VERSION: &str = "v1";

/// Every route of the service, awaiting its state
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(landing_page))
        .route("/success", get(payment_success))
        .route("/cancel", get(payment_cancel))
        .nest(v1::API_PREFIX, v1::create_v1_routes())
        .fallback(route_not_found)
}

/// Catch-all for paths no route matches
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    AppError::route_not_found(&url)
}
