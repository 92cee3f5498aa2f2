//! Keyword search over the product catalog
//!
//! `GET /search/product?keyword=<text>` returns every product whose name
//! contains the keyword, ignoring letter case. There is no pagination or
//! ranking; results keep catalog order.

use crate::dispatch::{Json, Query};
use crate::error::AppError;
use crate::handlers::AppState;
use crate::search::types::{SearchQuery, SearchResponse, MISSING_KEYWORD, NO_MATCHES};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tracing::{debug, info};

/// Search routes, relative to the search group prefix
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/product", get(find_products))
}

/// Case-insensitive substring search on product names
///
/// # Errors
///
/// - 400 with "Keyword parameter is required" when `keyword` is absent or blank
/// - 404 with "No products found" when nothing matches
pub async fn find_products(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let Some(keyword) = params.keyword() else {
        debug!("Search request without keyword");
        return Err(AppError::bad_request(MISSING_KEYWORD));
    };

    let products = state.products.find_by_name(keyword).await?;
    if products.is_empty() {
        return Err(AppError::not_found(NO_MATCHES));
    }

    info!(keyword, matches = products.len(), "Product search completed");
    Ok(Json(SearchResponse::new(products)))
}
