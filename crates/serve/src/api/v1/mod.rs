//! API v1 route groups
//!
//! Mounted under `/api/v1`:
//!
//! - `/users` - account listing, lookup and registration
//! - `/products` - catalog listing, lookup and creation
//! - `/cart` - per-user cart contents
//! - `/orders` - checkout and order history
//! - `/search` - keyword search over the catalog

pub mod cart;
pub mod orders;
pub mod products;
pub mod users;

use crate::handlers::AppState;
use crate::search::search_routes;
use axum::Router;

/// Prefix the v1 groups are mounted under
pub const API_PREFIX: &str = "/api/v1";

/// All v1 route groups, relative to [`API_PREFIX`]
pub fn create_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::user_routes())
        .nest("/products", products::product_routes())
        .nest("/cart", cart::cart_routes())
        .nest("/orders", orders::order_routes())
        .nest("/search", search_routes())
}
