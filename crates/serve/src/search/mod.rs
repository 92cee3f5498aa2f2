//! Product search
//!
//! - `types`: query parameters and the response envelope
//! - `handlers`: the search handler and its routes

pub mod handlers;
pub mod types;

pub use handlers::{find_products, search_routes};
pub use types::{SearchQuery, SearchResponse};
