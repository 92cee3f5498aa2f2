//! Search request and response types

use bulkbuy_core::Product;
use serde::{Deserialize, Serialize};

/// Message for a search without a usable keyword
pub const MISSING_KEYWORD: &str = "Keyword parameter is required";

/// Message for a search that matched nothing
pub const NO_MATCHES: &str = "No products found";

/// Query parameters of `GET /search/product`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    /// Substring to look for in product names
    pub keyword: Option<String>,
}

impl SearchQuery {
    /// The keyword, if present and not blank
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Successful search result: every matching product in catalog order
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub products: Vec<Product>,
}

impl SearchResponse {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            status: "success",
            products,
        }
    }
}
