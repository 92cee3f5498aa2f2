//! Application state and the informational pages

use axum::http::header;
use axum::response::{Html, IntoResponse};
use bulkbuy_core::{
    CartBook, InMemoryProductStore, InMemoryUserStore, OrderBook, ProductStore, UserStore,
};
use serde::Serialize;
use std::sync::Arc;

/// Where the landing page sends visitors
pub const API_DOCS_URL: &str = "https://documenter.getpostman.com/view/37611500/2sAYkBrLYW";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductStore>,
    pub users: Arc<dyn UserStore>,
    pub carts: Arc<CartBook>,
    pub orders: Arc<OrderBook>,
}

impl AppState {
    /// State backed entirely by in-memory stores
    pub fn in_memory() -> Self {
        Self::with_products(Arc::new(InMemoryProductStore::new()))
    }

    /// In-memory accounts, carts and orders over the given catalog
    pub fn with_products(products: Arc<dyn ProductStore>) -> Self {
        Self {
            products,
            users: Arc::new(InMemoryUserStore::new()),
            carts: Arc::new(CartBook::new()),
            orders: Arc::new(OrderBook::new()),
        }
    }
}

/// `{status: "success", ...}` wrapper for successful JSON responses
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub status: &'static str,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Success<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Landing page that forwards to the API documentation
pub async fn landing_page() -> impl IntoResponse {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta http-equiv="refresh" content="3;url={url}">
    <title>Bulkbuy API</title>
  </head>
  <body>
    <h1>Welcome to the Bulkbuy API</h1>
    <p>Redirecting to the <a href="{url}">API documentation</a>...</p>
  </body>
</html>
"#,
        url = API_DOCS_URL
    ))
}

/// Shown after a completed checkout payment
pub async fn payment_success() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Payment successful.",
    )
}

/// Shown after an abandoned checkout payment
pub async fn payment_cancel() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Payment canceled.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Response;
    use serde_json::json;

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_success_envelope_flattens() {
        #[derive(Serialize)]
        struct Count {
            results: usize,
        }

        let value = serde_json::to_value(Success::new(Count { results: 3 })).unwrap();
        assert_eq!(value, json!({"status": "success", "results": 3}));
    }

    #[tokio::test]
    async fn test_landing_page_redirects_to_docs() {
        let body = text(landing_page().await.into_response()).await;
        assert!(body.contains("http-equiv=\"refresh\""));
        assert!(body.contains(API_DOCS_URL));
    }

    #[tokio::test]
    async fn test_payment_pages() {
        assert_eq!(
            text(payment_success().await.into_response()).await,
            "Payment successful."
        );
        assert_eq!(
            text(payment_cancel().await.into_response()).await,
            "Payment canceled."
        );
    }

    #[tokio::test]
    async fn test_in_memory_state_starts_empty() {
        let state = AppState::in_memory();
        assert!(state.products.list().await.unwrap().is_empty());
        assert!(state.users.list().await.unwrap().is_empty());
    }
}
