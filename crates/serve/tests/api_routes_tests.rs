//! Integration tests for the v1 route groups

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bulkbuy_core::BulkbuyConfig;
use bulkbuy_serve::{create_app, middleware::InMemoryRateLimitStore, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_router() -> Router {
    create_app(
        &BulkbuyConfig::default(),
        AppState::in_memory(),
        Arc::new(InMemoryRateLimitStore::new()),
    )
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(router: &Router, email: &str) -> String {
    let (status, body) = call(
        router,
        "POST",
        "/api/v1/users",
        Some(json!({"name": "Ada", "email": email, "password": "correct horse"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["user"]["id"].as_str().unwrap().to_string()
}

async fn create_product(router: &Router, name: &str, price: i64) -> String {
    let (status, body) = call(
        router,
        "POST",
        "/api/v1/products",
        Some(json!({"name": name, "price": price})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["product"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_user_registration_and_lookup() {
    let router = create_test_router();
    let id = register(&router, "Ada@Example.com").await;

    let (status, body) = call(&router, "GET", &format!("/api/v1/users/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = call(&router, "GET", "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 1);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let router = create_test_router();
    register(&router, "ada@example.com").await;

    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/users",
        Some(json!({"name": "Ada", "email": "ADA@example.com", "password": "another one"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn test_short_password_rejected() {
    let router = create_test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/users",
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("at least 8"));
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let router = create_test_router();

    let (status, body) = call(
        &router,
        "GET",
        "/api/v1/products/7f1f7d3e-52a5-4b8e-9a4c-0d5d2f7c9b11",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");

    let (status, _) = call(&router, "GET", "/api/v1/users/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_negative_price_rejected() {
    let router = create_test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/products",
        Some(json!({"name": "Beans", "price": -5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Price cannot be negative");
}

#[tokio::test]
async fn test_cart_to_order_flow() {
    let router = create_test_router();
    let user = register(&router, "buyer@example.com").await;
    let rice = create_product(&router, "Rice 25kg", 4500).await;
    let beans = create_product(&router, "Beans 10kg", 1200).await;

    let (status, body) = call(
        &router,
        "POST",
        &format!("/api/v1/cart/{}/items", user),
        Some(json!({"product_id": rice, "quantity": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["total"], 9000);

    let (_, body) = call(
        &router,
        "POST",
        &format!("/api/v1/cart/{}/items", user),
        Some(json!({"product_id": beans})),
    )
    .await;
    assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["cart"]["total"], 10200);

    let (status, body) = call(
        &router,
        "DELETE",
        &format!("/api/v1/cart/{}/items/{}", user, beans),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["total"], 9000);

    let (status, body) = call(&router, "POST", &format!("/api/v1/orders/{}", user), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["total"], 9000);
    assert_eq!(body["order"]["status"], "pending");

    let (status, body) = call(&router, "GET", &format!("/api/v1/cart/{}", user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["items"], json!([]));

    let (status, body) = call(&router, "POST", &format!("/api/v1/orders/{}", user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty");

    let (_, body) = call(&router, "GET", &format!("/api/v1/orders/{}", user), None).await;
    assert_eq!(body["results"], 1);
}

#[tokio::test]
async fn test_zero_quantity_rejected() {
    let router = create_test_router();
    let user = register(&router, "buyer@example.com").await;
    let rice = create_product(&router, "Rice 25kg", 4500).await;

    let (status, body) = call(
        &router,
        "POST",
        &format!("/api/v1/cart/{}/items", user),
        Some(json!({"product_id": rice, "quantity": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Quantity must be at least 1");
}

#[tokio::test]
async fn test_informational_pages() {
    let router = create_test_router();
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("documenter.getpostman.com"));
}
