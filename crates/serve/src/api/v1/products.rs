//! Product catalog

use crate::dispatch::{Json, Path};
use crate::error::AppError;
use crate::handlers::{AppState, Success};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use bulkbuy_core::{Product, ProductId};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of `POST /products`; prices are in minor currency units
#[derive(Debug, Default, Deserialize)]
pub struct CreateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}

impl CreateProduct {
    pub fn into_product(self) -> Result<Product, AppError> {
        let name = self.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request("A product must have a name"));
        }
        let price = self
            .price
            .ok_or_else(|| AppError::bad_request("A product must have a price"))?;
        if price < 0 {
            return Err(AppError::bad_request("Price cannot be negative"));
        }
        Ok(Product::new(
            name,
            self.description.unwrap_or_default().trim(),
            price,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub results: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct OneProduct {
    pub product: Product,
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Success<ProductList>>, AppError> {
    let products = state.products.list().await?;
    Ok(Json(Success::new(ProductList {
        results: products.len(),
        products,
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Success<OneProduct>>, AppError> {
    let product = require_product(&state, id).await?;
    Ok(Json(Success::new(OneProduct { product })))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Success<OneProduct>>), AppError> {
    let product = state.products.insert(payload.into_product()?).await?;
    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(Success::new(OneProduct { product }))))
}

pub(crate) async fn require_product(state: &AppState, id: ProductId) -> Result<Product, AppError> {
    state
        .products
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No product found with id {}", id)))
}
