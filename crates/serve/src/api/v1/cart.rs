//! Shopping carts, one per user

use super::products::require_product;
use super::users::require_user;
use crate::dispatch::{Json, Path};
use crate::error::AppError;
use crate::handlers::{AppState, Success};
use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;
use bulkbuy_core::{Cart, LineItem, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// Body of `POST /cart/:user_id/items`
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Cart contents with the computed total
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<LineItem>,
    pub total: i64,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            total: cart.total(),
            items: cart.items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartEnvelope {
    pub cart: CartView,
}

fn envelope(cart: Cart) -> Json<Success<CartEnvelope>> {
    Json(Success::new(CartEnvelope { cart: cart.into() }))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(get_cart))
        .route("/:user_id/items", post(add_item))
        .route("/:user_id/items/:product_id", delete(remove_item))
}

pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Success<CartEnvelope>>, AppError> {
    require_user(&state, user_id).await?;
    Ok(envelope(state.carts.get(user_id)))
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<AddItem>,
) -> Result<Json<Success<CartEnvelope>>, AppError> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(AppError::bad_request("Quantity must be at least 1"));
    }

    require_user(&state, user_id).await?;
    let product = require_product(&state, payload.product_id).await?;

    let cart = state.carts.add(
        user_id,
        LineItem {
            product_id: product.id,
            name: product.name,
            unit_price: product.price,
            quantity,
        },
    );
    Ok(envelope(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(UserId, ProductId)>,
) -> Result<Json<Success<CartEnvelope>>, AppError> {
    require_user(&state, user_id).await?;
    let cart = state.carts.remove(user_id, product_id)?;
    Ok(envelope(cart))
}
