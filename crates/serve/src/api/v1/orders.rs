//! Orders placed from carts

use super::users::require_user;
use crate::dispatch::{Json, Path};
use crate::error::AppError;
use crate::handlers::{AppState, Success};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use bulkbuy_core::{Order, UserId};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub results: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct OneOrder {
    pub order: Order,
}

pub fn order_routes() -> Router<AppState> {
    Router::new().route("/:user_id", get(list_orders).post(checkout))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Success<OrderList>>, AppError> {
    require_user(&state, user_id).await?;
    let orders = state.orders.list(user_id);
    Ok(Json(Success::new(OrderList {
        results: orders.len(),
        orders,
    })))
}

/// Turn the user's cart into a pending order
pub async fn checkout(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<(StatusCode, Json<Success<OneOrder>>), AppError> {
    require_user(&state, user_id).await?;

    let cart = state.carts.take(user_id);
    if cart.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }

    let order = state.orders.place(Order::from_cart(user_id, cart));
    info!(order_id = %order.id, user_id = %user_id, total = order.total, "Order placed");
    Ok((StatusCode::CREATED, Json(Success::new(OneOrder { order }))))
}
