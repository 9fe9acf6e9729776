//! Order API handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use shared::error::{ApiResponse, AppError, AppResult};
use shared::order::OrderStatus;

use crate::auth::CurrentUser;
use crate::db::models::{Order, OrderItem};
use crate::db::orders as orders_db;
use crate::orders::PlaceOrder;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub watch_id: i64,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub coupon_code: Option<String>,
    pub shipping_address: String,
    pub phone_number: String,
    pub notes: Option<String>,
    pub items: Vec<OrderItemView>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn to_view(order: Order, items: Vec<OrderItem>) -> AppResult<OrderView> {
    let status = order.parsed_status().ok_or_else(|| {
        tracing::error!(order_id = %order.id, "Order row has unrecognized status");
        AppError::internal("Unrecognized order status")
    })?;
    Ok(OrderView {
        id: order.id,
        status,
        total_amount: order.total_amount,
        discount_amount: order.discount_amount,
        coupon_code: order.coupon_code,
        shipping_address: order.shipping_address,
        phone_number: order.phone_number,
        notes: order.notes,
        items: items
            .into_iter()
            .map(|i| OrderItemView {
                watch_id: i.watch_id,
                quantity: i.quantity,
                unit_price: i.unit_price,
                line_total: i.unit_price * i64::from(i.quantity),
            })
            .collect(),
        created_at: order.created_at,
        updated_at: order.updated_at,
    })
}

/// Place a new order
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PlaceOrder>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderView>>)> {
    let (order, items) = state
        .orders
        .place_order(&user.user_id, &req)
        .await
        .map_err(AppError::from)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(to_view(order, items)?)),
    ))
}

/// Get an order by id (owner only)
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderView>>> {
    let (order, items) = state
        .orders
        .get_order(&user.user_id, &id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(ApiResponse::success(to_view(order, items)?)))
}

/// Cancel a pending order
pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderView>>> {
    let order = state
        .orders
        .cancel_order(&user.user_id, &id)
        .await
        .map_err(AppError::from)?;
    let items = orders_db::find_items(&state.pool, &order.id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load items for cancelled order");
            AppError::new(shared::error::ErrorCode::DatabaseError)
        })?;
    Ok(Json(ApiResponse::success(to_view(order, items)?)))
}
