//! Payment API handlers
//!
//! `create_vnpay_url` hands the client a signed redirect to the hosted
//! payment page. `vnpay_return` is the gateway's return callback: it
//! reconciles the payment and redirects the browser to the frontend result
//! page. A callback with a bad signature gets a generic 400, never a
//! redirect.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
use shared::order::OrderStatus;

use crate::auth::CurrentUser;
use crate::orders::PaymentOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentUrlRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentUrlView {
    pub payment_url: String,
}

/// Build a signed VNPay redirect URL for a pending order (owner only)
pub async fn create_vnpay_url(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(req): Json<CreatePaymentUrlRequest>,
) -> AppResult<Json<ApiResponse<PaymentUrlView>>> {
    let (order, _) = state
        .orders
        .get_order(&user.user_id, &req.order_id)
        .await
        .map_err(AppError::from)?;

    let status = order.parsed_status().ok_or_else(|| {
        tracing::error!(order_id = %order.id, "Order row has unrecognized status");
        AppError::new(ErrorCode::InternalError)
    })?;
    if status != OrderStatus::Pending {
        return Err(AppError::new(ErrorCode::OrderNotPending));
    }

    let ip = client_ip(&headers);
    let url = state
        .vnpay
        .create_payment_url(&order.id, order.total_amount, &ip, chrono::Utc::now());
    Ok(Json(ApiResponse::success(PaymentUrlView {
        payment_url: url,
    })))
}

/// VNPay return callback (unauthenticated; trust comes from the signature)
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    match state.orders.confirm_payment(&state.vnpay, &params).await {
        Ok(PaymentOutcome::Confirmed(order) | PaymentOutcome::AlreadyConfirmed(order)) => {
            Ok(Redirect::to(&format!(
                "{}?orderId={}",
                state.payment_success_url, order.id
            )))
        }
        Ok(PaymentOutcome::Failed {
            order_id,
            response_code,
        }) => Ok(Redirect::to(&format!(
            "{}?orderId={}&code={}",
            state.payment_failure_url, order_id, response_code
        ))),
        Err(e) => Err(e.into()),
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
