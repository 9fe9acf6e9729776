//! Coupon API handlers

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use shared::error::ApiResponse;

use crate::auth::CurrentUser;
use crate::coupons::{self, CouponError};
use crate::error::{ServiceError, ServiceResult};
use crate::orders::service::coupon_app_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_total: i64,
}

/// Non-binding preview: tells the client whether a coupon would apply and
/// for how much. The authoritative check happens again at placement.
#[derive(Debug, Serialize)]
pub struct CouponValidationView {
    pub is_valid: bool,
    pub discount_amount: i64,
    pub message: String,
}

pub async fn validate(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ValidateCouponRequest>,
) -> ServiceResult<Json<ApiResponse<CouponValidationView>>> {
    let mut conn = state.pool.acquire().await?;

    let Some(coupon) = coupons::fetch(&mut conn, &req.code).await? else {
        return Ok(Json(ApiResponse::success(CouponValidationView {
            is_valid: false,
            discount_amount: 0,
            message: "Coupon not found".into(),
        })));
    };

    let used = coupons::user_usage_count(&mut conn, &req.code, &user.user_id).await?;
    let now = chrono::Utc::now().timestamp_millis();

    let view = match coupons::validate(&coupon, req.order_total, used, now) {
        Ok(discount) => CouponValidationView {
            is_valid: true,
            discount_amount: discount,
            message: "Coupon applied".into(),
        },
        Err(e @ (CouponError::Db(_) | CouponError::Malformed(_))) => {
            return Err(ServiceError::App(coupon_app_error(e)));
        }
        Err(e) => CouponValidationView {
            is_valid: false,
            discount_amount: 0,
            message: e.to_string(),
        },
    };

    Ok(Json(ApiResponse::success(view)))
}
