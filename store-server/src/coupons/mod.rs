//! Coupon engine
//!
//! Split in two halves:
//! - pure validation and discount math ([`validate`], [`compute_discount`]),
//!   unit-testable without a database;
//! - transactional application ([`apply`], [`revoke`]) where both usage caps
//!   are enforced under the coupon row lock, so two concurrent checkouts can
//!   never both take the last usage slot, globally or for one user.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgConnection;
use thiserror::Error;

use shared::order::DiscountType;

use crate::db::models::Coupon;

#[derive(Debug, Error)]
pub enum CouponError {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not yet valid")]
    NotYetStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("order total below coupon minimum of {minimum}")]
    BelowMinimumOrder { minimum: i64 },
    #[error("coupon usage limit reached")]
    UsageLimitExceeded,
    #[error("per-user usage limit reached")]
    PerUserLimitExceeded,
    #[error("coupon {0} has a malformed definition")]
    Malformed(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Discount for a given order total, integer VND.
///
/// Percentage discounts round half-up to a whole dong and are capped by
/// `maximum_discount_amount` when set. No discount ever exceeds the order
/// total.
pub fn compute_discount(coupon: &Coupon, order_total: i64) -> Result<i64, CouponError> {
    let kind = DiscountType::from_db(&coupon.discount_type)
        .ok_or_else(|| CouponError::Malformed(coupon.code.clone()))?;

    let raw = match kind {
        DiscountType::Percentage => {
            let discounted = Decimal::from(order_total) * Decimal::from(coupon.discount_value)
                / Decimal::ONE_HUNDRED;
            let rounded = discounted
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .ok_or_else(|| CouponError::Malformed(coupon.code.clone()))?;
            match coupon.maximum_discount_amount {
                Some(cap) => rounded.min(cap),
                None => rounded,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    };

    Ok(raw.clamp(0, order_total))
}

/// Full eligibility check. Returns the discount amount on success.
///
/// Check order matters: an expired coupon reports `Expired` regardless of
/// any other disqualifying field.
pub fn validate(
    coupon: &Coupon,
    order_total: i64,
    per_user_used: i64,
    now: i64,
) -> Result<i64, CouponError> {
    if now > coupon.end_date {
        return Err(CouponError::Expired);
    }
    if now < coupon.start_date {
        return Err(CouponError::NotYetStarted);
    }
    if !coupon.is_active {
        return Err(CouponError::Inactive);
    }
    if let Some(minimum) = coupon.minimum_order_value
        && order_total < minimum
    {
        return Err(CouponError::BelowMinimumOrder { minimum });
    }
    if let Some(max) = coupon.max_usage_count
        && coupon.usage_count >= max
    {
        return Err(CouponError::UsageLimitExceeded);
    }
    if let Some(max) = coupon.max_usage_per_user
        && per_user_used >= i64::from(max)
    {
        return Err(CouponError::PerUserLimitExceeded);
    }

    compute_discount(coupon, order_total)
}

pub async fn fetch(conn: &mut PgConnection, code: &str) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await
}

/// How many times `user_id` has already redeemed `code`.
pub async fn user_usage_count(
    conn: &mut PgConnection,
    code: &str,
    user_id: &str,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM coupon_usages WHERE coupon_code = $1 AND user_id = $2",
    )
    .bind(code)
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Consume one usage slot and record the redemption.
///
/// The increment only succeeds while `usage_count` is still below
/// `max_usage_count`; under contention the loser gets `UsageLimitExceeded`
/// and the caller's transaction rolls back. The increment also takes the
/// coupon row lock, which serializes concurrent redemptions of the same
/// code; the usage-row insert then re-counts the user's redemptions under
/// that lock, so two checkouts by the same user cannot both slip past a
/// `max_usage_per_user` cap that [`validate`] checked from a stale read.
pub async fn apply(
    conn: &mut PgConnection,
    coupon: &Coupon,
    user_id: &str,
    order_id: &str,
    discount_amount: i64,
    now: i64,
) -> Result<(), CouponError> {
    let result = sqlx::query(
        "UPDATE coupons SET usage_count = usage_count + 1
         WHERE code = $1 AND (max_usage_count IS NULL OR usage_count < max_usage_count)",
    )
    .bind(&coupon.code)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CouponError::UsageLimitExceeded);
    }

    let inserted = sqlx::query(
        "INSERT INTO coupon_usages (id, coupon_code, user_id, order_id, discount_amount, created_at)
         SELECT $1, $2, $3, $4, $5, $6
         WHERE $7::INT IS NULL
            OR (SELECT COUNT(*) FROM coupon_usages
                WHERE coupon_code = $2 AND user_id = $3) < $7::INT",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&coupon.code)
    .bind(user_id)
    .bind(order_id)
    .bind(discount_amount)
    .bind(now)
    .bind(coupon.max_usage_per_user)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(CouponError::PerUserLimitExceeded);
    }

    Ok(())
}

/// Undo a redemption (order cancellation): free the usage slot and drop the
/// usage record so the per-user count goes back down.
pub async fn revoke(
    conn: &mut PgConnection,
    code: &str,
    order_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE coupons SET usage_count = GREATEST(usage_count - 1, 0) WHERE code = $1")
        .bind(code)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM coupon_usages WHERE coupon_code = $1 AND order_id = $2")
        .bind(code)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
