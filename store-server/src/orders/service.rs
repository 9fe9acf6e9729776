//! Order placement, cancellation and payment reconciliation
//!
//! Placement runs as a single transaction: price snapshot, stock
//! reservation, coupon redemption and the order rows all commit together or
//! not at all. Payment confirmation is idempotent; a replayed callback for
//! an already-confirmed order is a no-op success.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use shared::error::{AppError, ErrorCode};
use shared::order::{InvalidTransition, OrderEvent, OrderStatus};

use crate::coupons::{self, CouponError};
use crate::db::models::{Coupon, Order, OrderItem};
use crate::db::{orders, watches};
use crate::inventory::{self, InventoryError};
use crate::notify::Notifier;
use crate::payment::vnpay::{self, VnpayGateway};

/// Transparent retries when a placement transaction hits a serialization
/// failure or deadlock.
const MAX_PLACEMENT_ATTEMPTS: u32 = 3;
const MAX_QUANTITY_PER_ITEM: i32 = 999;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub watch_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub shipping_address: String,
    pub phone_number: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(rename = "order_items")]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(String),
    #[error("order belongs to another user")]
    NotOwner,
    #[error("order has no items")]
    Empty,
    #[error("{0}")]
    Validation(String),
    #[error("order {0} has an unrecognized status")]
    CorruptState(String),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Deliberately opaque to the caller; details go to the security log.
    #[error("invalid payment data")]
    InvalidSignature,
    #[error("unknown transaction reference")]
    UnknownTransaction,
    #[error("callback amount does not match order")]
    AmountMismatch,
    #[error("order {0} has an unrecognized status")]
    CorruptState(String),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Result of processing a gateway return callback.
#[derive(Debug)]
pub enum PaymentOutcome {
    /// This callback moved the order to Processing.
    Confirmed(Order),
    /// The order was already Processing (or further along); nothing changed.
    AlreadyConfirmed(Order),
    /// The gateway reported a declined/aborted payment; the order stays Pending.
    Failed {
        order_id: String,
        response_code: String,
    },
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id)
            }
            OrderError::NotOwner => AppError::new(ErrorCode::NotOrderOwner),
            OrderError::Empty => AppError::new(ErrorCode::OrderEmpty),
            OrderError::Validation(msg) => AppError::validation(msg),
            OrderError::CorruptState(id) => {
                tracing::error!(order_id = %id, "Order row has unrecognized status");
                AppError::new(ErrorCode::InternalError)
            }
            OrderError::Inventory(inv) => match inv {
                InventoryError::InsufficientStock(watch_id) => {
                    AppError::new(ErrorCode::InsufficientStock).with_detail("watch_id", watch_id)
                }
                InventoryError::WatchNotFound(watch_id) => {
                    AppError::new(ErrorCode::WatchNotFound).with_detail("watch_id", watch_id)
                }
                InventoryError::Conflict => AppError::new(ErrorCode::StockConflict),
                InventoryError::Db(e) => {
                    tracing::error!(error = %e, "Inventory database error");
                    AppError::new(ErrorCode::DatabaseError)
                }
            },
            OrderError::Coupon(c) => coupon_app_error(c),
            OrderError::Transition(t) => AppError::new(ErrorCode::InvalidStateTransition)
                .with_detail("from", t.from.as_db())
                .with_detail("to", t.to.as_db()),
            OrderError::Db(e) => {
                tracing::error!(error = %e, "Order database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

pub(crate) fn coupon_app_error(e: CouponError) -> AppError {
    match e {
        CouponError::NotFound => AppError::new(ErrorCode::CouponNotFound),
        CouponError::Inactive => AppError::new(ErrorCode::CouponInactive),
        CouponError::NotYetStarted => AppError::new(ErrorCode::CouponNotYetStarted),
        CouponError::Expired => AppError::new(ErrorCode::CouponExpired),
        CouponError::BelowMinimumOrder { minimum } => {
            AppError::new(ErrorCode::BelowMinimumOrder).with_detail("minimum_order_value", minimum)
        }
        CouponError::UsageLimitExceeded => AppError::new(ErrorCode::UsageLimitExceeded),
        CouponError::PerUserLimitExceeded => AppError::new(ErrorCode::PerUserLimitExceeded),
        CouponError::Malformed(code) => {
            tracing::error!(coupon = %code, "Coupon row has malformed definition");
            AppError::new(ErrorCode::InternalError)
        }
        CouponError::Db(e) => {
            tracing::error!(error = %e, "Coupon database error");
            AppError::new(ErrorCode::DatabaseError)
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::InvalidSignature => AppError::new(ErrorCode::InvalidSignature),
            PaymentError::UnknownTransaction => AppError::new(ErrorCode::UnknownTransaction),
            PaymentError::AmountMismatch => AppError::new(ErrorCode::PaymentAmountMismatch),
            PaymentError::CorruptState(id) => {
                tracing::error!(order_id = %id, "Order row has unrecognized status");
                AppError::new(ErrorCode::InternalError)
            }
            PaymentError::Transition(t) => AppError::new(ErrorCode::InvalidStateTransition)
                .with_detail("from", t.from.as_db())
                .with_detail("to", t.to.as_db()),
            PaymentError::Db(e) => {
                tracing::error!(error = %e, "Payment database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    notifier: Notifier,
}

impl OrderService {
    pub fn new(pool: PgPool, notifier: Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Place an order atomically. Retried a bounded number of times when
    /// the transaction loses a serialization race.
    pub async fn place_order(
        &self,
        user_id: &str,
        req: &PlaceOrder,
    ) -> Result<(Order, Vec<OrderItem>), OrderError> {
        validate_request(req)?;

        let mut attempt = 0;
        loop {
            match self.try_place(user_id, req).await {
                Err(OrderError::Inventory(InventoryError::Conflict))
                    if attempt + 1 < MAX_PLACEMENT_ATTEMPTS =>
                {
                    attempt += 1;
                    tracing::warn!(attempt, user_id, "Placement conflict, retrying");
                }
                other => return other,
            }
        }
    }

    async fn try_place(
        &self,
        user_id: &str,
        req: &PlaceOrder,
    ) -> Result<(Order, Vec<OrderItem>), OrderError> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<i64> = req.items.iter().map(|i| i.watch_id).collect();
        let catalog = watches::find_by_ids(&mut tx, &ids).await?;
        let prices: HashMap<i64, i64> = catalog.iter().map(|w| (w.id, w.price)).collect();
        for item in &req.items {
            if !prices.contains_key(&item.watch_id) {
                return Err(InventoryError::WatchNotFound(item.watch_id).into());
            }
        }

        let reservations: Vec<(i64, i32)> =
            req.items.iter().map(|i| (i.watch_id, i.quantity)).collect();
        inventory::reserve_stock(&mut tx, &reservations).await?;

        let mut subtotal: i64 = 0;
        for item in &req.items {
            let price = prices
                .get(&item.watch_id)
                .copied()
                .ok_or_else(|| InventoryError::WatchNotFound(item.watch_id))?;
            let line = price
                .checked_mul(i64::from(item.quantity))
                .and_then(|l| subtotal.checked_add(l))
                .ok_or_else(|| OrderError::Validation("order total overflows".into()))?;
            subtotal = line;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let order_id = uuid::Uuid::new_v4().to_string();

        let mut discount: i64 = 0;
        let mut coupon: Option<Coupon> = None;
        if let Some(code) = &req.coupon_code {
            let found = coupons::fetch(&mut tx, code)
                .await
                .map_err(CouponError::Db)?
                .ok_or(CouponError::NotFound)?;
            let used = coupons::user_usage_count(&mut tx, code, user_id)
                .await
                .map_err(CouponError::Db)?;
            discount = coupons::validate(&found, subtotal, used, now)?;
            coupon = Some(found);
        }

        let order = Order {
            id: order_id.clone(),
            user_id: user_id.to_string(),
            status: OrderStatus::Pending.as_db().to_string(),
            total_amount: subtotal - discount,
            discount_amount: discount,
            coupon_code: req.coupon_code.clone(),
            shipping_address: req.shipping_address.clone(),
            phone_number: req.phone_number.clone(),
            notes: req.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        orders::insert(&mut tx, &order).await?;

        let mut items = Vec::with_capacity(req.items.len());
        for input in &req.items {
            let unit_price = prices
                .get(&input.watch_id)
                .copied()
                .ok_or_else(|| InventoryError::WatchNotFound(input.watch_id))?;
            let item = OrderItem {
                order_id: order_id.clone(),
                watch_id: input.watch_id,
                quantity: input.quantity,
                unit_price,
            };
            orders::insert_item(&mut tx, &item).await?;
            items.push(item);
        }

        // The usage row references the order, so redemption comes last.
        if let Some(coupon) = &coupon {
            coupons::apply(&mut tx, coupon, user_id, &order_id, discount, now).await?;
        }

        tx.commit().await?;
        tracing::info!(order_id = %order.id, user_id, total = order.total_amount, "Order placed");
        Ok((order, items))
    }

    /// Fetch an order with its items, enforcing ownership.
    pub async fn get_order(
        &self,
        user_id: &str,
        order_id: &str,
    ) -> Result<(Order, Vec<OrderItem>), OrderError> {
        let order = orders::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if order.user_id != user_id {
            return Err(OrderError::NotOwner);
        }
        let items = orders::find_items(&self.pool, order_id).await?;
        Ok((order, items))
    }

    /// Cancel a pending order: flip the status, restock every item and free
    /// the coupon usage slot, all in one transaction.
    pub async fn cancel_order(&self, user_id: &str, order_id: &str) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let mut order = orders::find_by_id_tx(&mut tx, order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if order.user_id != user_id {
            return Err(OrderError::NotOwner);
        }
        let status = order
            .parsed_status()
            .ok_or_else(|| OrderError::CorruptState(order.id.clone()))?;
        let next = status.transition(OrderEvent::Cancelled)?;

        let now = chrono::Utc::now().timestamp_millis();
        let changed = orders::update_status_if(&mut tx, order_id, status, next, now).await?;
        if changed == 0 {
            // Lost a race with a payment callback.
            return Err(InvalidTransition {
                from: status,
                to: next,
            }
            .into());
        }

        let items = orders::find_items_tx(&mut tx, order_id).await?;
        let reservations: Vec<(i64, i32)> =
            items.iter().map(|i| (i.watch_id, i.quantity)).collect();
        inventory::release_stock(&mut tx, &reservations).await?;

        if let Some(code) = &order.coupon_code {
            coupons::revoke(&mut tx, code, order_id).await?;
        }

        tx.commit().await?;
        order.status = next.as_db().to_string();
        order.updated_at = now;
        tracing::info!(order_id, user_id, "Order cancelled");
        Ok(order)
    }

    /// Reconcile a gateway return callback against the order it references.
    ///
    /// Signature verification happens before anything else; a forged
    /// callback never touches the database. Replays are answered with
    /// success and change nothing.
    pub async fn confirm_payment(
        &self,
        gateway: &VnpayGateway,
        params: &HashMap<String, String>,
    ) -> Result<PaymentOutcome, PaymentError> {
        if let Err(e) = gateway.verify_callback(params) {
            tracing::warn!(
                target: "security",
                error = %e,
                "Rejected payment callback with bad signature"
            );
            return Err(PaymentError::InvalidSignature);
        }

        let txn_ref = params
            .get("vnp_TxnRef")
            .ok_or(PaymentError::UnknownTransaction)?;
        let response_code = params
            .get("vnp_ResponseCode")
            .map(String::as_str)
            .unwrap_or_default();

        let mut order = orders::find_by_id(&self.pool, txn_ref)
            .await?
            .ok_or(PaymentError::UnknownTransaction)?;

        let amount: i64 = params
            .get("vnp_Amount")
            .and_then(|a| a.parse().ok())
            .ok_or(PaymentError::AmountMismatch)?;
        let expected = order
            .total_amount
            .checked_mul(100)
            .ok_or(PaymentError::AmountMismatch)?;
        if amount != expected {
            tracing::warn!(
                target: "security",
                order_id = %order.id,
                expected,
                received = amount,
                "Payment callback amount mismatch"
            );
            return Err(PaymentError::AmountMismatch);
        }

        if response_code != vnpay::RESPONSE_CODE_SUCCESS {
            tracing::info!(order_id = %order.id, response_code, "Payment declined by gateway");
            return Ok(PaymentOutcome::Failed {
                order_id: order.id,
                response_code: response_code.to_string(),
            });
        }

        let status = order
            .parsed_status()
            .ok_or_else(|| PaymentError::CorruptState(order.id.clone()))?;
        match status {
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
                tracing::info!(order_id = %order.id, "Duplicate payment callback, skipping");
                Ok(PaymentOutcome::AlreadyConfirmed(order))
            }
            OrderStatus::Cancelled => Err(InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Processing,
            }
            .into()),
            OrderStatus::Pending => {
                let now = chrono::Utc::now().timestamp_millis();
                let mut conn = self.pool.acquire().await?;
                let changed = orders::update_status_if(
                    &mut conn,
                    &order.id,
                    OrderStatus::Pending,
                    OrderStatus::Processing,
                    now,
                )
                .await?;
                if changed == 1 {
                    order.status = OrderStatus::Processing.as_db().to_string();
                    order.updated_at = now;
                    tracing::info!(order_id = %order.id, "Payment confirmed");
                    self.notifier.order_confirmed(&order);
                    return Ok(PaymentOutcome::Confirmed(order));
                }

                // Someone else moved the order first; re-read to decide.
                let current = orders::find_by_id(&self.pool, &order.id)
                    .await?
                    .ok_or(PaymentError::UnknownTransaction)?;
                match current.parsed_status() {
                    Some(OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered) => {
                        Ok(PaymentOutcome::AlreadyConfirmed(current))
                    }
                    Some(s) => Err(InvalidTransition {
                        from: s,
                        to: OrderStatus::Processing,
                    }
                    .into()),
                    None => Err(PaymentError::CorruptState(current.id)),
                }
            }
        }
    }
}

fn validate_request(req: &PlaceOrder) -> Result<(), OrderError> {
    if req.items.is_empty() {
        return Err(OrderError::Empty);
    }
    if req.shipping_address.trim().is_empty() {
        return Err(OrderError::Validation("shipping_address is required".into()));
    }
    if req.phone_number.trim().is_empty() {
        return Err(OrderError::Validation("phone_number is required".into()));
    }
    let mut seen = std::collections::HashSet::new();
    for item in &req.items {
        if item.quantity <= 0 || item.quantity > MAX_QUANTITY_PER_ITEM {
            return Err(OrderError::Validation(format!(
                "quantity for watch {} must be between 1 and {MAX_QUANTITY_PER_ITEM}",
                item.watch_id
            )));
        }
        if !seen.insert(item.watch_id) {
            return Err(OrderError::Validation(format!(
                "watch {} appears more than once",
                item.watch_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<OrderItemInput>) -> PlaceOrder {
        PlaceOrder {
            shipping_address: "1 Tràng Tiền, Hà Nội".into(),
            phone_number: "0912345678".into(),
            notes: None,
            coupon_code: None,
            items,
        }
    }

    #[test]
    fn empty_order_rejected() {
        assert!(matches!(
            validate_request(&request(vec![])),
            Err(OrderError::Empty)
        ));
    }

    #[test]
    fn zero_quantity_rejected() {
        let req = request(vec![OrderItemInput {
            watch_id: 1,
            quantity: 0,
        }]);
        assert!(matches!(
            validate_request(&req),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_watch_rejected() {
        let req = request(vec![
            OrderItemInput {
                watch_id: 1,
                quantity: 1,
            },
            OrderItemInput {
                watch_id: 1,
                quantity: 2,
            },
        ]);
        assert!(matches!(
            validate_request(&req),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn blank_address_rejected() {
        let mut req = request(vec![OrderItemInput {
            watch_id: 1,
            quantity: 1,
        }]);
        req.shipping_address = "   ".into();
        assert!(matches!(
            validate_request(&req),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn valid_request_passes() {
        let req = request(vec![OrderItemInput {
            watch_id: 7,
            quantity: 2,
        }]);
        assert!(validate_request(&req).is_ok());
    }
}
