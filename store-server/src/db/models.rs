//! Row structs shared across the query modules

use serde::Serialize;
use shared::order::OrderStatus;

/// Catalog row — only what order placement needs
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Watch {
    pub id: i64,
    pub name: String,
    /// Integer VND
    pub price: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRecord {
    pub watch_id: i64,
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Stored as TEXT; parse with [`Order::parsed_status`]
    pub status: String,
    /// Final amount after discount, integer VND
    pub total_amount: i64,
    pub discount_amount: i64,
    pub coupon_code: Option<String>,
    pub shipping_address: String,
    pub phone_number: String,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Parse the TEXT status column. `None` means a corrupt row.
    pub fn parsed_status(&self) -> Option<OrderStatus> {
        OrderStatus::from_db(&self.status)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderItem {
    pub order_id: String,
    pub watch_id: i64,
    pub quantity: i32,
    /// Catalog price at placement time, integer VND
    pub unit_price: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Coupon {
    pub code: String,
    /// 'PERCENTAGE' | 'FIXED'
    pub discount_type: String,
    pub discount_value: i64,
    pub minimum_order_value: Option<i64>,
    pub maximum_discount_amount: Option<i64>,
    pub start_date: i64,
    pub end_date: i64,
    pub is_active: bool,
    pub max_usage_count: Option<i32>,
    pub max_usage_per_user: Option<i32>,
    pub usage_count: i32,
}
