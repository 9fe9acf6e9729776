//! Order persistence

use sqlx::{PgConnection, PgPool};

use shared::order::OrderStatus;

use super::models::{Order, OrderItem};

pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, status, total_amount, discount_amount, coupon_code,
                             shipping_address, phone_number, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.status)
    .bind(order.total_amount)
    .bind(order.discount_amount)
    .bind(&order.coupon_code)
    .bind(&order.shipping_address)
    .bind(&order.phone_number)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_item(conn: &mut PgConnection, item: &OrderItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_items (order_id, watch_id, quantity, unit_price)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(&item.order_id)
    .bind(item.watch_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id_tx(
    conn: &mut PgConnection,
    id: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_items(pool: &PgPool, order_id: &str) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY watch_id")
        .bind(order_id)
        .fetch_all(pool)
        .await
}

pub async fn find_items_tx(
    conn: &mut PgConnection,
    order_id: &str,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY watch_id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Compare-and-swap status transition. Returns the number of rows changed:
/// 0 means the order was not in `from` anymore (lost race or wrong state).
pub async fn update_status_if(
    conn: &mut PgConnection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(to.as_db())
    .bind(now)
    .bind(id)
    .bind(from.as_db())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
