//! Inventory ledger
//!
//! Stock reservation and release as conditional `UPDATE`s so two concurrent
//! checkouts can never drive a stock count below zero. Both mutations take
//! `&mut PgConnection` and are meant to run inside the caller's transaction;
//! a partial reservation is undone by the transaction rollback.

use sqlx::PgConnection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("insufficient stock for watch {0}")]
    InsufficientStock(i64),
    #[error("watch {0} has no inventory record")]
    WatchNotFound(i64),
    /// Serialization failure or deadlock: safe to retry the whole transaction.
    #[error("stock update conflict")]
    Conflict,
    #[error(transparent)]
    Db(sqlx::Error),
}

/// Map a sqlx error, recognizing Postgres retry-able failures
/// (40001 serialization_failure, 40P01 deadlock_detected).
fn classify(e: sqlx::Error) -> InventoryError {
    if let sqlx::Error::Database(ref db) = e
        && let Some(code) = db.code()
        && (code == "40001" || code == "40P01")
    {
        return InventoryError::Conflict;
    }
    InventoryError::Db(e)
}

/// Atomically reserve stock for every `(watch_id, quantity)` pair.
///
/// Each decrement only succeeds while enough stock remains; the first
/// shortfall aborts with an error and the caller's rollback undoes any
/// decrements already applied. All-or-nothing.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    items: &[(i64, i32)],
) -> Result<(), InventoryError> {
    for &(watch_id, quantity) in items {
        let result = sqlx::query(
            "UPDATE inventory SET stock_quantity = stock_quantity - $1
             WHERE watch_id = $2 AND stock_quantity >= $1",
        )
        .bind(quantity)
        .bind(watch_id)
        .execute(&mut *conn)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            let exists: Option<(i32,)> =
                sqlx::query_as("SELECT stock_quantity FROM inventory WHERE watch_id = $1")
                    .bind(watch_id)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(classify)?;
            return Err(match exists {
                Some(_) => InventoryError::InsufficientStock(watch_id),
                None => InventoryError::WatchNotFound(watch_id),
            });
        }
    }
    Ok(())
}

/// Return previously reserved stock (order cancellation).
pub async fn release_stock(
    conn: &mut PgConnection,
    items: &[(i64, i32)],
) -> Result<(), InventoryError> {
    for &(watch_id, quantity) in items {
        let result = sqlx::query(
            "UPDATE inventory SET stock_quantity = stock_quantity + $1 WHERE watch_id = $2",
        )
        .bind(quantity)
        .bind(watch_id)
        .execute(&mut *conn)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::WatchNotFound(watch_id));
        }
    }
    Ok(())
}
