//! Database access layer
//!
//! Plain async functions over `sqlx` queries. Row structs live in `models`;
//! mutations that must be atomic take `&mut PgConnection` so callers can
//! compose them inside a single transaction.

pub mod models;
pub mod orders;
pub mod watches;
