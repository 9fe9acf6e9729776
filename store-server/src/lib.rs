//! store-server — watch storefront order & payment core
//!
//! Long-running service that:
//! - Places orders atomically (stock reservation + coupon redemption + order
//!   rows in one transaction)
//! - Reconciles VNPay return callbacks idempotently (HMAC-SHA512 verified)
//! - Cancels pending orders with restock and coupon release
//!
//! # Module structure
//!
//! ```text
//! store-server/src/
//! ├── config.rs     # env-driven configuration
//! ├── state.rs      # shared AppState (pool, services, gateway)
//! ├── error.rs      # ServiceError bridge to the API error type
//! ├── auth/         # customer JWT middleware
//! ├── api/          # HTTP routes and handlers
//! ├── db/           # row structs and order persistence
//! ├── inventory/    # stock reserve/release ledger
//! ├── coupons/      # coupon validation and redemption
//! ├── orders/       # placement / cancellation / reconciliation service
//! ├── payment/      # VNPay signed-URL gateway adapter
//! └── notify.rs     # best-effort confirmation webhook
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod coupons;
pub mod db;
pub mod error;
pub mod inventory;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod state;
