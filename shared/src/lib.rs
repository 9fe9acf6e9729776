//! Shared types for the watch storefront
//!
//! Common types used by the server and by integration tests: the unified
//! error system and the order vocabulary (statuses, events, discount kinds).

pub mod error;
pub mod order;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use order::{DiscountType, OrderEvent, OrderStatus};
