//! Unified error codes for the storefront
//!
//! Every expected, user-facing outcome has its own code so the client can
//! react to the specific kind instead of parsing messages. Codes are
//! organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Coupon errors
//! - 7xxx: Inventory errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1002,
    /// Token is invalid
    TokenInvalid = 1003,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Caller is not the owner of the order
    NotOrderOwner = 2002,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Requested status transition is not legal
    InvalidStateTransition = 4002,
    /// Order has no items
    OrderEmpty = 4003,
    /// Operation requires the order to be pending
    OrderNotPending = 4004,

    // ==================== 5xxx: Payment ====================
    /// Gateway callback signature did not verify
    InvalidSignature = 5001,
    /// Callback amount does not match the order total
    PaymentAmountMismatch = 5002,
    /// Gateway referenced an unknown transaction
    UnknownTransaction = 5003,

    // ==================== 6xxx: Coupon ====================
    /// Coupon not found
    CouponNotFound = 6001,
    /// Coupon is deactivated
    CouponInactive = 6002,
    /// Coupon validity window has ended
    CouponExpired = 6003,
    /// Coupon validity window has not begun
    CouponNotYetStarted = 6004,
    /// Order total is below the coupon minimum
    BelowMinimumOrder = 6005,
    /// Coupon global usage limit reached
    UsageLimitExceeded = 6006,
    /// Coupon per-user usage limit reached
    PerUserLimitExceeded = 6007,

    // ==================== 7xxx: Inventory ====================
    /// Not enough stock to cover the requested quantity
    InsufficientStock = 7001,
    /// Watch id has no inventory record
    WatchNotFound = 7002,
    /// Stock existed but could not be safely claimed; caller may retry
    StockConflict = 7003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether this code represents success
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether the failed operation is worth retrying as-is
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::StockConflict)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::NotOrderOwner => "Order belongs to another user",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidStateTransition => "Order status transition is not allowed",
            ErrorCode::OrderEmpty => "Order must contain at least one item",
            ErrorCode::OrderNotPending => "Order is no longer pending",

            // Payment
            ErrorCode::InvalidSignature => "Invalid payment data",
            ErrorCode::PaymentAmountMismatch => "Payment amount does not match order",
            ErrorCode::UnknownTransaction => "Unknown payment transaction",

            // Coupon
            ErrorCode::CouponNotFound => "Coupon not found",
            ErrorCode::CouponInactive => "Coupon is not active",
            ErrorCode::CouponExpired => "Coupon has expired",
            ErrorCode::CouponNotYetStarted => "Coupon is not valid yet",
            ErrorCode::BelowMinimumOrder => "Order total is below the coupon minimum",
            ErrorCode::UsageLimitExceeded => "Coupon usage limit has been reached",
            ErrorCode::PerUserLimitExceeded => "Coupon usage limit for this user has been reached",

            // Inventory
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::WatchNotFound => "Watch not found",
            ErrorCode::StockConflict => "Stock is contended, please retry",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::TokenExpired),
            1003 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::NotOrderOwner),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidStateTransition),
            4003 => Ok(ErrorCode::OrderEmpty),
            4004 => Ok(ErrorCode::OrderNotPending),

            // Payment
            5001 => Ok(ErrorCode::InvalidSignature),
            5002 => Ok(ErrorCode::PaymentAmountMismatch),
            5003 => Ok(ErrorCode::UnknownTransaction),

            // Coupon
            6001 => Ok(ErrorCode::CouponNotFound),
            6002 => Ok(ErrorCode::CouponInactive),
            6003 => Ok(ErrorCode::CouponExpired),
            6004 => Ok(ErrorCode::CouponNotYetStarted),
            6005 => Ok(ErrorCode::BelowMinimumOrder),
            6006 => Ok(ErrorCode::UsageLimitExceeded),
            6007 => Ok(ErrorCode::PerUserLimitExceeded),

            // Inventory
            7001 => Ok(ErrorCode::InsufficientStock),
            7002 => Ok(ErrorCode::WatchNotFound),
            7003 => Ok(ErrorCode::StockConflict),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
