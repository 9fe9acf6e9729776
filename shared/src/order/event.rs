//! Events that drive order status transitions

use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// An event that may advance an order's status
///
/// Events name the cause of a transition, not the target state; the target
/// is derived. `PaymentConfirmed` and `AdminConfirmed` both land on
/// `Processing` but are logged differently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    /// Verified payment-gateway success callback
    PaymentConfirmed,
    /// Manual confirmation by store staff
    AdminConfirmed,
    /// Order handed to the carrier
    Shipped,
    /// Order received by the customer
    Delivered,
    /// Customer cancellation (pending orders only)
    Cancelled,
}

impl OrderEvent {
    /// The status this event lands on when legal
    pub fn target_status(self) -> OrderStatus {
        match self {
            Self::PaymentConfirmed | Self::AdminConfirmed => OrderStatus::Processing,
            Self::Shipped => OrderStatus::Shipped,
            Self::Delivered => OrderStatus::Delivered,
            Self::Cancelled => OrderStatus::Cancelled,
        }
    }
}
