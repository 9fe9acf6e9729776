//! Order status machine

use serde::{Deserialize, Serialize};

use super::OrderEvent;

/// Order lifecycle status
///
/// Fulfillment runs strictly forward; cancellation is a customer action
/// available only before fulfillment begins:
///
/// ```text
/// Pending ──▶ Processing ──▶ Shipped ──▶ Delivered
///    │
///    └──▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting payment confirmation
    #[default]
    Pending,
    /// Payment confirmed, being prepared
    Processing,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled before fulfillment began
    Cancelled,
}

/// Attempted status transition that the machine forbids
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal order transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
        )
    }

    /// Apply an event, returning the resulting status
    ///
    /// The status is only advanced here; the side effects tied to a
    /// transition (stock release, coupon revocation) are the caller's
    /// responsibility and must commit in the same unit of work.
    pub fn transition(self, event: OrderEvent) -> Result<OrderStatus, InvalidTransition> {
        let to = event.target_status();
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    /// Database representation (TEXT column)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the database representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "SHIPPED" => Some(Self::Shipped),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Coupon discount kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Percent of the order total, optionally capped
    Percentage,
    /// Flat amount, floored at the order total
    Fixed,
}

impl DiscountType {
    /// Database representation (TEXT column)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Percentage => "PERCENTAGE",
            Self::Fixed => "FIXED",
        }
    }

    /// Parse the database representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PERCENTAGE" => Some(Self::Percentage),
            "FIXED" => Some(Self::Fixed),
            _ => None,
        }
    }
}
