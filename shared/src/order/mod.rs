//! Shared order vocabulary
//!
//! The order status machine and the events that drive it live here so the
//! server and its integration tests agree on what a legal transition is.

mod event;
mod status;

pub use event::OrderEvent;
pub use status::{DiscountType, InvalidTransition, OrderStatus};
