//! Order orchestration

pub mod service;

pub use service::{
    OrderError, OrderItemInput, OrderService, PaymentError, PaymentOutcome, PlaceOrder,
};
