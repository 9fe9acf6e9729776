//! Payment gateway integration

pub mod vnpay;

pub use vnpay::{CallbackError, VnpayGateway};
