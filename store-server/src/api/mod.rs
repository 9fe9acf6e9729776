//! API routes for store-server

pub mod coupons;
pub mod health;
pub mod orders;
pub mod payment;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::user_auth_middleware;
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Customer API (JWT authenticated)
    let customer = Router::new()
        .route("/api/orders", post(orders::create))
        .route("/api/orders/{id}", get(orders::get_by_id))
        .route("/api/orders/{id}/cancel", post(orders::cancel))
        .route("/api/coupons/validate", post(coupons::validate))
        .route("/api/payment/create-vnpay-url", post(payment::create_vnpay_url))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    // Gateway callback (signature-verified, no JWT)
    let callback = Router::new().route("/api/payment/vnpay-return", get(payment::vnpay_return));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(customer)
        .merge(callback)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
