//! Best-effort order notifications
//!
//! Confirmation events are POSTed to an optional webhook. Delivery is
//! fire-and-forget: a spawned task logs failures and never feeds an error
//! back into the payment flow.

use serde::Serialize;

use crate::db::models::Order;

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

#[derive(Serialize)]
struct OrderConfirmedPayload {
    event: &'static str,
    order_id: String,
    user_id: String,
    total_amount: i64,
    confirmed_at: i64,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Announce a confirmed payment. Returns immediately.
    pub fn order_confirmed(&self, order: &Order) {
        let Some(url) = self.webhook_url.clone() else {
            tracing::debug!(order_id = %order.id, "No webhook configured, skipping notification");
            return;
        };

        let body = OrderConfirmedPayload {
            event: "order.confirmed",
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            total_amount: order.total_amount,
            confirmed_at: order.updated_at,
        };
        let client = self.client.clone();
        let order_id = order.id.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(order_id = %order_id, "Order confirmation notified");
                }
                Ok(resp) => {
                    tracing::warn!(
                        order_id = %order_id,
                        status = %resp.status(),
                        "Order confirmation webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "Order confirmation webhook failed");
                }
            }
        });
    }
}
