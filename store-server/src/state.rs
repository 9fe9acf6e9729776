//! Application state for store-server

use sqlx::PgPool;

use crate::config::Config;
use crate::notify::Notifier;
use crate::orders::OrderService;
use crate::payment::VnpayGateway;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Order placement / cancellation / reconciliation
    pub orders: OrderService,
    /// VNPay redirect gateway
    pub vnpay: VnpayGateway,
    /// JWT secret for customer authentication
    pub jwt_secret: String,
    /// Frontend redirect after a confirmed payment
    pub payment_success_url: String,
    /// Frontend redirect after a failed payment
    pub payment_failure_url: String,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let notifier = Notifier::new(config.order_webhook_url.clone());
        let orders = OrderService::new(pool.clone(), notifier);

        let vnpay = VnpayGateway::new(
            config.vnpay_tmn_code.clone(),
            config.vnpay_hash_secret.clone(),
            config.vnpay_payment_url.clone(),
            config.vnpay_return_url.clone(),
        );

        Ok(Self {
            pool,
            orders,
            vnpay,
            jwt_secret: config.jwt_secret.clone(),
            payment_success_url: config.payment_success_url.clone(),
            payment_failure_url: config.payment_failure_url.clone(),
        })
    }
}
