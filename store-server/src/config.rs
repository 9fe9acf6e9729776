//! Store server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Store server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret for customer authentication
    pub jwt_secret: String,
    /// VNPay merchant terminal code
    pub vnpay_tmn_code: String,
    /// VNPay HMAC-SHA512 signing secret
    pub vnpay_hash_secret: String,
    /// VNPay hosted payment page base URL
    pub vnpay_payment_url: String,
    /// Our callback URL registered with VNPay (vnp_ReturnUrl)
    pub vnpay_return_url: String,
    /// Frontend URL to redirect to after a confirmed payment
    pub payment_success_url: String,
    /// Frontend URL to redirect to after a failed payment
    pub payment_failure_url: String,
    /// Optional webhook URL notified when an order is confirmed
    pub order_webhook_url: Option<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            vnpay_tmn_code: std::env::var("VNPAY_TMN_CODE").unwrap_or_else(|_| "DEMO0001".into()),
            vnpay_hash_secret: Self::require_secret("VNPAY_HASH_SECRET", &environment)?,
            vnpay_payment_url: std::env::var("VNPAY_PAYMENT_URL").unwrap_or_else(|_| {
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into()
            }),
            vnpay_return_url: std::env::var("VNPAY_RETURN_URL").unwrap_or_else(|_| {
                "http://localhost:8080/api/payment/vnpay-return".into()
            }),
            payment_success_url: std::env::var("PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/success".into()),
            payment_failure_url: std::env::var("PAYMENT_FAILURE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/failure".into()),
            order_webhook_url: std::env::var("ORDER_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }
}
