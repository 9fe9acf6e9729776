//! VNPay redirect gateway (signed URLs, no SDK dependency)
//!
//! Outbound: build the hosted-payment-page URL, signed with HMAC-SHA512 over
//! a canonical query string (parameters sorted bytewise by name, values
//! percent-encoded). Inbound: the return callback carries the same parameter
//! set plus `vnp_SecureHash`; we recompute the signature over everything
//! except the hash fields and compare in constant time.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

const VNP_VERSION: &str = "2.1.0";
const VNP_COMMAND_PAY: &str = "pay";
const VNP_CURRENCY: &str = "VND";
const VNP_LOCALE: &str = "vn";
/// VNPay "transaction approved" response code
pub const RESPONSE_CODE_SUCCESS: &str = "00";
/// VNPay timestamps are expressed in Indochina time (UTC+7)
const VNPAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("missing vnp_SecureHash parameter")]
    MissingSignature,
    #[error("signature is not valid hex")]
    MalformedSignature,
    #[error("signature mismatch")]
    Mismatch,
}

#[derive(Clone)]
pub struct VnpayGateway {
    tmn_code: String,
    hash_secret: String,
    payment_url: String,
    return_url: String,
}

impl VnpayGateway {
    pub fn new(
        tmn_code: String,
        hash_secret: String,
        payment_url: String,
        return_url: String,
    ) -> Self {
        Self {
            tmn_code,
            hash_secret,
            payment_url,
            return_url,
        }
    }

    /// Build the signed redirect URL for an order.
    ///
    /// `amount` is integer VND; VNPay's `vnp_Amount` carries it multiplied
    /// by 100. `vnp_TxnRef` is the order id, which is how the return
    /// callback finds its way back to the order.
    pub fn create_payment_url(
        &self,
        order_id: &str,
        amount: i64,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> String {
        let create_date = format_vnpay_date(now);
        let order_info = format!("Thanh toan don hang {order_id}");
        // Widened so the wire string is well-formed for any i64 amount.
        let amount_x100 = (i128::from(amount) * 100).to_string();

        let mut params: BTreeMap<&str, &str> = BTreeMap::new();
        params.insert("vnp_Version", VNP_VERSION);
        params.insert("vnp_Command", VNP_COMMAND_PAY);
        params.insert("vnp_TmnCode", &self.tmn_code);
        params.insert("vnp_Amount", &amount_x100);
        params.insert("vnp_CurrCode", VNP_CURRENCY);
        params.insert("vnp_TxnRef", order_id);
        params.insert("vnp_OrderInfo", &order_info);
        params.insert("vnp_OrderType", "other");
        params.insert("vnp_Locale", VNP_LOCALE);
        params.insert("vnp_ReturnUrl", &self.return_url);
        params.insert("vnp_IpAddr", client_ip);
        params.insert("vnp_CreateDate", &create_date);

        let query = canonical_query(params.iter().map(|(k, v)| (*k, *v)));
        let signature = self.sign(&query);
        format!(
            "{}?{}&vnp_SecureHash={}",
            self.payment_url, query, signature
        )
    }

    /// Verify the callback signature. `params` is the full decoded query
    /// string as received. Constant-time comparison via `Mac::verify_slice`.
    pub fn verify_callback(&self, params: &HashMap<String, String>) -> Result<(), CallbackError> {
        let received = params
            .get("vnp_SecureHash")
            .ok_or(CallbackError::MissingSignature)?;
        let sig_bytes = hex::decode(received).map_err(|_| CallbackError::MalformedSignature)?;

        let signed: BTreeMap<&str, &str> = params
            .iter()
            .filter(|(k, _)| {
                k.starts_with("vnp_") && *k != "vnp_SecureHash" && *k != "vnp_SecureHashType"
            })
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let query = canonical_query(signed.iter().map(|(k, v)| (*k, *v)));

        let mut mac = HmacSha512::new_from_slice(self.hash_secret.as_bytes())
            .map_err(|_| CallbackError::Mismatch)?;
        mac.update(query.as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| CallbackError::Mismatch)
    }

    /// Hex HMAC-SHA512 over an already-canonical query string.
    pub fn sign(&self, canonical: &str) -> String {
        // new_from_slice accepts keys of any length for HMAC
        let mut mac = match HmacSha512::new_from_slice(self.hash_secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return String::new(),
        };
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Sign an arbitrary (sorted) parameter map. Used to fabricate callback
    /// payloads in tests and kept public for that reason.
    pub fn sign_params(&self, params: &BTreeMap<String, String>) -> String {
        let query = canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.sign(&query)
    }
}

/// `key=value` pairs joined with `&`, values percent-encoded. Callers pass
/// an iterator already sorted bytewise by key (BTreeMap order).
fn canonical_query<'a>(params: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    params
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// yyyyMMddHHmmss in UTC+7, the format VNPay expects for vnp_CreateDate.
fn format_vnpay_date(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(VNPAY_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}
