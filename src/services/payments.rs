use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, info, instrument};

type HmacSha256 = Hmac<Sha256>;

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// A gateway-side order created ahead of an online payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units (paise for INR).
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

/// Payment gateway abstraction. The production implementation talks to
/// Razorpay; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a gateway order for the given amount in major currency units.
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError>;

    /// Verifies the signature returned by the client after payment.
    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), ServiceError>;

    /// Issues a full refund for a captured payment.
    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Decimal,
    ) -> Result<GatewayRefund, ServiceError>;
}

/// Razorpay client. Uses HTTP basic auth with the key pair and converts all
/// amounts to paise on the wire.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            key_id,
            key_secret,
            base_url: RAZORPAY_API_BASE.to_string(),
        }
    }

    /// Rupees to paise. Rejects amounts that do not fit a whole paise value.
    fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
        let paise = (amount * Decimal::from(100)).round();
        paise.to_i64().ok_or_else(|| {
            ServiceError::ValidationError(format!("amount {} out of range", amount))
        })
    }
}

#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayRefundResponse {
    id: String,
    status: String,
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let amount_minor = Self::to_minor_units(amount)?;
        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt,
            "payment_capture": 1,
        });

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("order create request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Razorpay order create failed: {} {}", status, text);
            return Err(ServiceError::GatewayError(format!(
                "order create returned {}",
                status
            )));
        }

        let parsed: RazorpayOrderResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("order create response: {}", e)))?;

        info!("Created gateway order {}", parsed.id);
        Ok(GatewayOrder {
            id: parsed.id,
            amount: parsed.amount,
            currency: parsed.currency,
        })
    }

    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), ServiceError> {
        let payload = format!("{}|{}", gateway_order_id, payment_id);
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("hmac init: {}", e)))?;
        mac.update(payload.as_bytes());

        let expected = hex::decode(signature).map_err(|_| {
            ServiceError::PaymentVerificationFailed("signature is not valid hex".to_string())
        })?;

        // Constant-time comparison
        mac.verify_slice(&expected).map_err(|_| {
            ServiceError::PaymentVerificationFailed("signature mismatch".to_string())
        })
    }

    #[instrument(skip(self))]
    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Decimal,
    ) -> Result<GatewayRefund, ServiceError> {
        let amount_minor = Self::to_minor_units(amount)?;
        let body = json!({ "amount": amount_minor });

        let response = self
            .client
            .post(format!("{}/payments/{}/refund", self.base_url, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("refund request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Razorpay refund failed: {} {}", status, text);
            return Err(ServiceError::GatewayError(format!(
                "refund returned {}",
                status
            )));
        }

        let parsed: RazorpayRefundResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("refund response: {}", e)))?;

        info!("Refund {} is {}", parsed.id, parsed.status);
        Ok(GatewayRefund {
            id: parsed.id,
            status: parsed.status,
        })
    }
}

/// Stand-in used when Razorpay credentials are absent. COD checkout still
/// works; online payment endpoints fail fast.
#[derive(Clone, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_order(
        &self,
        _amount: Decimal,
        _currency: &str,
        _receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        Err(ServiceError::GatewayError(
            "online payment is not configured".to_string(),
        ))
    }

    fn verify_payment_signature(
        &self,
        _gateway_order_id: &str,
        _payment_id: &str,
        _signature: &str,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::GatewayError(
            "online payment is not configured".to_string(),
        ))
    }

    async fn refund_payment(
        &self,
        _payment_id: &str,
        _amount: Decimal,
    ) -> Result<GatewayRefund, ServiceError> {
        Err(ServiceError::GatewayError(
            "online payment is not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new(
            "rzp_test_key".to_string(),
            "test_secret".to_string(),
            Duration::from_secs(5),
        )
    }

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn converts_rupees_to_paise() {
        assert_eq!(RazorpayGateway::to_minor_units(dec!(250.00)).unwrap(), 25000);
        assert_eq!(RazorpayGateway::to_minor_units(dec!(99.50)).unwrap(), 9950);
    }

    #[test]
    fn accepts_valid_signature() {
        let gw = gateway();
        let sig = sign("test_secret", "order_abc", "pay_xyz");
        assert!(gw
            .verify_payment_signature("order_abc", "pay_xyz", &sig)
            .is_ok());
    }

    #[test]
    fn rejects_tampered_signature() {
        let gw = gateway();
        let sig = sign("test_secret", "order_abc", "pay_xyz");

        assert!(matches!(
            gw.verify_payment_signature("order_abc", "pay_other", &sig),
            Err(ServiceError::PaymentVerificationFailed(_))
        ));
        assert!(matches!(
            gw.verify_payment_signature("order_abc", "pay_xyz", "deadbeef"),
            Err(ServiceError::PaymentVerificationFailed(_))
        ));
        assert!(matches!(
            gw.verify_payment_signature("order_abc", "pay_xyz", "not-hex"),
            Err(ServiceError::PaymentVerificationFailed(_))
        ));
    }
}
