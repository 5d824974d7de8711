//! Payment Gateway Client
//!
//! Thin wrapper over the gateway's REST API (Razorpay wire format): create
//! an order before payment, issue a refund after. Calls are treated as
//! opaque and blocking with no in-process retry; an HTTP or decode failure
//! surfaces as an error the caller maps to a user-visible message.
//!
//! Amounts are always in minor units (paise).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::GatewayConfig;

/// An order created at the gateway, to be confirmed client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
}

/// A refund issued by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: u64,
}

pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl PaymentGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    /// Public key id, exposed to the payment page so the client-side widget
    /// can hand the confirmation back to the gateway.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create an order for the given amount with immediate capture.
    pub async fn create_order(&self, amount_minor: u64) -> Result<GatewayOrder> {
        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount_minor,
                "currency": "INR",
                "payment_capture": 1,
            }))
            .send()
            .await
            .context("gateway order request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("gateway rejected order creation: {status} {body}");
        }

        let order: GatewayOrder = response
            .json()
            .await
            .context("gateway order response was not valid JSON")?;
        info!(order_id = %order.id, amount_minor, "gateway order created");
        Ok(order)
    }

    /// Refund a captured payment, in part or in full.
    pub async fn refund_payment(&self, payment_id: &str, amount_minor: u64) -> Result<GatewayRefund> {
        let url = format!("{}/v1/payments/{payment_id}/refund", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({ "amount": amount_minor }))
            .send()
            .await
            .context("gateway refund request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("gateway rejected refund: {status} {body}");
        }

        let refund: GatewayRefund = response
            .json()
            .await
            .context("gateway refund response was not valid JSON")?;
        info!(refund_id = %refund.id, payment_id, amount_minor, "gateway refund issued");
        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn gateway_for(server: &MockServer) -> PaymentGateway {
        PaymentGateway::new(&GatewayConfig {
            key_id: "key_test".to_string(),
            key_secret: "secret_test".to_string(),
            base_url: server.base_url(),
        })
    }

    #[tokio::test]
    async fn test_create_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/orders")
                    .json_body(serde_json::json!({
                        "amount": 30_000,
                        "currency": "INR",
                        "payment_capture": 1,
                    }));
                then.status(200).json_body(serde_json::json!({
                    "id": "order_A1",
                    "amount": 30_000,
                    "currency": "INR",
                }));
            })
            .await;

        let order = gateway_for(&server).create_order(30_000).await.unwrap();
        assert_eq!(order.id, "order_A1");
        assert_eq!(order.amount, 30_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_order_gateway_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/orders");
                then.status(502).body("upstream unavailable");
            })
            .await;

        let err = gateway_for(&server).create_order(100).await.unwrap_err();
        assert!(err.to_string().contains("rejected order creation"));
    }

    #[tokio::test]
    async fn test_refund_payment() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/payments/pay_123/refund")
                    .json_body(serde_json::json!({ "amount": 30_000 }));
                then.status(200).json_body(serde_json::json!({
                    "id": "rfnd_9",
                    "amount": 30_000,
                }));
            })
            .await;

        let refund = gateway_for(&server)
            .refund_payment("pay_123", 30_000)
            .await
            .unwrap();
        assert_eq!(refund.id, "rfnd_9");
        mock.assert_async().await;
    }
}
