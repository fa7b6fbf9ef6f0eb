use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{CheckoutError, GatewayResponse, PaymentGateway, PaymentInfo, Result};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub private_key: String,
}

/// HTTP client for the external payment processor. The caller imposes the
/// timeout; this client only reports what the gateway answered.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    reference: Uuid,
    payment_method: ChargeMethod<'a>,
    shipping_address: &'a str,
}

#[derive(Debug, Serialize)]
struct ChargeMethod<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    card_number: &'a str,
    card_type: String,
}

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    data: ChargeData,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    id: String,
    status: String,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        if config.private_key.trim().is_empty() {
            return Err(CheckoutError::Config(
                "Gateway private key must be defined".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CheckoutError::Config(format!("Cannot build gateway client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn transactions_url(&self) -> String {
        format!("{}/transactions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn process_payment(
        &self,
        transaction_id: Uuid,
        payment: &PaymentInfo,
    ) -> Result<GatewayResponse> {
        let request = ChargeRequest {
            reference: transaction_id,
            payment_method: ChargeMethod {
                kind: "CARD",
                card_number: &payment.card_number,
                card_type: payment.card_type.trim().to_ascii_uppercase(),
            },
            shipping_address: payment.customer_address.trim(),
        };

        let response = self
            .client
            .post(self.transactions_url())
            .bearer_auth(&self.config.private_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway request for transaction {} failed: {}", transaction_id, e);
                CheckoutError::gateway(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "Gateway rejected transaction {} with {}: {}",
                transaction_id, status, body
            );
            return Err(CheckoutError::Gateway(format!("gateway answered {}", status)));
        }

        let envelope: ChargeEnvelope = response.json().await.map_err(|e| {
            error!("Gateway response for transaction {} unreadable: {}", transaction_id, e);
            CheckoutError::gateway(e)
        })?;
        debug!(
            "Gateway answered {} for transaction {} ({})",
            envelope.data.status, transaction_id, envelope.data.id
        );

        let status = envelope.data.status.parse().map_err(|_| {
            CheckoutError::Gateway(format!("unexpected gateway status {}", envelope.data.status))
        })?;

        Ok(GatewayResponse {
            status,
            gateway_transaction_id: envelope.data.id,
        })
    }
}
