use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};

/// Everything the gateway needs to open a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: i64,
    pub customer_first_name: String,
    pub customer_phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &PaymentRequest) -> AppResult<PaymentSession>;
}

#[derive(Debug, Serialize)]
struct SnapTransactionRequest<'a> {
    transaction_details: SnapTransactionDetails<'a>,
    customer_details: SnapCustomerDetails<'a>,
}

#[derive(Debug, Serialize)]
struct SnapTransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapCustomerDetails<'a> {
    first_name: &'a str,
    phone: &'a str,
}

/// Client for a Snap-style hosted checkout API.
#[derive(Debug, Clone)]
pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl SnapGateway {
    pub fn new(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            server_key: config.server_key.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn create_session(&self, request: &PaymentRequest) -> AppResult<PaymentSession> {
        let url = format!("{}/snap/v1/transactions", self.base_url);
        let body = SnapTransactionRequest {
            transaction_details: SnapTransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.amount,
            },
            customer_details: SnapCustomerDetails {
                first_name: &request.customer_first_name,
                phone: &request.customer_phone,
            },
        };

        let res = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(AppError::from)?;

        if res.status().is_success() {
            res.json::<PaymentSession>()
                .await
                .map_err(|e| AppError::PaymentGateway(format!("Invalid session response: {}", e)))
        } else {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            Err(AppError::PaymentGateway(format!(
                "API returned error status {}: {}",
                status, error_text
            )))
        }
    }
}
