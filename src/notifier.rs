use async_trait::async_trait;
use serde::Serialize;

use crate::config::NotifierConfig;
use crate::error::{AppError, AppResult};
use crate::model::Order;
use crate::types::CredentialSnapshot;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// `phone` is already normalized to the international form.
    async fn send(&self, phone: &str, message: &str) -> AppResult<()>;
}

/// Strip formatting and rewrite a local number (`08…`, `+62 8…`, `62-8…`) to
/// the `<country code><subscriber>` form the messaging API expects.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(local) = digits.strip_prefix('0') {
        format!("{}{}", country_code, local)
    } else if digits.starts_with(country_code) {
        digits
    } else if raw.trim_start().starts_with('+') {
        // Some other country, already international.
        digits
    } else {
        format!("{}{}", country_code, digits)
    }
}

/// Deliver a message and log instead of failing. Nothing that already
/// happened is undone when this fails.
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    country_code: &str,
    raw_phone: &str,
    message: &str,
) {
    let phone = normalize_phone(raw_phone, country_code);
    match notifier.send(&phone, message).await {
        Ok(()) => tracing::info!(phone = %phone, "Customer notification sent"),
        Err(e) => tracing::warn!(phone = %phone, error = %e, "Customer notification failed"),
    }
}

pub fn order_created_message(store_name: &str, order: &Order) -> String {
    format!(
        "Hi {}, thank you for ordering at {}.\n\nOrder ID: {}\nItem: {} x{}\nTotal: {}\n\nComplete your payment here:\n{}",
        order.customer_name,
        store_name,
        order.id,
        order.variant.name,
        order.quantity,
        order.total,
        order.payment_url.as_deref().unwrap_or("-"),
    )
}

pub fn credentials_delivered_message(
    store_name: &str,
    order: &Order,
    credentials: &[CredentialSnapshot],
) -> String {
    let mut message = format!(
        "Hi {}, your payment for order {} at {} has been received.\n\nYour account details ({}):",
        order.customer_name, order.id, store_name, order.variant.name,
    );
    for (index, credential) in credentials.iter().enumerate() {
        message.push_str(&format!(
            "\n\n#{}\nUsername: {}\nPassword: {}",
            index + 1,
            credential.username,
            credential.password
        ));
    }
    message.push_str("\n\nPlease do not change the account password.");
    message
}

pub fn fulfillment_delayed_message(store_name: &str, order: &Order) -> String {
    format!(
        "Hi {}, your payment for order {} at {} has been received. Your account is being prepared and will be sent to you shortly.",
        order.customer_name, order.id, store_name,
    )
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    target: &'a str,
    message: &'a str,
}

/// Client for a WhatsApp-style messaging API.
#[derive(Debug, Clone)]
pub struct WhatsAppNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WhatsAppNotifier {
    pub fn new(client: reqwest::Client, config: &NotifierConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    async fn send(&self, phone: &str, message: &str) -> AppResult<()> {
        let url = format!("{}/send", self.base_url);
        let res = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .json(&SendMessageRequest {
                target: phone,
                message,
            })
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        if res.status().is_success() {
            Ok(())
        } else {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            Err(AppError::Notification(format!(
                "API returned error status {}: {}",
                status, error_text
            )))
        }
    }
}
