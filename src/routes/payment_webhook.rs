use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::error::{AppError, AppResult};
use crate::notifier::{self, notify_best_effort};
use crate::orders::{self, Fulfillment};
use crate::routes::orders::describe_cancellation;
use crate::signature::verify_notification;
use crate::types::{OrderStatus, PaymentNotification, PaymentOutcome};
use crate::AppState;

/// Whole currency units from the gateway's decimal amount, `"50000.00"` or `"50000"`.
fn parse_gross_amount(raw: &str) -> Option<i64> {
    let (units, fraction) = raw.trim().split_once('.').unwrap_or((raw.trim(), ""));
    if !fraction.chars().all(|c| c == '0') {
        return None;
    }
    units.parse().ok()
}

/// Payment status callback from the gateway.
///
/// A forged or unreadable body is refused. Anything that goes wrong after the
/// signature checks out is logged and still answered with 200, so the gateway
/// does not keep redelivering.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = PaymentNotification,
    responses(
        (status = 200, description = "Notification received"),
        (status = 400, description = "Body is not a payment notification"),
        (status = 401, description = "Signature does not match")
    ),
    tag = "Payments"
)]
pub async fn handle_payment_webhook(
    State(app_state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    let notification: PaymentNotification = match serde_json::from_str(&body) {
        Ok(notification) => notification,
        Err(e) => {
            tracing::warn!("Failed to parse payment notification: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid notification format");
        }
    };

    tracing::info!(
        order_id = %notification.order_id,
        transaction_status = %notification.transaction_status,
        "Received payment notification"
    );

    if !verify_notification(&notification, &app_state.config.gateway.server_key) {
        tracing::warn!(
            order_id = %notification.order_id,
            "Payment notification signature mismatch"
        );
        return (StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    if let Err(e) = process_notification(&notification, &app_state).await {
        tracing::error!(
            order_id = %notification.order_id,
            error = %e,
            "Failed to process payment notification"
        );
    }

    (StatusCode::OK, "OK")
}

async fn process_notification(
    notification: &PaymentNotification,
    app_state: &AppState,
) -> AppResult<()> {
    let transaction_id = notification.transaction_id.as_deref();

    match notification.outcome() {
        PaymentOutcome::Settled => {
            let paid_amount = parse_gross_amount(&notification.gross_amount).ok_or_else(|| {
                AppError::InternalInconsistency(format!(
                    "Unreadable gross amount {}",
                    notification.gross_amount
                ))
            })?;

            let fulfillment = {
                let mut conn = app_state.db.get()?;
                orders::fulfill_order(
                    &mut conn,
                    &notification.order_id,
                    transaction_id,
                    OrderStatus::Pending,
                    Some(paid_amount),
                )?
            };

            handle_fulfillment(fulfillment, app_state).await;
        }
        PaymentOutcome::Pending => {
            let mut conn = app_state.db.get()?;
            let order = orders::find_order(&mut conn, &notification.order_id)?;
            tracing::info!(
                order_id = %order.id,
                status = order.status.as_str(),
                "Payment still pending"
            );
        }
        PaymentOutcome::Failed => {
            let mut conn = app_state.db.get()?;
            let cancellation =
                orders::cancel_order(&mut conn, &notification.order_id, transaction_id)?;
            tracing::info!(
                transaction_status = %notification.transaction_status,
                "{}",
                describe_cancellation(&cancellation)
            );
        }
    }

    Ok(())
}

async fn handle_fulfillment(fulfillment: Fulfillment, app_state: &AppState) {
    let country_code = &app_state.config.notifier.country_code;
    let store_name = &app_state.config.store_name;

    match fulfillment {
        Fulfillment::Delivered { order, credentials } => {
            tracing::info!(
                order_id = %order.id,
                allocated = credentials.len(),
                "Order paid, credentials allocated"
            );
            notify_best_effort(
                app_state.notifier.as_ref(),
                country_code,
                &order.phone,
                &notifier::credentials_delivered_message(store_name, &order, &credentials),
            )
            .await;
        }
        Fulfillment::NeedsManual(order) => {
            tracing::warn!(
                order_id = %order.id,
                variant = %order.variant.name,
                quantity = order.quantity,
                "Order paid but no unsold credentials left, needs manual fulfillment"
            );
            notify_best_effort(
                app_state.notifier.as_ref(),
                country_code,
                &order.phone,
                &notifier::fulfillment_delayed_message(store_name, &order),
            )
            .await;
        }
        Fulfillment::Skipped(status) => {
            tracing::info!(
                status = status.as_str(),
                "Order already settled, ignoring duplicate notification"
            );
        }
    }
}
