use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::gateway::PaymentRequest;
use crate::inventory;
use crate::model::Order;
use crate::notifier::{self, notify_best_effort};
use crate::orders::{self, Cancellation, Fulfillment};
use crate::types::{
    AdminOrderView, ApiResponse, CreateOrderRequest, EmptyData, OrderListQuery, OrderStatus,
    OrderView,
};
use crate::AppState;

fn validate_order_request(payload: &CreateOrderRequest) -> AppResult<i32> {
    if payload.customer_name.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "Customer name is required".to_string(),
        ));
    }
    let phone_digits = payload.phone.chars().filter(|c| c.is_ascii_digit()).count();
    if phone_digits < 8 {
        return Err(AppError::ValidationFailed(
            "Phone number is invalid".to_string(),
        ));
    }
    if let Some(email) = payload.email.as_deref() {
        if !email.trim().is_empty() && !email.contains('@') {
            return Err(AppError::ValidationFailed(
                "Email address is invalid".to_string(),
            ));
        }
    }
    if payload.product_id.trim().is_empty() || payload.variant_name.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "Product and variant are required".to_string(),
        ));
    }

    let quantity = payload.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::ValidationFailed(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(quantity)
}

/// Look up the variant, reserve stock, open a payment session and tell the
/// customer where to pay.
async fn process_order(app_state: &AppState, payload: CreateOrderRequest) -> AppResult<Order> {
    let quantity = validate_order_request(&payload)?;

    let order = {
        let mut conn = app_state.db.get()?;
        let product = inventory::find_product(&mut conn, payload.product_id.trim())?;
        let variant = inventory::find_variant(&mut conn, &product.id, payload.variant_name.trim())?;

        if variant.quantity < quantity {
            return Err(AppError::InsufficientStock {
                variant: variant.name,
                requested: quantity,
                available: variant.quantity,
            });
        }

        let order = Order::new_pending(
            orders::generate_order_id(),
            payload.customer_name.trim().to_string(),
            payload.phone.trim().to_string(),
            payload
                .email
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
            &variant,
            quantity,
        )?;
        orders::place_order(&mut conn, &order, &variant)?;
        order
    };

    tracing::info!(
        order_id = %order.id,
        variant = %order.variant.name,
        quantity = order.quantity,
        "Order placed, opening payment session"
    );

    let payment_request = PaymentRequest {
        order_id: order.id.clone(),
        amount: order.total,
        customer_first_name: order
            .customer_name
            .split_whitespace()
            .next()
            .unwrap_or(&order.customer_name)
            .to_string(),
        customer_phone: order.phone.clone(),
    };

    let session = match app_state.gateway.create_session(&payment_request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(order_id = %order.id, error = %e, "Payment session failed");
            let mut conn = app_state.db.get()?;
            if let Err(release_err) = orders::cancel_order(&mut conn, &order.id, None) {
                tracing::error!(
                    order_id = %order.id,
                    error = %release_err,
                    "Failed to cancel order after payment session failure"
                );
            }
            return Err(e);
        }
    };

    let order = {
        let mut conn = app_state.db.get()?;
        orders::attach_payment_session(&mut conn, &order.id, &session)?
    };

    notify_best_effort(
        app_state.notifier.as_ref(),
        &app_state.config.notifier.country_code,
        &order.phone,
        &notifier::order_created_message(&app_state.config.store_name, &order),
    )
    .await;

    Ok(order)
}

#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created, payment URL attached", body = ApiResponse<OrderView>),
        (status = 400, description = "Invalid request", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown product or variant", body = ApiResponse<EmptyData>),
        (status = 409, description = "Not enough stock", body = ApiResponse<EmptyData>),
        (status = 502, description = "Payment gateway unavailable", body = ApiResponse<EmptyData>)
    ),
    tag = "Storefront"
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderView>>)> {
    let order = process_order(&app_state, payload).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(order.view()))))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(("order_id" = String, Path, description = "Internal order identifier")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderView>),
        (status = 404, description = "Unknown order", body = ApiResponse<EmptyData>)
    ),
    tag = "Storefront"
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderView>>> {
    let mut conn = app_state.db.get()?;
    let order = orders::find_order(&mut conn, &order_id)?;

    Ok(Json(ApiResponse::ok(order.view())))
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    params(("status" = Option<String>, Query, description = "Only orders in this status")),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<AdminOrderView>>),
        (status = 401, description = "Missing or invalid admin token", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<Vec<AdminOrderView>>>> {
    let status_filter = query
        .status
        .as_deref()
        .map(|raw| {
            OrderStatus::parse(raw)
                .ok_or_else(|| AppError::ValidationFailed(format!("Unknown status {}", raw)))
        })
        .transpose()?;

    let mut conn = app_state.db.get()?;
    let all_orders = orders::list_orders(&mut conn, status_filter)?
        .iter()
        .map(Order::admin_view)
        .collect();

    Ok(Json(ApiResponse::ok(all_orders)))
}

#[utoipa::path(
    delete,
    path = "/admin/orders/{order_id}",
    params(("order_id" = String, Path, description = "Internal order identifier")),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<EmptyData>),
        (status = 404, description = "Unknown order", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_order(
    State(app_state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = app_state.db.get()?;
    orders::delete_order(&mut conn, &order_id)?;

    Ok(Json(ApiResponse::ok_with_msg(format!(
        "Order {} deleted",
        order_id
    ))))
}

/// Retry credential allocation for an order stuck in
/// `fulfillment_pending_manual`, typically after stock was added.
#[utoipa::path(
    post,
    path = "/admin/orders/{order_id}/fulfill",
    params(("order_id" = String, Path, description = "Internal order identifier")),
    responses(
        (status = 200, description = "Credentials allocated and sent", body = ApiResponse<AdminOrderView>),
        (status = 404, description = "Unknown order", body = ApiResponse<EmptyData>),
        (status = 409, description = "Order not awaiting manual fulfillment, or still not enough stock", body = ApiResponse<EmptyData>)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn fulfill_order(
    State(app_state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<AdminOrderView>>> {
    let fulfillment = {
        let mut conn = app_state.db.get()?;
        orders::fulfill_order(
            &mut conn,
            &order_id,
            None,
            OrderStatus::FulfillmentPendingManual,
            None,
        )?
    };

    match fulfillment {
        Fulfillment::Delivered { order, credentials } => {
            tracing::info!(order_id = %order.id, "Order fulfilled manually");
            notify_best_effort(
                app_state.notifier.as_ref(),
                &app_state.config.notifier.country_code,
                &order.phone,
                &notifier::credentials_delivered_message(
                    &app_state.config.store_name,
                    &order,
                    &credentials,
                ),
            )
            .await;
            Ok(Json(ApiResponse::ok(order.admin_view())))
        }
        Fulfillment::NeedsManual(order) => Err(AppError::Conflict(format!(
            "Variant {} still has fewer than {} unsold credentials",
            order.variant.name, order.quantity
        ))),
        Fulfillment::Skipped(status) => Err(AppError::Conflict(format!(
            "Order is {}, not awaiting manual fulfillment",
            status.as_str()
        ))),
    }
}

/// Outcome of a cancellation, for log lines.
pub(crate) fn describe_cancellation(cancellation: &Cancellation) -> String {
    match cancellation {
        Cancellation::Cancelled {
            order,
            stock_released,
        } => format!(
            "order {} cancelled, stock released: {}",
            order.id, stock_released
        ),
        Cancellation::Skipped(status) => {
            format!("order already {}, nothing to cancel", status.as_str())
        }
    }
}
