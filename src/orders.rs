//! Order persistence and the order lifecycle transitions.
//!
//! `pending` is the only state an order leaves through a gateway event. Every
//! transition re-reads the order inside an `IMMEDIATE` transaction and only
//! applies when the order is still in the expected state, so duplicate or
//! concurrent deliveries of the same event settle an order exactly once.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{AppError, AppResult};
use crate::gateway::PaymentSession;
use crate::inventory;
use crate::model::{Order, Variant};
use crate::types::{CredentialSnapshot, DeliveredCredentials, OrderStatus};

const ORDER_ID_PREFIX: &str = "ORD";
const ORDER_ID_SUFFIX_LEN: usize = 6;

/// Result of trying to settle a paid order.
#[derive(Debug)]
pub enum Fulfillment {
    Delivered {
        order: Order,
        credentials: Vec<CredentialSnapshot>,
    },
    /// Marked paid but nothing could be allocated.
    NeedsManual(Order),
    /// The order was not in the expected state; nothing changed.
    Skipped(OrderStatus),
}

#[derive(Debug)]
pub enum Cancellation {
    Cancelled { order: Order, stock_released: bool },
    Skipped(OrderStatus),
}

/// `ORD-20261017-K3Z9QX`: prefix, UTC date, random uppercase suffix.
pub fn generate_order_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_ID_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!(
        "{}-{}-{}",
        ORDER_ID_PREFIX,
        Utc::now().format("%Y%m%d"),
        suffix
    )
}

pub fn find_order(conn: &mut SqliteConnection, order_id: &str) -> AppResult<Order> {
    use crate::schema::orders::dsl::*;

    orders
        .find(order_id)
        .select(Order::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))
}

pub fn list_orders(
    conn: &mut SqliteConnection,
    status_filter: Option<OrderStatus>,
) -> AppResult<Vec<Order>> {
    use crate::schema::orders::dsl::*;

    let mut query = orders
        .order(created_at.desc())
        .select(Order::as_select())
        .into_boxed();
    if let Some(wanted) = status_filter {
        query = query.filter(status.eq(wanted));
    }
    Ok(query.load(conn)?)
}

pub fn delete_order(conn: &mut SqliteConnection, order_id: &str) -> AppResult<()> {
    use crate::schema::orders::dsl::*;

    let deleted = diesel::delete(orders.find(order_id)).execute(conn)?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Order {}", order_id)));
    }
    tracing::info!(order_id = %order_id, "Order deleted");
    Ok(())
}

/// Reserve stock for `order` and persist it, both or neither.
pub fn place_order(conn: &mut SqliteConnection, order: &Order, variant: &Variant) -> AppResult<()> {
    use crate::schema::orders;

    conn.immediate_transaction::<_, AppError, _>(|conn| {
        inventory::reserve_stock(conn, variant, order.quantity)?;
        diesel::insert_into(orders::table)
            .values(order)
            .execute(conn)?;
        Ok(())
    })
}

pub fn attach_payment_session(
    conn: &mut SqliteConnection,
    order_id: &str,
    session: &PaymentSession,
) -> AppResult<Order> {
    use crate::schema::orders::dsl::*;

    diesel::update(orders.find(order_id))
        .set((
            payment_token.eq(&session.token),
            payment_url.eq(&session.redirect_url),
            updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    find_order(conn, order_id)
}

/// `pending → cancelled`, handing the reserved stock back to the variant.
pub fn cancel_order(
    conn: &mut SqliteConnection,
    order_id: &str,
    transaction_id: Option<&str>,
) -> AppResult<Cancellation> {
    use crate::schema::orders::dsl::*;

    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let order = find_order(conn, order_id)?;
        if order.status != OrderStatus::Pending {
            return Ok(Cancellation::Skipped(order.status));
        }

        let updated = diesel::update(
            orders
                .filter(id.eq(&order.id))
                .filter(status.eq(OrderStatus::Pending)),
        )
        .set((
            status.eq(OrderStatus::Cancelled),
            gateway_transaction_id.eq(transaction_id.or(order.gateway_transaction_id.as_deref())),
            updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

        if updated != 1 {
            return Err(AppError::InternalInconsistency(format!(
                "Order {} changed while being cancelled",
                order.id
            )));
        }

        let stock_released = inventory::release_stock(conn, &order.variant_id, order.quantity)?;
        if !stock_released {
            tracing::warn!(
                order_id = %order.id,
                variant = %order.variant.name,
                variant_id = %order.variant_id,
                "Reserved variant no longer exists, stock not released"
            );
        }

        Ok(Cancellation::Cancelled {
            order: find_order(conn, &order.id)?,
            stock_released,
        })
    })
}

/// Settle an order that is currently in `expected`: claim its credentials,
/// copy them onto the order and mark it paid. When the pool cannot cover the
/// order it is parked in `fulfillment_pending_manual` instead.
///
/// `paid_amount` is what the gateway reports as settled. It must equal the
/// order total, otherwise nothing changes and `InternalInconsistency` is
/// returned.
///
/// A pending order claims from the variant row its stock was reserved on. An
/// order retried from `fulfillment_pending_manual` is covered by stock added
/// afterwards, so that path looks the variant up by name and takes the
/// quantity off it here.
pub fn fulfill_order(
    conn: &mut SqliteConnection,
    order_id: &str,
    transaction_id: Option<&str>,
    expected: OrderStatus,
    paid_amount: Option<i64>,
) -> AppResult<Fulfillment> {
    use crate::schema::orders::dsl::*;

    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let order = find_order(conn, order_id)?;
        if order.status != expected {
            return Ok(Fulfillment::Skipped(order.status));
        }

        if let Some(amount) = paid_amount {
            if amount != order.total {
                return Err(AppError::InternalInconsistency(format!(
                    "Order {} total is {} but {} was paid",
                    order.id, order.total, amount
                )));
            }
        }

        let retrying = expected == OrderStatus::FulfillmentPendingManual;
        let source = if retrying {
            inventory::find_variant(conn, &order.product_id, &order.variant.name)
        } else {
            inventory::find_variant_by_id(conn, &order.variant_id)
        };
        let source = match source {
            Ok(found) => Some(found),
            Err(AppError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let claimed = match &source {
            Some(found) => {
                let claimed =
                    inventory::claim_credentials(conn, found, order.quantity, &order.id)?;
                if claimed.is_some() && retrying {
                    inventory::consume_stock(conn, found, order.quantity)?;
                }
                claimed
            }
            None => None,
        };

        let (next_status, delivered) = match &claimed {
            Some(credentials) => (
                OrderStatus::Paid,
                Some(DeliveredCredentials(credentials.clone())),
            ),
            None => (OrderStatus::FulfillmentPendingManual, None),
        };

        let updated = diesel::update(orders.filter(id.eq(&order.id)).filter(status.eq(expected)))
            .set((
                status.eq(next_status),
                delivered_credentials.eq(delivered),
                gateway_transaction_id
                    .eq(transaction_id.or(order.gateway_transaction_id.as_deref())),
                updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        if updated != 1 {
            return Err(AppError::InternalInconsistency(format!(
                "Order {} changed while being fulfilled",
                order.id
            )));
        }

        let order = find_order(conn, &order.id)?;
        Ok(match claimed {
            Some(credentials) => Fulfillment::Delivered { order, credentials },
            None => Fulfillment::NeedsManual(order),
        })
    })
}
