use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, AsExpression, FromSqlRow, ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    /// Paid, but no credential could be allocated. Needs an admin to fulfill it.
    FulfillmentPendingManual,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::FulfillmentPendingManual => "fulfillment_pending_manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "cancelled" => Some(OrderStatus::Cancelled),
            "fulfillment_pending_manual" => Some(OrderStatus::FulfillmentPendingManual),
            _ => None,
        }
    }
}

impl ToSql<Text, Sqlite> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for OrderStatus {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let status_str = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        OrderStatus::parse(&status_str).ok_or_else(|| "Invalid order status".into())
    }
}

/// Variant name and price as they were when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, AsExpression, FromSqlRow, ToSchema)]
#[diesel(sql_type = Text)]
pub struct VariantSnapshot {
    pub name: String,
    pub price: i64,
}

impl ToSql<Text, Sqlite> for VariantSnapshot {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(serde_json::to_string(self)?);
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for VariantSnapshot {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct CredentialSnapshot {
    pub username: String,
    pub password: String,
}

/// Credentials copied onto an order at fulfillment time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, AsExpression, FromSqlRow, ToSchema)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct DeliveredCredentials(pub Vec<CredentialSnapshot>);

impl ToSql<Text, Sqlite> for DeliveredCredentials {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(serde_json::to_string(self)?);
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for DeliveredCredentials {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine-readable error kind, only set on failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            kind: None,
            data: Some(data),
        }
    }

    pub fn ok_with_msg(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            kind: None,
            data: None,
        }
    }

    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            kind: Some(kind.to_string()),
            data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmptyData {}

// Storefront

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub product_id: String,
    pub variant_name: String,
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct OrderView {
    pub order_id: String,
    pub customer_name: String,
    pub product_id: String,
    pub variant: VariantSnapshot,
    pub quantity: i32,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_url: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub order: OrderView,
    pub phone: String,
    pub email: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub credentials: Vec<CredentialSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct VariantView {
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub variants: Vec<VariantView>,
}

/// Every field is optional so that a missing one is reported as a validation
/// failure instead of a JSON rejection.
#[derive(Debug, Deserialize, Serialize, Clone, Default, ToSchema)]
pub struct CreateReviewRequest {
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub rating: Option<i32>,
    pub review: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct ReviewView {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub customer_name: String,
    pub variant_name: String,
    pub rating: i32,
    pub review: String,
    pub approved: bool,
}

// Admin

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct ProductRequest {
    pub name: String,
    pub category: String,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct NewCredential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct AddVariantRequest {
    pub name: String,
    pub price: i64,
    pub quantity: Option<i32>,
    #[serde(default)]
    pub credentials: Vec<NewCredential>,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct AddStockRequest {
    pub amount: Option<i32>,
    pub credentials: Vec<NewCredential>,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct UpdateVariantPriceRequest {
    pub price: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct CreateAdminUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct AdminUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

// Payment gateway notifications

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub transaction_status: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub fraud_status: Option<String>,
}

/// What a gateway transaction status means for the order it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Settled,
    Pending,
    Failed,
}

pub mod transaction_status {
    pub const SETTLEMENT: &str = "settlement";
    pub const SUCCESS: &str = "success";
    pub const CAPTURE: &str = "capture";
    pub const PENDING: &str = "pending";
}

pub mod fraud_status {
    pub const CHALLENGE: &str = "challenge";
}

impl PaymentNotification {
    pub fn outcome(&self) -> PaymentOutcome {
        match self.transaction_status.as_str() {
            transaction_status::SETTLEMENT | transaction_status::SUCCESS => PaymentOutcome::Settled,
            transaction_status::CAPTURE
                if self.fraud_status.as_deref() == Some(fraud_status::CHALLENGE) =>
            {
                PaymentOutcome::Pending
            }
            transaction_status::CAPTURE => PaymentOutcome::Settled,
            transaction_status::PENDING => PaymentOutcome::Pending,
            _ => PaymentOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(status: &str, fraud: Option<&str>) -> PaymentNotification {
        PaymentNotification {
            order_id: "ORD-1".to_string(),
            transaction_id: None,
            transaction_status: status.to_string(),
            status_code: "200".to_string(),
            gross_amount: "50000.00".to_string(),
            signature_key: String::new(),
            fraud_status: fraud.map(str::to_string),
        }
    }

    #[test]
    fn maps_gateway_statuses_to_outcomes() {
        assert_eq!(notification("settlement", None).outcome(), PaymentOutcome::Settled);
        assert_eq!(notification("success", None).outcome(), PaymentOutcome::Settled);
        assert_eq!(notification("capture", Some("accept")).outcome(), PaymentOutcome::Settled);
        assert_eq!(notification("capture", Some("challenge")).outcome(), PaymentOutcome::Pending);
        assert_eq!(notification("pending", None).outcome(), PaymentOutcome::Pending);
        assert_eq!(notification("expire", None).outcome(), PaymentOutcome::Failed);
        assert_eq!(notification("deny", None).outcome(), PaymentOutcome::Failed);
        assert_eq!(notification("", None).outcome(), PaymentOutcome::Failed);
    }

    #[test]
    fn order_status_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::FulfillmentPendingManual,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("completed"), None);
    }
}
