use crate::error::{AppError, AppResult};
use crate::types::{
    AdminOrderView, AdminUserView, DeliveredCredentials, OrderStatus, OrderView, ReviewView,
    VariantSnapshot, VariantView,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Product {
    pub fn new(
        name: String,
        category: String,
        image: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            category,
            image,
            description,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(Product))]
#[diesel(table_name = crate::schema::variants)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub price: i64,
    /// Unreserved stock: unsold credentials minus those held by pending orders.
    pub quantity: i32,
    pub position: i32,
}

impl Variant {
    pub fn new(product_id: String, name: String, price: i64, quantity: i32, position: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            product_id,
            name,
            price,
            quantity,
            position,
        }
    }

    pub fn snapshot(&self) -> VariantSnapshot {
        VariantSnapshot {
            name: self.name.clone(),
            price: self.price,
        }
    }

    pub fn view(&self) -> VariantView {
        VariantView {
            name: self.name.clone(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::credentials)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Credential {
    pub id: i32,
    pub variant_id: String,
    pub username: String,
    pub password: String,
    pub sold: bool,
    pub order_id: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::credentials)]
pub struct NewCredentialRow<'a> {
    pub variant_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub sold: bool,
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Order {
    pub id: String,
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub product_id: String,
    /// The variant row the stock was reserved from.
    pub variant_id: String,
    pub variant: VariantSnapshot,
    pub quantity: i32,
    pub total: i64,
    pub status: OrderStatus,
    pub delivered_credentials: Option<DeliveredCredentials>,
    pub payment_token: Option<String>,
    pub payment_url: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Order {
    /// Fails when `price * quantity` does not fit the total column.
    pub fn new_pending(
        id: String,
        customer_name: String,
        phone: String,
        email: Option<String>,
        variant: &Variant,
        quantity: i32,
    ) -> AppResult<Self> {
        let total = variant
            .price
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| {
                AppError::ValidationFailed(format!(
                    "Order total for {} x {} is too large",
                    quantity, variant.name
                ))
            })?;

        let now = chrono::Utc::now().naive_utc();
        Ok(Self {
            id,
            customer_name,
            phone,
            email,
            product_id: variant.product_id.clone(),
            variant_id: variant.id.clone(),
            variant: variant.snapshot(),
            quantity,
            total,
            status: OrderStatus::Pending,
            delivered_credentials: None,
            payment_token: None,
            payment_url: None,
            gateway_transaction_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn view(&self) -> OrderView {
        OrderView {
            order_id: self.id.clone(),
            customer_name: self.customer_name.clone(),
            product_id: self.product_id.clone(),
            variant: self.variant.clone(),
            quantity: self.quantity,
            total: self.total,
            status: self.status,
            payment_url: self.payment_url.clone(),
            created_at: self.created_at,
        }
    }

    pub fn admin_view(&self) -> AdminOrderView {
        AdminOrderView {
            order: self.view(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            gateway_transaction_id: self.gateway_transaction_id.clone(),
            credentials: self
                .delivered_credentials
                .clone()
                .map(|delivered| delivered.0)
                .unwrap_or_default(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Review {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub variant_name: String,
    pub rating: i32,
    pub body: String,
    pub approved: bool,
    pub created_at: NaiveDateTime,
}

impl Review {
    pub fn for_order(order: &Order, rating: i32, body: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_id: order.product_id.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.email.clone(),
            variant_name: order.variant.name.clone(),
            rating,
            body,
            approved: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn view(&self) -> ReviewView {
        ReviewView {
            id: self.id.clone(),
            order_id: self.order_id.clone(),
            product_id: self.product_id.clone(),
            customer_name: self.customer_name.clone(),
            variant_name: self.variant_name.clone(),
            rating: self.rating,
            review: self.body.clone(),
            approved: self.approved,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::admin_users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AdminUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

impl AdminUser {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn view(&self) -> AdminUserView {
        AdminUserView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}
