pub mod admin_users;
pub mod inventory;
pub mod orders;
pub mod payment_webhook;
pub mod products;
pub mod reviews;
