#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use account_shop::auth::AdminClaims;
use account_shop::config::{AppConfig, GatewayConfig, NotifierConfig};
use account_shop::db::{self, DbConnection};
use account_shop::error::{AppError, AppResult};
use account_shop::gateway::{PaymentGateway, PaymentRequest, PaymentSession};
use account_shop::inventory;
use account_shop::notifier::Notifier;
use account_shop::signature::notification_signature;
use account_shop::types::{AddVariantRequest, NewCredential, ProductRequest};
use account_shop::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

pub const SERVER_KEY: &str = "test-server-key";
pub const JWT_SECRET: &str = "test-admin-secret";

/// Hands out predictable sessions, or fails every call once `fail` is set.
#[derive(Default)]
pub struct MockGateway {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<PaymentRequest>>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &PaymentRequest) -> AppResult<PaymentSession> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::PaymentGateway("gateway unavailable".to_string()));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(PaymentSession {
            token: format!("tok-{}", request.order_id),
            redirect_url: format!("https://pay.test/{}", request.order_id),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone: &str, message: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notification("messaging down".to_string()));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    _db_dir: TempDir,
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        port: 0,
        gateway: GatewayConfig {
            base_url: "http://gateway.invalid".to_string(),
            server_key: SERVER_KEY.to_string(),
        },
        notifier: NotifierConfig {
            base_url: "http://notifier.invalid".to_string(),
            token: "notifier-token".to_string(),
            country_code: "62".to_string(),
        },
        admin_jwt_secret: JWT_SECRET.to_string(),
        http_timeout: Duration::from_secs(5),
        store_name: "Test Shop".to_string(),
        sentry_dsn: None,
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        let db_dir = tempfile::tempdir().unwrap();
        let database_url = db_dir.path().join("shop.db").to_str().unwrap().to_string();

        let pool = db::create_pool(&database_url).unwrap();
        db::run_migrations(&pool).unwrap();

        let gateway = Arc::new(MockGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState {
            db: pool,
            gateway: gateway.clone(),
            notifier: notifier.clone(),
            config: Arc::new(test_config(&database_url)),
        };

        Self {
            router: account_shop::app(state.clone()),
            state,
            gateway,
            notifier,
            _db_dir: db_dir,
        }
    }

    pub fn conn(&self) -> DbConnection {
        self.state.db.get().unwrap()
    }

    /// Creates a product with one variant whose pool holds `credentials`.
    /// Returns the product id.
    pub fn seed_variant(
        &self,
        variant_name: &str,
        price: i64,
        credentials: &[(&str, &str)],
    ) -> String {
        let mut conn = self.conn();
        let product = inventory::create_product(
            &mut conn,
            ProductRequest {
                name: "Streaming Premium".to_string(),
                category: "streaming".to_string(),
                image: None,
                description: Some("Shared premium account".to_string()),
            },
        )
        .unwrap();

        inventory::add_variant(
            &mut conn,
            &product.id,
            AddVariantRequest {
                name: variant_name.to_string(),
                price,
                quantity: None,
                credentials: new_credentials(credentials),
            },
        )
        .unwrap();

        product.id
    }

    pub fn variant_quantity(&self, product_id: &str, variant_name: &str) -> i32 {
        let mut conn = self.conn();
        inventory::find_variant(&mut conn, product_id, variant_name)
            .unwrap()
            .quantity
    }

    pub fn sold_count(&self, product_id: &str, variant_name: &str) -> i64 {
        let mut conn = self.conn();
        let variant = inventory::find_variant(&mut conn, product_id, variant_name).unwrap();
        inventory::count_sold(&mut conn, &variant).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body), None).await
    }

    pub async fn admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let token = admin_token(JWT_SECRET);
        self.send(method, uri, body, Some(&token)).await
    }

    /// Places an order through the API and returns its id.
    pub async fn place_order(&self, product_id: &str, variant_name: &str, quantity: i32) -> String {
        let (status, body) = self
            .post("/orders", order_body(product_id, variant_name, quantity))
            .await;
        assert_eq!(status, StatusCode::CREATED, "order rejected: {}", body);
        body["data"]["order_id"].as_str().unwrap().to_string()
    }

    pub async fn deliver_webhook(
        &self,
        order_id: &str,
        status: &str,
        gross_amount: &str,
    ) -> StatusCode {
        let (status, _) = self
            .post(
                "/payments/webhook",
                signed_notification(order_id, status, gross_amount, SERVER_KEY),
            )
            .await;
        status
    }
}

pub fn new_credentials(credentials: &[(&str, &str)]) -> Vec<NewCredential> {
    credentials
        .iter()
        .map(|(username, password)| NewCredential {
            username: username.to_string(),
            password: password.to_string(),
        })
        .collect()
}

pub fn order_body(product_id: &str, variant_name: &str, quantity: i32) -> Value {
    json!({
        "customer_name": "Budi Santoso",
        "phone": "0812-3456-7890",
        "email": "budi@mail.test",
        "product_id": product_id,
        "variant_name": variant_name,
        "quantity": quantity,
    })
}

pub fn signed_notification(order_id: &str, status: &str, gross_amount: &str, key: &str) -> Value {
    let status_code = if status == "pending" { "201" } else { "200" };
    json!({
        "order_id": order_id,
        "transaction_id": format!("trx-{}", order_id),
        "transaction_status": status,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "signature_key": notification_signature(order_id, status_code, gross_amount, key),
        "fraud_status": "accept",
    })
}

pub fn admin_token(secret: &str) -> String {
    let claims = AdminClaims {
        sub: "owner@shop.test".to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
