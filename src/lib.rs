pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod model;
pub mod notifier;
pub mod orders;
pub mod routes;
pub mod schema;
pub mod signature;
pub mod types;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post, put},
    Router,
};
use config::AppConfig;
use db::DbPool;
use gateway::{PaymentGateway, SnapGateway};
use notifier::{Notifier, WhatsAppNotifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use types::{
    AddStockRequest, AddVariantRequest, AdminOrderView, AdminUserView, ApiResponse,
    CreateAdminUserRequest, CreateOrderRequest, CreateReviewRequest, CredentialSnapshot,
    EmptyData, NewCredential, OrderStatus, OrderView, PaymentNotification, ProductRequest,
    ProductView, ReviewView, UpdateVariantPriceRequest, VariantSnapshot, VariantView,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Handles shared by every request. The pool is opened once at start-up and
/// closed when the last clone is dropped at shutdown.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<AppConfig>,
}

struct AdminSecurity;

impl Modify for AdminSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        routes::products::list_products,
        routes::products::get_product,
        routes::orders::create_order,
        routes::orders::get_order,
        routes::reviews::create_review,
        routes::payment_webhook::handle_payment_webhook,
        routes::inventory::create_product,
        routes::inventory::update_product,
        routes::inventory::delete_product,
        routes::inventory::add_variant,
        routes::inventory::update_variant_price,
        routes::inventory::add_stock,
        routes::inventory::delete_variant,
        routes::orders::list_orders,
        routes::orders::delete_order,
        routes::orders::fulfill_order,
        routes::reviews::approve_review,
        routes::admin_users::create_admin_user,
        routes::admin_users::list_admin_users,
        routes::admin_users::delete_admin_user
    ),
    components(
        schemas(
            ApiResponse<EmptyData>, EmptyData, CreateOrderRequest, OrderView, AdminOrderView,
            OrderStatus, VariantSnapshot, CredentialSnapshot, ProductView, VariantView,
            CreateReviewRequest, ReviewView, ProductRequest, AddVariantRequest, AddStockRequest,
            NewCredential, UpdateVariantPriceRequest, CreateAdminUserRequest, AdminUserView,
            PaymentNotification
        )
    ),
    modifiers(&AdminSecurity),
    tags(
        (name = "Storefront", description = "Catalogue, ordering and reviews"),
        (name = "Payments", description = "Payment gateway notifications"),
        (name = "Admin", description = "Inventory, order and staff management"),
        (name = "Health", description = "Health check endpoints")
    ),
    info(
        title = "Account Shop API",
        version = "1.0.0",
        description = "Storefront and admin API for selling account credentials in fixed variants"
    )
)]
struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    ),
    tag = "Health"
)]
async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({"status": "ok"})))
}

async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

pub fn app(app_state: AppState) -> Router {
    use routes::{admin_users, inventory, orders, payment_webhook, products, reviews};

    let admin = Router::new()
        .route("/products", post(inventory::create_product))
        .route(
            "/products/{id}",
            put(inventory::update_product).delete(inventory::delete_product),
        )
        .route("/products/{id}/variants", post(inventory::add_variant))
        .route(
            "/products/{id}/variants/{name}",
            patch(inventory::update_variant_price).delete(inventory::delete_variant),
        )
        .route(
            "/products/{id}/variants/{name}/stock",
            post(inventory::add_stock),
        )
        .route("/orders", get(orders::list_orders))
        .route("/orders/{order_id}", delete(orders::delete_order))
        .route("/orders/{order_id}/fulfill", post(orders::fulfill_order))
        .route("/reviews/{id}/approve", post(reviews::approve_review))
        .route(
            "/users",
            post(admin_users::create_admin_user).get(admin_users::list_admin_users),
        )
        .route("/users/{id}", delete(admin_users::delete_admin_user))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/products", get(products::list_products))
        .route("/products/{id}", get(products::get_product))
        .route("/orders", post(orders::create_order))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/reviews", post(reviews::create_review))
        .route(
            "/payments/webhook",
            post(payment_webhook::handle_payment_webhook),
        )
        .route("/api-doc/openapi.json", get(openapi_spec))
        .nest("/admin", admin)
        .with_state(app_state)
}

pub fn run() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Held for the lifetime of the process so buffered events are flushed on exit.
    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        tracing::error!("Server stopped with error: {}", e);
        std::process::exit(1);
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = db::create_pool(&config.database_url)?;
    db::run_migrations(&db)?;

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let app_state = AppState {
        db,
        gateway: Arc::new(SnapGateway::new(http_client.clone(), &config.gateway)),
        notifier: Arc::new(WhatsAppNotifier::new(http_client, &config.notifier)),
        config: Arc::new(config.clone()),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app(app_state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
