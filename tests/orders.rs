mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::StatusCode;
use common::{order_body, TestApp};
use serde_json::json;

const THREE_ACCOUNTS: &[(&str, &str)] = &[
    ("first@mail.test", "pw-1"),
    ("second@mail.test", "pw-2"),
    ("third@mail.test", "pw-3"),
];

#[tokio::test]
async fn order_reserves_stock_and_returns_checkout_url() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let (status, body) = app.post("/orders", order_body(&product_id, "1 Month", 1)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let order = &body["data"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], 50000);
    assert_eq!(order["variant"]["name"], "1 Month");
    assert_eq!(order["variant"]["price"], 50000);
    let order_id = order["order_id"].as_str().unwrap();
    assert!(order_id.starts_with("ORD-"));
    assert_eq!(
        order["payment_url"],
        format!("https://pay.test/{}", order_id)
    );

    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 2);
    assert_eq!(app.sold_count(&product_id, "1 Month"), 0);

    let requests = app.gateway.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 50000);
    assert_eq!(requests[0].customer_first_name, "Budi");
}

#[tokio::test]
async fn order_sends_payment_link_to_normalized_phone() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let order_id = app.place_order(&product_id, "1 Month", 1).await;

    let messages = app.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "6281234567890");
    assert!(messages[0].1.contains(&order_id));
    assert!(messages[0].1.contains("https://pay.test/"));
}

#[tokio::test]
async fn order_larger_than_stock_is_rejected() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant(
        "1 Month",
        50000,
        &[("first@mail.test", "pw-1"), ("second@mail.test", "pw-2")],
    );

    let (status, body) = app.post("/orders", order_body(&product_id, "1 Month", 5)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "insufficient_stock");
    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 2);
    assert_eq!(app.gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stock_runs_out_across_orders() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant(
        "1 Month",
        50000,
        &[("first@mail.test", "pw-1"), ("second@mail.test", "pw-2")],
    );

    app.place_order(&product_id, "1 Month", 2).await;
    let (status, body) = app.post("/orders", order_body(&product_id, "1 Month", 1)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "insufficient_stock");
    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    let app = Arc::new(TestApp::spawn());
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let attempts: Vec<_> = (0..12)
        .map(|_| {
            let app = app.clone();
            let product_id = product_id.clone();
            tokio::spawn(async move {
                app.post("/orders", order_body(&product_id, "1 Month", 1))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        let (status, body) = attempt.await.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::CONFLICT, "unexpected response: {}", body);
            assert_eq!(body["kind"], "insufficient_stock");
        }
    }

    assert_eq!(created, 3);
    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 0);
    assert_eq!(app.gateway.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn order_total_overflow_is_rejected() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant(
        "Lifetime",
        i64::MAX / 2 + 1,
        &[("first@mail.test", "pw-1"), ("second@mail.test", "pw-2")],
    );

    let (status, body) = app.post("/orders", order_body(&product_id, "Lifetime", 2)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_failed");
    assert_eq!(app.variant_quantity(&product_id, "Lifetime"), 2);
    assert_eq!(app.gateway.calls.load(Ordering::SeqCst), 0);

    // A single unit still fits.
    let (status, body) = app.post("/orders", order_body(&product_id, "Lifetime", 1)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["total"], i64::MAX / 2 + 1);
}

#[tokio::test]
async fn gateway_failure_cancels_order_and_releases_stock() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);
    app.gateway.fail.store(true, Ordering::SeqCst);

    let (status, body) = app.post("/orders", order_body(&product_id, "1 Month", 2)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream_failure");
    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 3);
    assert!(app.notifier.messages().is_empty());

    let mut conn = app.conn();
    let all_orders = account_shop::orders::list_orders(&mut conn, None).unwrap();
    assert_eq!(all_orders.len(), 1);
    assert_eq!(
        all_orders[0].status,
        account_shop::types::OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn notification_failure_does_not_fail_order() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);
    app.notifier.fail.store(true, Ordering::SeqCst);

    let (status, body) = app.post("/orders", order_body(&product_id, "1 Month", 1)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(app.notifier.messages().len(), 1);
}

#[tokio::test]
async fn unknown_product_or_variant_is_not_found() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let (status, body) = app.post("/orders", order_body("no-such-product", "1 Month", 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = app.post("/orders", order_body(&product_id, "12 Months", 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_order_requests_are_rejected() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let cases = [
        json!({"customer_name": " ", "phone": "081234567890", "product_id": product_id, "variant_name": "1 Month"}),
        json!({"customer_name": "Budi", "phone": "0812", "product_id": product_id, "variant_name": "1 Month"}),
        json!({"customer_name": "Budi", "phone": "081234567890", "email": "not-an-email", "product_id": product_id, "variant_name": "1 Month"}),
        json!({"customer_name": "Budi", "phone": "081234567890", "product_id": product_id, "variant_name": "1 Month", "quantity": 0}),
        json!({"customer_name": "Budi", "phone": "081234567890", "product_id": product_id, "variant_name": ""}),
    ];

    for case in cases {
        let (status, body) = app.post("/orders", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", case);
        assert_eq!(body["kind"], "validation_failed");
    }
    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 3);
}

#[tokio::test]
async fn quantity_defaults_to_one() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let (status, body) = app
        .post(
            "/orders",
            json!({
                "customer_name": "Budi",
                "phone": "081234567890",
                "product_id": product_id,
                "variant_name": "1 Month",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["quantity"], 1);
    assert_eq!(app.variant_quantity(&product_id, "1 Month"), 2);
}

#[tokio::test]
async fn get_order_returns_public_view() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);
    let order_id = app.place_order(&product_id, "1 Month", 1).await;

    let (status, body) = app.get(&format!("/orders/{}", order_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_id"], order_id.as_str());
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"].get("phone").is_none());
    assert!(body["data"].get("credentials").is_none());

    let (status, body) = app.get("/orders/ORD-19700101-NOPE00").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Order ORD-19700101-NOPE00 not found");
}

#[tokio::test]
async fn catalogue_lists_products_with_variants() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, THREE_ACCOUNTS);

    let (status, body) = app.get("/products").await;
    assert_eq!(status, StatusCode::OK);
    let products = body["data"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"], product_id.as_str());
    assert_eq!(products[0]["variants"][0]["name"], "1 Month");
    assert_eq!(products[0]["variants"][0]["quantity"], 3);

    let (status, body) = app.get(&format!("/products/{}", product_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["variants"][0]["price"], 50000);

    let (status, _) = app.get("/products/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/api-doc/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/orders").is_some());
    assert!(body["paths"].get("/payments/webhook").is_some());
}
