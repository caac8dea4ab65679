mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};

const GOOD_REVIEW: &str = "Account works perfectly, fast delivery.";

/// Product with a paid single-credential order. Returns `(product_id, order_id)`.
async fn paid_order(app: &TestApp) -> (String, String) {
    let product_id = app.seed_variant(
        "1 Month",
        50000,
        &[("first@mail.test", "pw-1"), ("second@mail.test", "pw-2")],
    );
    let order_id = app.place_order(&product_id, "1 Month", 1).await;
    assert_eq!(
        app.deliver_webhook(&order_id, "settlement", "50000.00").await,
        StatusCode::OK
    );
    (product_id, order_id)
}

fn review(order_id: &str, product_id: &str, rating: i32, text: &str) -> Value {
    json!({
        "order_id": order_id,
        "product_id": product_id,
        "rating": rating,
        "review": text,
    })
}

#[tokio::test]
async fn paid_order_can_be_reviewed_once() {
    let app = TestApp::spawn();
    let (product_id, order_id) = paid_order(&app).await;

    let (status, body) = app
        .post("/reviews", review(&order_id, &product_id, 5, GOOD_REVIEW))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order_id"], order_id.as_str());
    assert_eq!(body["data"]["customer_name"], "Budi Santoso");
    assert_eq!(body["data"]["variant_name"], "1 Month");
    assert_eq!(body["data"]["rating"], 5);
    assert_eq!(body["data"]["approved"], false);

    let (status, body) = app
        .post("/reviews", review(&order_id, &product_id, 4, GOOD_REVIEW))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Order has already been reviewed");
}

#[tokio::test]
async fn pending_order_cannot_be_reviewed() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, &[("first@mail.test", "pw-1")]);
    let order_id = app.place_order(&product_id, "1 Month", 1).await;

    let (status, body) = app
        .post("/reviews", review(&order_id, &product_id, 5, GOOD_REVIEW))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "order_not_paid");
    assert_eq!(body["message"], "Order is not paid");
}

#[tokio::test]
async fn unknown_order_cannot_be_reviewed() {
    let app = TestApp::spawn();
    let product_id = app.seed_variant("1 Month", 50000, &[("first@mail.test", "pw-1")]);

    let (status, body) = app
        .post(
            "/reviews",
            review("ORD-19700101-NOPE00", &product_id, 5, GOOD_REVIEW),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn review_for_other_product_is_rejected() {
    let app = TestApp::spawn();
    let (_, order_id) = paid_order(&app).await;
    let other_product = app.seed_variant("1 Year", 300000, &[("x@mail.test", "pw-x")]);

    let (status, body) = app
        .post("/reviews", review(&order_id, &other_product, 5, GOOD_REVIEW))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_failed");
}

#[tokio::test]
async fn review_fields_are_validated_before_the_order() {
    let app = TestApp::spawn();
    let (product_id, order_id) = paid_order(&app).await;
    let too_long = "x".repeat(501);

    let cases = [
        json!({"product_id": product_id, "rating": 5, "review": GOOD_REVIEW}),
        json!({"order_id": order_id, "product_id": product_id, "review": GOOD_REVIEW}),
        review(&order_id, &product_id, 0, GOOD_REVIEW),
        review(&order_id, &product_id, 6, GOOD_REVIEW),
        review(&order_id, &product_id, 5, "too short"),
        review(&order_id, &product_id, 5, &too_long),
        // Invalid rating wins over the unknown order.
        review("ORD-19700101-NOPE00", &product_id, 9, GOOD_REVIEW),
    ];

    for case in cases {
        let (status, body) = app.post("/reviews", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", case);
        assert_eq!(body["kind"], "validation_failed");
    }

    // Limits are inclusive.
    let (status, _) = app
        .post("/reviews", review(&order_id, &product_id, 1, &"y".repeat(10)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn admin_approves_review() {
    let app = TestApp::spawn();
    let (product_id, order_id) = paid_order(&app).await;
    let (_, body) = app
        .post("/reviews", review(&order_id, &product_id, 5, GOOD_REVIEW))
        .await;
    let review_id = body["data"]["id"].as_str().unwrap().to_string();

    let approve_uri = format!("/admin/reviews/{}/approve", review_id);
    let (status, _) = app.post(&approve_uri, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.admin(Method::POST, &approve_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approved"], true);

    let (status, _) = app
        .admin(Method::POST, "/admin/reviews/missing/approve", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
