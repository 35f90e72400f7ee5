//! Router tests that never reach the database.
//!
//! The app is built on a lazily-connected pool pointing at a closed port, so
//! every request here must be answered before a query would run.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;

use warung_integration_tests::{TEST_SERVER_KEY, lazy_app, post_json, send};
use warung_storefront::midtrans::notification_signature;

fn settlement_notification(signature: &str) -> serde_json::Value {
    json!({
        "order_id": "ORDER-1767225600-a1b2c3d4",
        "status_code": "200",
        "gross_amount": "150000.00",
        "transaction_status": "settlement",
        "payment_type": "bank_transfer",
        "signature_key": signature,
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(lazy_app(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let response = tower::ServiceExt::oneshot(
        lazy_app(),
        Request::get("/health")
            .header("x-request-id", "cf-ray-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.headers()["x-request-id"], "cf-ray-123");
}

#[tokio::test]
async fn test_notification_with_bad_signature_is_unauthorized() {
    let (status, body) = send(
        lazy_app(),
        post_json("/payment/notification", &settlement_notification(&"0".repeat(128))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Invalid signature" }));
}

#[tokio::test]
async fn test_tampered_amount_fails_signature() {
    let signature = notification_signature(
        "ORDER-1767225600-a1b2c3d4",
        "200",
        "1.00",
        TEST_SERVER_KEY,
    );
    let (status, _) = send(
        lazy_app(),
        post_json("/payment/notification", &settlement_notification(&signature)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notification_with_malformed_json_is_bad_request() {
    let request = Request::post("/payment/notification")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(lazy_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
}

#[tokio::test]
async fn test_notification_missing_fields_is_bad_request() {
    let (status, _) = send(
        lazy_app(),
        post_json("/payment/notification", &json!({ "order_id": "ORDER-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_account_requires_login() {
    let (status, body) = send(lazy_app(), Request::get("/account").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Authentication required" }));
}

#[tokio::test]
async fn test_review_requires_login() {
    let (status, _) = send(
        lazy_app(),
        post_json("/products/1/reviews", &json!({ "rating": 5, "review_text": "Mantap" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_cart_action_is_bad_request() {
    let (status, body) = send(
        lazy_app(),
        post_json("/cart/update-item", &json!({ "productId": 1, "action": "explode" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "unknown cart action: explode" }));
}

#[tokio::test]
async fn test_create_transaction_without_cart_is_bad_request() {
    let (status, body) = send(
        lazy_app(),
        post_json("/payment/create-transaction", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Cart is empty" }));
}

#[tokio::test]
async fn test_callback_without_order_id_redirects() {
    let response = tower::ServiceExt::oneshot(
        lazy_app(),
        Request::get("/payment/error").body(Body::empty()).unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/cart");
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = lazy_app();
    let mut statuses = Vec::new();
    for _ in 0..6 {
        // No content type: rejected by the handler after the limiter counts it
        let request = Request::post("/auth/login")
            .header("x-forwarded-for", "203.0.113.99")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = send(app.clone(), request).await;
        statuses.push(status);
    }
    assert!(statuses[..5].iter().all(|s| *s != StatusCode::TOO_MANY_REQUESTS));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
}
