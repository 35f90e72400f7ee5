//! End-to-end flows against a running storefront and its database.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`warung-cli migrate`)
//! - The storefront running (`cargo run -p warung-storefront`)
//! - `STOREFRONT_DATABASE_URL` and `MIDTRANS_SERVER_KEY` matching the server
//!
//! Run with: `cargo test -p warung-integration-tests -- --ignored`

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use warung_integration_tests::storefront_base_url;
use warung_storefront::midtrans::notification_signature;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

async fn pool() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL not set");
    PgPool::connect(&url).await.expect("Failed to connect to database")
}

/// Insert a physical product with the given stock and return its id.
async fn create_product(pool: &PgPool, price: i64, stock: i32) -> i32 {
    let slug = format!("test-{}", Uuid::new_v4().simple());
    sqlx::query_scalar(
        "INSERT INTO store.product (name, slug, price, stock) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(format!("Produk Uji {slug}"))
    .bind(&slug)
    .bind(Decimal::from(price))
    .bind(stock)
    .fetch_one(pool)
    .await
    .expect("Failed to create product")
}

async fn add_to_cart(client: &Client, product_id: i32) -> Value {
    let resp = client
        .post(format!("{}/cart/update-item", storefront_base_url()))
        .json(&json!({ "productId": product_id, "action": "add" }))
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to read cart update")
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_adding_same_product_twice_increments_quantity() {
    let pool = pool().await;
    let product_id = create_product(&pool, 25_000, 10).await;
    let client = client();

    let first = add_to_cart(&client, product_id).await;
    assert_eq!(first["quantity"], 1);

    let second = add_to_cart(&client, product_id).await;
    assert_eq!(second["quantity"], 2);
    assert_eq!(second["cart_item_count"], 2);
    let total: Decimal = second["cart_total"]
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal total");
    assert_eq!(total, Decimal::from(50_000));

    let cart: Value = client
        .get(format!("{}/cart", storefront_base_url()))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    let lines: Vec<&Value> = cart["items"]
        .as_array()
        .expect("items array")
        .iter()
        .filter(|line| line["product_id"] == product_id)
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 2);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_removing_last_unit_deletes_line() {
    let pool = pool().await;
    let product_id = create_product(&pool, 10_000, 5).await;
    let client = client();

    add_to_cart(&client, product_id).await;
    let resp: Value = client
        .post(format!("{}/cart/update-item", storefront_base_url()))
        .json(&json!({ "product_id": product_id, "action": "remove" }))
        .send()
        .await
        .expect("Failed to update cart")
        .json()
        .await
        .expect("Failed to read cart update");

    assert!(resp.get("quantity").is_none());
    assert_eq!(resp["cart_item_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_settlement_completes_order_exactly_once() {
    let pool = pool().await;
    let server_key = std::env::var("MIDTRANS_SERVER_KEY").expect("MIDTRANS_SERVER_KEY not set");
    let product_id = create_product(&pool, 75_000, 10).await;

    let reference = format!("ORDER-1767225600-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let order_id: i32 = sqlx::query_scalar(
        "INSERT INTO store.order (guest_token, transaction_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&reference)
    .fetch_one(&pool)
    .await
    .expect("Failed to create order");
    sqlx::query("INSERT INTO store.order_item (order_id, product_id, quantity) VALUES ($1, $2, 2)")
        .bind(order_id)
        .bind(product_id)
        .execute(&pool)
        .await
        .expect("Failed to create order item");
    sqlx::query(
        "INSERT INTO store.transaction (order_id, transaction_id, amount, payment_response)
         VALUES ($1, $2, 150000, '{}'::jsonb)",
    )
    .bind(order_id)
    .bind(&reference)
    .execute(&pool)
    .await
    .expect("Failed to create transaction");

    let signature = notification_signature(&reference, "200", "150000.00", &server_key);
    let notification = json!({
        "order_id": reference,
        "status_code": "200",
        "gross_amount": "150000.00",
        "transaction_status": "settlement",
        "payment_type": "bank_transfer",
        "signature_key": signature,
    });

    let client = client();
    let url = format!("{}/payment/notification", storefront_base_url());
    let mut completions = Vec::new();
    for _ in 0..2 {
        let resp = client
            .post(&url)
            .json(&notification)
            .send()
            .await
            .expect("Failed to send notification");
        assert_eq!(resp.status(), StatusCode::OK);
        let ack: Value = resp.json().await.expect("Failed to read ack");
        assert_eq!(ack["transaction_status"], "settlement");
        completions.push(ack["order_completed"].as_bool().expect("bool"));
    }
    assert_eq!(completions, vec![true, false]);

    let (complete, stock, sales): (bool, i32, i32) = sqlx::query_as(
        "SELECT o.complete, p.stock, p.sales_count
         FROM store.order o, store.product p
         WHERE o.id = $1 AND p.id = $2",
    )
    .bind(order_id)
    .bind(product_id)
    .fetch_one(&pool)
    .await
    .expect("Failed to read order");
    assert!(complete);
    assert_eq!(stock, 8);
    assert_eq!(sales, 2);
}
