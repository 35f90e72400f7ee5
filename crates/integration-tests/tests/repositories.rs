//! Repository tests against a throwaway database.
//!
//! Each test gets a fresh database with the storefront migrations applied.
//! Requires `DATABASE_URL` pointing at a `PostgreSQL` server the tests may
//! create databases on.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use warung_core::{
    CustomerId, Email, GuestToken, OrderId, ProductId, TransactionRef, TransactionStatus,
    VariantId,
};
use warung_storefront::db::{CustomerRepository, OrderRepository, TransactionRepository};
use warung_storefront::models::{CartOwner, GatewayUpdate, LineAction};

async fn create_product(pool: &PgPool, slug: &str, price: i64, stock: i32) -> ProductId {
    sqlx::query_scalar(
        "INSERT INTO store.product (name, slug, price, stock) VALUES ($1, $1, $2, $3) RETURNING id",
    )
    .bind(slug)
    .bind(Decimal::from(price))
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn create_variant(pool: &PgPool, product_id: ProductId, value: &str) -> VariantId {
    sqlx::query_scalar(
        "INSERT INTO store.product_variant (product_id, name, value, price_adjustment, stock)
         VALUES ($1, 'Warna', $2, 5000, 3) RETURNING id",
    )
    .bind(product_id)
    .bind(value)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn create_customer(pool: &PgPool, email: &str) -> CustomerId {
    CustomerRepository::new(pool)
        .guest_customer("Budi", &Email::parse(email).unwrap())
        .await
        .unwrap()
        .id
}

async fn stock_and_sales(pool: &PgPool, product_id: ProductId) -> (i32, i32) {
    sqlx::query_as("SELECT stock, sales_count FROM store.product WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Open a pending payment for the order, as Snap checkout does.
async fn start_payment(pool: &PgPool, order_id: OrderId, amount: i64) -> TransactionRef {
    let reference = TransactionRef::generate(chrono::Utc::now());
    let reference = OrderRepository::new(pool)
        .ensure_transaction_ref(order_id, &reference)
        .await
        .unwrap();
    TransactionRepository::new(pool)
        .start_payment(order_id, None, &reference, Decimal::from(amount), &json!({"token": "snap"}))
        .await
        .unwrap();
    reference
}

fn settlement() -> GatewayUpdate {
    GatewayUpdate {
        status: Some(TransactionStatus::Settlement),
        payment_method: Some("bank_transfer".to_string()),
        payload: json!({ "transaction_status": "settlement" }),
    }
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_adding_same_line_twice_increments_quantity(pool: PgPool) {
    let product = create_product(&pool, "kopi-gayo", 25_000, 10).await;
    let orders = OrderRepository::new(&pool);
    let cart = orders
        .get_or_create_cart(CartOwner::Guest(GuestToken::generate()))
        .await
        .unwrap();

    let first = orders.apply_line_action(cart.id, product, None, LineAction::Add(1)).await.unwrap();
    let second = orders.apply_line_action(cart.id, product, None, LineAction::Add(1)).await.unwrap();

    assert_eq!(first, Some(1));
    assert_eq!(second, Some(2));
    let lines = orders.lines(cart.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_set_and_remove_to_zero_deletes_line(pool: PgPool) {
    let product = create_product(&pool, "teh-tarik", 15_000, 10).await;
    let orders = OrderRepository::new(&pool);
    let cart = orders
        .get_or_create_cart(CartOwner::Guest(GuestToken::generate()))
        .await
        .unwrap();

    let set = orders.apply_line_action(cart.id, product, None, LineAction::Set(5)).await.unwrap();
    assert_eq!(set, Some(5));

    let removed = orders.apply_line_action(cart.id, product, None, LineAction::Remove(2)).await.unwrap();
    assert_eq!(removed, Some(3));

    let gone = orders.apply_line_action(cart.id, product, None, LineAction::Remove(3)).await.unwrap();
    assert_eq!(gone, None);
    assert!(orders.lines(cart.id).await.unwrap().is_empty());

    let zeroed = orders.apply_line_action(cart.id, product, None, LineAction::Set(0)).await.unwrap();
    assert_eq!(zeroed, None);
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_variant_and_plain_lines_total(pool: PgPool) {
    let product = create_product(&pool, "kaos-batik", 100_000, 10).await;
    let variant = create_variant(&pool, product, "Merah").await;
    let orders = OrderRepository::new(&pool);
    let order = orders
        .get_or_create_cart(CartOwner::Guest(GuestToken::generate()))
        .await
        .unwrap();

    orders.apply_line_action(order.id, product, None, LineAction::Add(2)).await.unwrap();
    orders.apply_line_action(order.id, product, Some(variant), LineAction::Add(1)).await.unwrap();

    let cart = orders.load(order).await.unwrap();
    assert_eq!(cart.lines.len(), 2);
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.total().amount, Decimal::from(305_000));
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_deleting_variant_in_cart_removes_its_line(pool: PgPool) {
    let product = create_product(&pool, "sarung", 80_000, 10).await;
    let variant = create_variant(&pool, product, "Hijau").await;
    let orders = OrderRepository::new(&pool);
    let cart = orders
        .get_or_create_cart(CartOwner::Guest(GuestToken::generate()))
        .await
        .unwrap();
    orders.apply_line_action(cart.id, product, None, LineAction::Add(1)).await.unwrap();
    orders.apply_line_action(cart.id, product, Some(variant), LineAction::Add(1)).await.unwrap();

    sqlx::query("DELETE FROM store.product_variant WHERE id = $1")
        .bind(variant)
        .execute(&pool)
        .await
        .unwrap();

    let lines = orders.lines(cart.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].variant.is_none());
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_repeated_settlement_completes_order_once(pool: PgPool) {
    let product = create_product(&pool, "rendang", 75_000, 10).await;
    let orders = OrderRepository::new(&pool);
    let cart = orders
        .get_or_create_cart(CartOwner::Guest(GuestToken::generate()))
        .await
        .unwrap();
    orders.apply_line_action(cart.id, product, None, LineAction::Add(2)).await.unwrap();
    let reference = start_payment(&pool, cart.id, 150_000).await;

    let transactions = TransactionRepository::new(&pool);
    let first = transactions.apply_gateway_update(&reference, &settlement()).await.unwrap().unwrap();
    let second = transactions.apply_gateway_update(&reference, &settlement()).await.unwrap().unwrap();

    assert_eq!((first.order_completed, second.order_completed), (true, false));
    assert_eq!(first.previous_status, TransactionStatus::Pending);
    assert_eq!(second.transaction.status, TransactionStatus::Settlement);
    assert_eq!(stock_and_sales(&pool, product).await, (8, 2));

    let complete: bool = sqlx::query_scalar("SELECT complete FROM store.order WHERE id = $1")
        .bind(cart.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(complete);
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_late_expiry_does_not_undo_settlement(pool: PgPool) {
    let product = create_product(&pool, "sambal", 20_000, 5).await;
    let orders = OrderRepository::new(&pool);
    let cart = orders
        .get_or_create_cart(CartOwner::Guest(GuestToken::generate()))
        .await
        .unwrap();
    orders.apply_line_action(cart.id, product, None, LineAction::Add(1)).await.unwrap();
    let reference = start_payment(&pool, cart.id, 20_000).await;

    let transactions = TransactionRepository::new(&pool);
    transactions.apply_gateway_update(&reference, &settlement()).await.unwrap();
    let expired = GatewayUpdate {
        status: Some(TransactionStatus::Expired),
        payment_method: None,
        payload: json!({ "transaction_status": "expire" }),
    };
    let after = transactions.apply_gateway_update(&reference, &expired).await.unwrap().unwrap();

    assert_eq!(after.transaction.status, TransactionStatus::Settlement);
    assert!(!after.order_completed);
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_merge_sums_guest_lines_into_customer_cart(pool: PgPool) {
    let product = create_product(&pool, "gula-aren", 30_000, 10).await;
    let customer = create_customer(&pool, "budi@example.id").await;
    let token = GuestToken::generate();
    let orders = OrderRepository::new(&pool);

    let customer_cart = orders.get_or_create_cart(CartOwner::Customer(customer)).await.unwrap();
    orders.apply_line_action(customer_cart.id, product, None, LineAction::Add(1)).await.unwrap();
    let guest_cart = orders.get_or_create_cart(CartOwner::Guest(token)).await.unwrap();
    orders.apply_line_action(guest_cart.id, product, None, LineAction::Add(2)).await.unwrap();

    let merged = orders.merge_guest_cart(token, customer).await.unwrap();

    assert_eq!(merged, Some(customer_cart.id));
    let lines = orders.lines(customer_cart.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
    assert!(orders.find_cart(CartOwner::Guest(token)).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_merge_keeps_guest_payment_reachable(pool: PgPool) {
    let kopi = create_product(&pool, "kopi-toraja", 40_000, 10).await;
    let teh = create_product(&pool, "teh-melati", 10_000, 10).await;
    let customer = create_customer(&pool, "sari@example.id").await;
    let token = GuestToken::generate();
    let orders = OrderRepository::new(&pool);

    let customer_cart = orders.get_or_create_cart(CartOwner::Customer(customer)).await.unwrap();
    orders.apply_line_action(customer_cart.id, teh, None, LineAction::Add(1)).await.unwrap();
    let guest_cart = orders.get_or_create_cart(CartOwner::Guest(token)).await.unwrap();
    orders.apply_line_action(guest_cart.id, kopi, None, LineAction::Add(1)).await.unwrap();
    let reference = start_payment(&pool, guest_cart.id, 40_000).await;

    orders.merge_guest_cart(token, customer).await.unwrap();

    let transactions = TransactionRepository::new(&pool);
    let moved = transactions.get_by_ref(&reference).await.unwrap().unwrap();
    assert_eq!(moved.order_id, customer_cart.id);
    let cart = orders.find_cart(CartOwner::Customer(customer)).await.unwrap().unwrap();
    assert_eq!(cart.transaction_id.as_ref(), Some(&reference));

    let settled = transactions.apply_gateway_update(&reference, &settlement()).await.unwrap().unwrap();
    assert!(settled.order_completed);
    assert_eq!(stock_and_sales(&pool, kopi).await, (9, 1));
}

#[sqlx::test(migrations = "../storefront/migrations")]
async fn test_merge_leaves_guest_cart_when_both_are_paying(pool: PgPool) {
    let product = create_product(&pool, "keripik", 12_000, 10).await;
    let customer = create_customer(&pool, "dewi@example.id").await;
    let token = GuestToken::generate();
    let orders = OrderRepository::new(&pool);

    let customer_cart = orders.get_or_create_cart(CartOwner::Customer(customer)).await.unwrap();
    orders.apply_line_action(customer_cart.id, product, None, LineAction::Add(1)).await.unwrap();
    start_payment(&pool, customer_cart.id, 12_000).await;
    let guest_cart = orders.get_or_create_cart(CartOwner::Guest(token)).await.unwrap();
    orders.apply_line_action(guest_cart.id, product, None, LineAction::Add(2)).await.unwrap();
    let guest_reference = start_payment(&pool, guest_cart.id, 24_000).await;

    let merged = orders.merge_guest_cart(token, customer).await.unwrap();

    assert_eq!(merged, Some(customer_cart.id));
    let transactions = TransactionRepository::new(&pool);
    let guest_payment = transactions.get_by_ref(&guest_reference).await.unwrap().unwrap();
    assert_eq!(guest_payment.order_id, guest_cart.id);
    assert_eq!(orders.lines(customer_cart.id).await.unwrap()[0].quantity, 1);

    let settled = transactions
        .apply_gateway_update(&guest_reference, &settlement())
        .await
        .unwrap()
        .unwrap();
    assert!(settled.order_completed);
}
