//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (database)
//!
//! # Catalog
//! GET  /                               - Product listing (?search, ?category, ?page)
//! GET  /products/{id}                  - Product detail
//! POST /products/{id}/reviews          - Add or update review (auth)
//! GET  /categories                     - Category tree
//! GET  /categories/{slug}              - Category detail (?page)
//!
//! # Cart and checkout
//! GET  /cart                           - Current cart
//! POST /cart/update-item               - Add, remove or set a line
//! GET  /checkout                       - Checkout summary
//! POST /checkout/process-order         - Submit order (rate limited)
//!
//! # Payment
//! POST /payment/create-transaction     - Start Snap payment (rate limited)
//! GET  /payment/success                - Snap finish redirect
//! GET  /payment/pending                - Snap pending redirect
//! GET  /payment/error                  - Snap error redirect
//! GET  /payment/confirmation           - Latest transaction (auth)
//! POST /payment/notification           - Midtrans webhook
//!
//! # Auth
//! POST /auth/register                  - Register (rate limited)
//! POST /auth/login                     - Login (rate limited)
//! POST /auth/logout                    - Logout
//!
//! # Account (requires auth)
//! GET  /account                        - Profile and order history
//! POST /account                        - Update profile
//! GET  /account/orders/{id}            - Order detail
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod payment;
pub mod reviews;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// Catalog and review routes.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/products/{id}", get(catalog::show))
        .route("/products/{id}/reviews", post(reviews::add_review))
        .route("/categories", get(catalog::categories))
        .route("/categories/{slug}", get(catalog::category))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/update-item", post(cart::update_item))
}

/// Auth routes. Login and registration are rate limited.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Payment routes. Creating a transaction is rate limited; the webhook is not.
pub fn payment_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/create-transaction", post(payment::create_transaction))
        .layer(payment_rate_limiter());

    Router::new()
        .route("/success", get(payment::success))
        .route("/pending", get(payment::pending))
        .route("/error", get(payment::error))
        .route("/confirmation", get(payment::confirmation))
        .route("/notification", post(payment::notification))
        .merge(limited)
}

/// Checkout routes. Order submission is rate limited.
pub fn checkout_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/process-order", post(checkout::process_order))
        .layer(payment_rate_limiter());

    Router::new().route("/", get(checkout::show)).merge(limited)
}

/// Account routes.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update))
        .route("/orders/{id}", get(account::order_detail))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/payment", payment_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
}
