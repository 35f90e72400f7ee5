//! Account route handlers.
//!
//! These routes require authentication.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use warung_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Order, ShippingAddress, Transaction};
use crate::routes::cart::CartView;
use crate::services::account::{Account, AccountService, AccountUpdate};
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Account overview.
#[derive(Debug, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    /// Completed orders, newest first.
    pub orders: Vec<Order>,
}

/// A single order of the user.
#[derive(Debug, Serialize)]
pub struct OrderDetailView {
    pub order: Order,
    #[serde(flatten)]
    pub cart: CartView,
    pub transaction: Option<Transaction>,
    pub shipping_address: Option<ShippingAddress>,
}

/// Profile, customer details and order history.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AccountView>> {
    let account = AccountService::new(state.pool()).account(&user).await?;
    let orders = CheckoutService::new(&state)
        .completed_orders(user.customer_id)
        .await?;

    Ok(Json(AccountView { account, orders }))
}

/// Update profile and customer details.
#[instrument(skip(state, user, update), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<Account>> {
    let account = AccountService::new(state.pool())
        .update(&user, &update)
        .await?;
    Ok(Json(account))
}

/// One of the user's orders with lines, transaction and shipping address.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn order_detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderDetailView>> {
    let detail = CheckoutService::new(&state)
        .order_detail(user.customer_id, order_id)
        .await?;

    Ok(Json(OrderDetailView {
        cart: CartView::from(&detail.cart),
        order: detail.cart.order,
        transaction: detail.transaction,
        shipping_address: detail.shipping,
    }))
}
