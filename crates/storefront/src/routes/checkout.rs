//! Checkout route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use warung_core::{OrderId, TransactionRef, TransactionStatus};

use crate::error::Result;
use crate::middleware::CartSession;
use crate::routes::cart::CartView;
use crate::services::checkout::{CheckoutService, ProcessOrderRequest};
use crate::state::AppState;

/// Checkout page data.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub cart: CartView,
    pub client_key: String,
    pub merchant_id: String,
    pub is_production: bool,
    pub order_reference: String,
}

/// Response of `POST /checkout/process-order`.
#[derive(Debug, Serialize)]
pub struct ProcessOrderResponse {
    pub message: &'static str,
    pub order_id: OrderId,
    pub transaction_id: TransactionRef,
    pub status: Option<TransactionStatus>,
    pub complete: bool,
}

/// Cart, totals and gateway keys for the checkout page.
#[instrument(skip(state, cart))]
pub async fn show(State(state): State<AppState>, cart: CartSession) -> Result<Json<CheckoutView>> {
    let summary = CheckoutService::new(&state).summary(cart.owner()).await?;

    Ok(Json(CheckoutView {
        cart: CartView::from(summary.cart.as_ref()),
        client_key: summary.client_key,
        merchant_id: summary.merchant_id,
        is_production: state.midtrans().is_production(),
        order_reference: summary.order_reference,
    }))
}

/// Submit the current cart as an order.
#[instrument(skip(state, cart, request))]
pub async fn process_order(
    State(state): State<AppState>,
    cart: CartSession,
    Json(request): Json<ProcessOrderRequest>,
) -> Result<Json<ProcessOrderResponse>> {
    let processed = CheckoutService::new(&state)
        .process_order(cart.user.as_ref(), cart.guest, &request)
        .await?;

    let message = if processed.complete {
        "Order completed"
    } else {
        "Order received"
    };

    Ok(Json(ProcessOrderResponse {
        message,
        order_id: processed.order_id,
        transaction_id: processed.reference,
        status: processed.status,
        complete: processed.complete,
    }))
}
