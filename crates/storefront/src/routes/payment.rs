//! Payment route handlers: Snap checkout, redirect callbacks, confirmation
//! and the Midtrans webhook.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use warung_core::{TransactionRef, TransactionStatus};

use crate::error::{AppError, Result};
use crate::middleware::{CartSession, RequireAuth};
use crate::models::{Order, Transaction};
use crate::routes::cart::CartView;
use crate::services::checkout::CheckoutService;
use crate::services::payment::{CallbackKind, PaymentRequest, PaymentService};
use crate::state::AppState;

/// Response of `POST /payment/create-transaction`.
#[derive(Debug, Serialize)]
pub struct CreateTransactionResponse {
    pub token: String,
    pub redirect_url: String,
    pub order_id: TransactionRef,
}

/// Query of the Snap redirect callbacks.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub order_id: Option<String>,
}

/// A completed order on the confirmation page.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    #[serde(flatten)]
    pub cart: CartView,
}

/// Confirmation page data.
#[derive(Debug, Serialize)]
pub struct ConfirmationView {
    pub transaction: Option<Transaction>,
    pub orders: Vec<OrderView>,
}

/// Acknowledgement returned to Midtrans.
#[derive(Debug, Serialize)]
pub struct NotificationAck {
    pub status: &'static str,
    pub transaction_status: TransactionStatus,
    pub order_completed: bool,
}

/// Start a Snap payment for the visitor's cart.
#[instrument(skip(state, cart, request))]
pub async fn create_transaction(
    State(state): State<AppState>,
    cart: CartSession,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<CreateTransactionResponse>> {
    let owner = cart
        .owner()
        .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;

    let start = PaymentService::new(&state)
        .create_transaction(owner, cart.user.as_ref(), &request)
        .await?;

    Ok(Json(CreateTransactionResponse {
        token: start.token,
        redirect_url: start.redirect_url,
        order_id: start.reference,
    }))
}

/// Snap `finish` redirect.
pub async fn success(state: State<AppState>, query: Query<CallbackQuery>) -> Result<Redirect> {
    callback(CallbackKind::Success, state, query).await
}

/// Snap `pending` redirect.
pub async fn pending(state: State<AppState>, query: Query<CallbackQuery>) -> Result<Redirect> {
    callback(CallbackKind::Pending, state, query).await
}

/// Snap `error` redirect.
pub async fn error(state: State<AppState>, query: Query<CallbackQuery>) -> Result<Redirect> {
    callback(CallbackKind::Error, state, query).await
}

#[instrument(skip(state))]
async fn callback(
    kind: CallbackKind,
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    match query.order_id.as_deref().map(str::trim) {
        Some(order_id) if !order_id.is_empty() => {
            let reference = TransactionRef::new(order_id);
            PaymentService::new(&state)
                .handle_callback(kind, &reference)
                .await?;
        }
        _ => warn!(?kind, "Payment callback without order_id"),
    }

    Ok(Redirect::to(kind.redirect_path()))
}

/// Latest transaction and completed orders of the logged-in user.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn confirmation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ConfirmationView>> {
    let confirmation = CheckoutService::new(&state).confirmation(&user).await?;

    Ok(Json(ConfirmationView {
        transaction: confirmation.transaction,
        orders: confirmation
            .orders
            .iter()
            .map(|cart| OrderView {
                order: cart.order.clone(),
                cart: CartView::from(cart),
            })
            .collect(),
    }))
}

/// Midtrans HTTP notification.
///
/// Malformed JSON is a 400 with the standard error body.
#[instrument(skip(state, body))]
pub async fn notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotificationAck>> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;

    let reconciliation = PaymentService::new(&state)
        .handle_notification(payload)
        .await?;

    info!(
        reference = %reconciliation.transaction.transaction_id,
        status = %reconciliation.transaction.status,
        "Notification processed"
    );

    Ok(Json(NotificationAck {
        status: "ok",
        transaction_status: reconciliation.transaction.status,
        order_completed: reconciliation.order_completed,
    }))
}
