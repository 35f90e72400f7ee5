//! Payment reconciliation with Midtrans.
//!
//! Three paths move a local transaction:
//!
//! - `create_transaction` opens a Snap payment for the current cart and resets
//!   the order's transaction to `pending` under a fresh reference.
//! - `handle_notification` applies a signed status report pushed by Midtrans.
//! - `handle_callback` asks the status API for the truth after the browser is
//!   redirected back from the Snap page.
//!
//! All three end in [`TransactionRepository::apply_gateway_update`] (or
//! `start_payment`), which completes the order at most once.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use warung_core::TransactionRef;

use crate::config::StorefrontConfig;
use crate::db::{CustomerRepository, OrderRepository, TransactionRepository};
use crate::error::{AppError, Result};
use crate::midtrans::{
    Callbacks, CreditCard, CustomerDetails, MidtransClient, SnapAddress, SnapRequest,
    StatusReport, TransactionDetails,
};
use crate::models::{
    CartOwner, CurrentUser, GatewayUpdate, NewShippingAddress, Reconciliation, Transaction,
};
use crate::state::AppState;

/// Contact defaults used when the buyer supplies nothing.
pub mod defaults {
    pub const NAME: &str = "Guest";
    pub const EMAIL: &str = "guest@example.com";
    pub const PHONE: &str = "081234567890";
    pub const ADDRESS: &str = "Alamat Default";
    pub const CITY: &str = "Jakarta";
    pub const STATE: &str = "DKI Jakarta";
    pub const POSTAL_CODE: &str = "12345";
    pub const COUNTRY_CODE: &str = "IDN";
}

/// Body of `POST /payment/create-transaction`.
///
/// Any client-supplied amount is ignored; the gross amount is always the
/// server-side cart total.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub shipping: Option<ShippingInput>,
}

/// Shipping fields as sent by the checkout page; any may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingInput {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
}

impl ShippingInput {
    /// Fill missing fields with the defaults.
    #[must_use]
    pub fn with_defaults(&self) -> NewShippingAddress {
        NewShippingAddress {
            address: non_blank(self.address.as_deref()).unwrap_or(defaults::ADDRESS).to_string(),
            city: non_blank(self.city.as_deref()).unwrap_or(defaults::CITY).to_string(),
            state: non_blank(self.state.as_deref()).unwrap_or(defaults::STATE).to_string(),
            zipcode: non_blank(self.zipcode.as_deref())
                .unwrap_or(defaults::POSTAL_CODE)
                .to_string(),
        }
    }
}

/// Buyer contact details sent to Snap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// A started Snap payment.
#[derive(Debug, Clone)]
pub struct PaymentStart {
    pub token: String,
    pub redirect_url: String,
    pub reference: TransactionRef,
}

/// Which redirect brought the browser back from Snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Success,
    Pending,
    Error,
}

impl CallbackKind {
    /// Where the browser goes next.
    #[must_use]
    pub const fn redirect_path(self) -> &'static str {
        match self {
            Self::Success | Self::Pending => "/payment/confirmation",
            Self::Error => "/cart",
        }
    }
}

/// Payment service.
pub struct PaymentService<'a> {
    config: &'a StorefrontConfig,
    midtrans: &'a MidtransClient,
    customers: CustomerRepository<'a>,
    orders: OrderRepository<'a>,
    transactions: TransactionRepository<'a>,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service.
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            config: state.config(),
            midtrans: state.midtrans(),
            customers: CustomerRepository::new(state.pool()),
            orders: OrderRepository::new(state.pool()),
            transactions: TransactionRepository::new(state.pool()),
        }
    }

    /// Start a Snap payment for the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the cart is missing or empty.
    /// Returns `AppError::Gateway` if Snap rejects the request.
    /// Returns `AppError::Conflict` if the order is already paid, checked
    /// before Snap is called and again when the transaction is written.
    #[instrument(skip(self, request, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn create_transaction(
        &self,
        owner: CartOwner,
        user: Option<&CurrentUser>,
        request: &PaymentRequest,
    ) -> Result<PaymentStart> {
        let order = self
            .orders
            .find_cart(owner)
            .await?
            .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;
        let cart = self.orders.load(order).await?;
        if cart.is_empty() {
            return Err(AppError::BadRequest("Cart is empty".to_string()));
        }
        ensure_unpaid(self.transactions.get_for_order(cart.order.id).await?.as_ref())?;

        let gross_amount = cart
            .total()
            .whole_units()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| AppError::BadRequest("Cart total must be positive".to_string()))?;

        let contact = self.contact(user, request).await?;
        let shipping = request.shipping.clone().unwrap_or_default().with_defaults();
        let reference = TransactionRef::generate(Utc::now());

        let snap_request = build_snap_request(self.config, &reference, gross_amount, &contact, &shipping);
        let (snap, raw) = self.midtrans.create_snap_transaction(&snap_request).await?;

        self.orders.ensure_transaction_ref(cart.order.id, &reference).await?;
        self.transactions
            .start_payment(
                cart.order.id,
                user.map(|u| u.id),
                &reference,
                Decimal::from(gross_amount),
                &raw,
            )
            .await?;

        if cart.needs_shipping() && self.orders.shipping_address(cart.order.id).await?.is_none() {
            self.orders
                .save_shipping_address(cart.order.id, cart.order.customer_id, &shipping)
                .await?;
        }

        info!(%reference, gross_amount, "Snap payment started");

        Ok(PaymentStart {
            token: snap.token,
            redirect_url: snap.redirect_url,
            reference,
        })
    }

    /// Contact details: request fields first, then the logged-in account, then
    /// the defaults.
    async fn contact(&self, user: Option<&CurrentUser>, request: &PaymentRequest) -> Result<PaymentContact> {
        let account = match user {
            Some(current) => self.customers.get_user(current.id).await?,
            None => None,
        };

        let name = non_blank(request.first_name.as_deref())
            .map(String::from)
            .or_else(|| account.as_ref().map(|a| a.username.clone()))
            .unwrap_or_else(|| defaults::NAME.to_string());
        let email = non_blank(request.email.as_deref())
            .map(String::from)
            .or_else(|| {
                account
                    .as_ref()
                    .and_then(|a| a.email.as_ref())
                    .map(|e| e.as_str().to_string())
            })
            .unwrap_or_else(|| defaults::EMAIL.to_string());
        let phone = non_blank(request.phone.as_deref())
            .unwrap_or(defaults::PHONE)
            .to_string();

        Ok(PaymentContact { name, email, phone })
    }

    /// Apply a signed notification pushed by Midtrans.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is not a status report.
    /// Returns `AppError::Gateway` with `InvalidSignature` if the signature
    /// does not verify.
    /// Returns `AppError::NotFound` if no transaction has the reference.
    #[instrument(skip(self, payload))]
    pub async fn handle_notification(&self, payload: serde_json::Value) -> Result<Reconciliation> {
        let report: StatusReport = serde_json::from_value(payload.clone())
            .map_err(|e| AppError::BadRequest(format!("Invalid notification: {e}")))?;

        self.midtrans.verify_notification(&report)?;

        let reference = TransactionRef::new(report.order_id.clone());
        let reconciliation = self
            .apply(&reference, &report, payload)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        Ok(reconciliation)
    }

    /// Sync a transaction with the status API after a Snap redirect.
    ///
    /// Returns `None` when the reference is unknown locally. When the status
    /// API cannot be reached or reports an error, the error callback marks a
    /// still-pending transaction `failed`; the other callbacks leave it as is.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn handle_callback(
        &self,
        kind: CallbackKind,
        reference: &TransactionRef,
    ) -> Result<Option<Reconciliation>> {
        if self.transactions.get_by_ref(reference).await?.is_none() {
            warn!("Callback for unknown transaction");
            return Ok(None);
        }

        match self.sync_from_gateway(reference).await {
            Ok(reconciliation) => Ok(reconciliation),
            Err(AppError::Gateway(err)) => {
                warn!(error = %err, "Status API unavailable during callback");
                if kind == CallbackKind::Error && self.transactions.fail_if_pending(reference).await? {
                    info!("Marked pending transaction failed");
                }
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Fetch the authoritative status from the gateway and apply it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Gateway` if the status API fails.
    /// Returns `AppError::Database` if a query fails.
    pub async fn sync_from_gateway(&self, reference: &TransactionRef) -> Result<Option<Reconciliation>> {
        let (report, raw) = self.midtrans.transaction_status(reference).await?;
        if report.order_id != reference.as_str() {
            return Err(AppError::Internal(format!(
                "status API answered for {} instead of {reference}",
                report.order_id
            )));
        }
        self.apply(reference, &report, raw).await
    }

    async fn apply(
        &self,
        reference: &TransactionRef,
        report: &StatusReport,
        payload: serde_json::Value,
    ) -> Result<Option<Reconciliation>> {
        let update = GatewayUpdate {
            status: report.local_status(),
            payment_method: report.payment_type.clone(),
            payload,
        };

        if update.status.is_none() {
            warn!(
                gateway_status = %report.transaction_status,
                "Unmapped gateway status; keeping local status"
            );
        }

        let reconciliation = self.transactions.apply_gateway_update(reference, &update).await?;

        if let Some(r) = &reconciliation {
            info!(
                %reference,
                from = %r.previous_status,
                to = %r.transaction.status,
                order_completed = r.order_completed,
                "Transaction reconciled"
            );
        }

        Ok(reconciliation)
    }
}

/// Refuse to open a new payment for an order that is already paid.
fn ensure_unpaid(existing: Option<&Transaction>) -> Result<()> {
    match existing {
        Some(transaction) if transaction.status.is_paid() => {
            Err(AppError::Conflict("Order is already paid".to_string()))
        }
        _ => Ok(()),
    }
}

/// Build the Snap request for a payment.
#[must_use]
pub fn build_snap_request(
    config: &StorefrontConfig,
    reference: &TransactionRef,
    gross_amount: i64,
    contact: &PaymentContact,
    shipping: &NewShippingAddress,
) -> SnapRequest {
    let address = SnapAddress {
        first_name: contact.name.clone(),
        email: contact.email.clone(),
        phone: contact.phone.clone(),
        address: shipping.address.clone(),
        city: shipping.city.clone(),
        postal_code: shipping.zipcode.clone(),
        country_code: defaults::COUNTRY_CODE.to_string(),
    };

    let callback = |kind: CallbackKind| {
        let path = match kind {
            CallbackKind::Success => "/payment/success",
            CallbackKind::Pending => "/payment/pending",
            CallbackKind::Error => "/payment/error",
        };
        format!("{}?order_id={reference}", config.absolute_url(path))
    };

    SnapRequest {
        transaction_details: TransactionDetails {
            order_id: reference.as_str().to_string(),
            gross_amount,
        },
        customer_details: CustomerDetails {
            first_name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            billing_address: address.clone(),
            shipping_address: address,
        },
        credit_card: CreditCard { secure: true },
        callbacks: Callbacks {
            finish: callback(CallbackKind::Success),
            error: callback(CallbackKind::Error),
            pending: callback(CallbackKind::Pending),
        },
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
