//! Checkout, order submission and order history.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{instrument, warn};

use warung_core::{CustomerId, Email, GuestToken, OrderId, TransactionRef, TransactionStatus};

use crate::db::{CustomerRepository, OrderRepository, TransactionRepository};
use crate::error::{AppError, Result};
use crate::models::{
    Cart, CartOwner, CurrentUser, NewShippingAddress, Order, ShippingAddress, Transaction,
};
use crate::services::payment::PaymentService;
use crate::state::AppState;

/// Data for the checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutSummary {
    /// `None` when the visitor has no cart yet.
    pub cart: Option<Cart>,
    pub client_key: String,
    pub merchant_id: String,
    /// Reference shown to the buyer before payment starts.
    pub order_reference: String,
}

/// Body of `POST /checkout/process-order`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessOrderRequest {
    pub form: OrderForm,
    #[serde(default)]
    pub shipping: Option<NewShippingAddress>,
    /// Snap result posted by the browser. Only its presence matters; the
    /// status is always fetched from the gateway.
    #[serde(default)]
    pub payment_result: Option<serde_json::Value>,
}

/// Buyer fields of the checkout form.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderForm {
    /// Total the buyer saw; must match the server-side total.
    pub total: Decimal,
    /// Required for guests.
    #[serde(default)]
    pub name: Option<String>,
    /// Required for guests.
    #[serde(default)]
    pub email: Option<String>,
}

/// Outcome of submitting an order.
#[derive(Debug, Clone)]
pub struct ProcessedOrder {
    pub order_id: OrderId,
    pub reference: TransactionRef,
    /// Transaction status after any gateway sync.
    pub status: Option<TransactionStatus>,
    pub complete: bool,
}

/// A completed or pending order with everything the detail page shows.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub cart: Cart,
    pub transaction: Option<Transaction>,
    pub shipping: Option<ShippingAddress>,
}

/// The payment confirmation page.
#[derive(Debug, Clone, Default)]
pub struct Confirmation {
    pub transaction: Option<Transaction>,
    /// Completed orders, newest first.
    pub orders: Vec<Cart>,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    state: &'a AppState,
    customers: CustomerRepository<'a>,
    orders: OrderRepository<'a>,
    transactions: TransactionRepository<'a>,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            customers: CustomerRepository::new(state.pool()),
            orders: OrderRepository::new(state.pool()),
            transactions: TransactionRepository::new(state.pool()),
        }
    }

    /// Cart, totals and gateway keys for the checkout page.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn summary(&self, owner: Option<CartOwner>) -> Result<CheckoutSummary> {
        let cart = match owner {
            Some(owner) => match self.orders.find_cart(owner).await? {
                Some(order) => Some(self.orders.load(order).await?),
                None => None,
            },
            None => None,
        };

        let order_reference = cart.as_ref().map_or_else(
            || format!("{}-{}", TransactionRef::PREFIX, Utc::now().timestamp()),
            |c| {
                c.order.transaction_id.as_ref().map_or_else(
                    || format!("{}-{}", TransactionRef::PREFIX, c.order.id),
                    |r| r.as_str().to_string(),
                )
            },
        );

        let midtrans = self.state.midtrans();
        Ok(CheckoutSummary {
            cart,
            client_key: midtrans.client_key().to_string(),
            merchant_id: midtrans.merchant_id().to_string(),
            order_reference,
        })
    }

    /// Submit the current cart as an order.
    ///
    /// Guests must supply a name and email, which create or reuse a guest
    /// customer. The submitted total must equal the server-side total. The
    /// shipping address is stored when the cart holds physical goods and none
    /// is on file. When a payment result is present, the status is synced
    /// from the gateway; the order completes only if the gateway reports it
    /// paid.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty cart, a total mismatch,
    /// missing guest details or a missing shipping address.
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self, request, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn process_order(
        &self,
        user: Option<&CurrentUser>,
        guest: Option<GuestToken>,
        request: &ProcessOrderRequest,
    ) -> Result<ProcessedOrder> {
        let (owner, customer_id) = match user {
            Some(current) => (CartOwner::Customer(current.customer_id), current.customer_id),
            None => {
                let token = guest.ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;
                let customer_id = self.guest_customer(&request.form).await?;
                (CartOwner::Guest(token), customer_id)
            }
        };

        let order = self
            .orders
            .find_cart(owner)
            .await?
            .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;
        if user.is_none() {
            self.orders.attach_customer(order.id, customer_id).await?;
        }

        let cart = self.orders.load(order).await?;
        if cart.is_empty() {
            return Err(AppError::BadRequest("Cart is empty".to_string()));
        }

        let expected = cart.total().amount;
        if !totals_match(request.form.total, expected) {
            return Err(AppError::BadRequest(format!(
                "Order total mismatch: submitted {}, expected {}",
                request.form.total,
                expected.normalize()
            )));
        }

        let reference = self
            .orders
            .ensure_transaction_ref(cart.order.id, &TransactionRef::generate(Utc::now()))
            .await?;

        if cart.needs_shipping() && self.orders.shipping_address(cart.order.id).await?.is_none() {
            let shipping = request
                .shipping
                .as_ref()
                .filter(|s| s.is_complete())
                .ok_or_else(|| AppError::BadRequest("Shipping address is required".to_string()))?;
            self.orders
                .save_shipping_address(cart.order.id, Some(customer_id), shipping)
                .await?;
        }

        let mut status = None;
        let mut complete = cart.order.complete;
        if request.payment_result.is_some()
            && let Some(transaction) = self.transactions.get_for_order(cart.order.id).await?
        {
            status = Some(transaction.status);
            match PaymentService::new(self.state)
                .sync_from_gateway(&transaction.transaction_id)
                .await
            {
                Ok(Some(reconciliation)) => {
                    status = Some(reconciliation.transaction.status);
                    complete = reconciliation.transaction.status.is_paid();
                }
                Ok(None) => {}
                Err(AppError::Gateway(err)) => {
                    warn!(error = %err, "Status API unavailable while processing order");
                }
                Err(other) => return Err(other),
            }
        }

        Ok(ProcessedOrder {
            order_id: cart.order.id,
            reference,
            status,
            complete,
        })
    }

    async fn guest_customer(&self, form: &OrderForm) -> Result<CustomerId> {
        let name = form
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::BadRequest("Name is required".to_string()))?;
        let email = form
            .email
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Email is required".to_string()))?;
        let email = Email::parse(email).map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(self.customers.guest_customer(name, &email).await?.id)
    }

    /// An order of the given customer with lines, transaction and shipping.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not exist or belongs to
    /// someone else.
    pub async fn order_detail(&self, customer_id: CustomerId, order_id: OrderId) -> Result<OrderDetail> {
        let order = self
            .orders
            .get_customer_order(order_id, customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        let cart = self.orders.load(order).await?;
        let transaction = self.transactions.get_for_order(order_id).await?;
        let shipping = self.orders.shipping_address(order_id).await?;

        Ok(OrderDetail {
            cart,
            transaction,
            shipping,
        })
    }

    /// Latest transaction of the user and their completed orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn confirmation(&self, user: &CurrentUser) -> Result<Confirmation> {
        let transaction = self.transactions.latest_for_user(user.id).await?;

        let mut orders = Vec::new();
        for order in self.orders.completed_orders(user.customer_id).await? {
            orders.push(self.orders.load(order).await?);
        }

        Ok(Confirmation { transaction, orders })
    }

    /// The customer's order history, for use by account pages.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn completed_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self.orders.completed_orders(customer_id).await?)
    }
}

/// Compare a submitted total with the server total at rupiah-cent precision.
fn totals_match(submitted: Decimal, expected: Decimal) -> bool {
    submitted.round_dp(2) == expected.round_dp(2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_match_ignores_trailing_zeros() {
        assert!(totals_match(Decimal::new(84915, 2), Decimal::new(849_150, 3)));
        assert!(totals_match(Decimal::from(1000), Decimal::new(100_000, 2)));
    }

    #[test]
    fn test_totals_mismatch() {
        assert!(!totals_match(Decimal::from(1000), Decimal::from(999)));
        assert!(!totals_match(Decimal::new(84915, 2), Decimal::new(84916, 2)));
    }

    #[test]
    fn test_process_order_request_accepts_number_or_string_total() {
        let from_number: ProcessOrderRequest =
            serde_json::from_str(r#"{"form": {"total": 849.15}}"#).unwrap();
        let from_string: ProcessOrderRequest =
            serde_json::from_str(r#"{"form": {"total": "849.15"}}"#).unwrap();
        assert_eq!(from_number.form.total, Decimal::new(84915, 2));
        assert_eq!(from_string.form.total, Decimal::new(84915, 2));
        assert!(from_number.payment_result.is_none());
    }
}
