//! Order repository: carts, line items, shipping addresses and completion.
//!
//! A cart is the owner's single incomplete order. Partial unique indexes on
//! `store.order` guarantee at most one per customer and per guest token, and
//! `order_item_line_idx` guarantees one row per (order, product, variant).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use warung_core::{
    CurrencyCode, CustomerId, DiscountPercent, GuestToken, OrderId, OrderItemId, Price,
    ProductId, ShippingAddressId, TransactionRef, VariantId,
};

use super::RepositoryError;
use crate::models::order::{
    Cart, CartOwner, LineAction, LineProduct, LineVariant, NewShippingAddress, Order, OrderLine,
    ShippingAddress,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: Option<CustomerId>,
    guest_token: Option<GuestToken>,
    date_ordered: DateTime<Utc>,
    date_completed: Option<DateTime<Utc>>,
    complete: bool,
    transaction_id: Option<TransactionRef>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            guest_token: row.guest_token,
            date_ordered: row.date_ordered,
            date_completed: row.date_completed,
            complete: row.complete,
            transaction_id: row.transaction_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    item_id: OrderItemId,
    quantity: i32,
    date_added: DateTime<Utc>,
    product_id: Option<ProductId>,
    product_name: Option<String>,
    product_slug: Option<String>,
    product_price: Option<Decimal>,
    discount_percent: Option<i32>,
    digital: Option<bool>,
    variant_id: Option<VariantId>,
    variant_name: Option<String>,
    variant_value: Option<String>,
    price_adjustment: Option<Decimal>,
}

impl TryFrom<LineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let product = match (row.product_id, row.product_name, row.product_price) {
            (Some(id), Some(name), Some(price)) => {
                let discount_percent = DiscountPercent::new(row.discount_percent.unwrap_or(0))
                    .map_err(|e| RepositoryError::DataCorruption(format!("product {id}: {e}")))?;
                Some(LineProduct {
                    id,
                    name,
                    slug: row.product_slug,
                    price: Price::new(price, CurrencyCode::IDR),
                    discount_percent,
                    digital: row.digital.unwrap_or(false),
                })
            }
            _ => None,
        };

        let variant = match (row.variant_id, row.variant_name, row.variant_value) {
            (Some(id), Some(name), Some(value)) => Some(LineVariant {
                id,
                name,
                value,
                price_adjustment: row.price_adjustment.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            item_id: row.item_id,
            quantity: row.quantity,
            product,
            variant,
            date_added: row.date_added,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemQuantityRow {
    id: OrderItemId,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingAddressRow {
    id: ShippingAddressId,
    customer_id: Option<CustomerId>,
    order_id: OrderId,
    address: String,
    city: String,
    state: String,
    zipcode: String,
    date_added: DateTime<Utc>,
}

impl From<ShippingAddressRow> for ShippingAddress {
    fn from(row: ShippingAddressRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            order_id: row.order_id,
            address: row.address,
            city: row.city,
            state: row.state,
            zipcode: row.zipcode,
            date_added: row.date_added,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, customer_id, guest_token, date_ordered, date_completed, complete, transaction_id";

const SHIPPING_COLUMNS: &str =
    "id, customer_id, order_id, address, city, state, zipcode, date_added";

/// Repository for order and cart database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the owner's cart without creating one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_cart(&self, owner: CartOwner) -> Result<Option<Order>, RepositoryError> {
        let row = match owner {
            CartOwner::Customer(customer_id) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM store.order
                     WHERE customer_id = $1 AND complete = FALSE"
                ))
                .bind(customer_id)
                .fetch_optional(self.pool)
                .await?
            }
            CartOwner::Guest(token) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM store.order
                     WHERE guest_token = $1 AND complete = FALSE"
                ))
                .bind(token)
                .fetch_optional(self.pool)
                .await?
            }
        };

        Ok(row.map(Order::from))
    }

    /// Get the owner's cart, creating an empty one if none exists.
    ///
    /// Concurrent callers for the same owner converge on the same row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, owner: CartOwner) -> Result<Order, RepositoryError> {
        match owner {
            CartOwner::Customer(customer_id) => {
                sqlx::query(
                    r"
                    INSERT INTO store.order (customer_id)
                    VALUES ($1)
                    ON CONFLICT (customer_id) WHERE complete = FALSE DO NOTHING
                    ",
                )
                .bind(customer_id)
                .execute(self.pool)
                .await?;
            }
            CartOwner::Guest(token) => {
                sqlx::query(
                    r"
                    INSERT INTO store.order (guest_token)
                    VALUES ($1)
                    ON CONFLICT (guest_token) WHERE complete = FALSE DO NOTHING
                    ",
                )
                .bind(token)
                .execute(self.pool)
                .await?;
            }
        }

        // A concurrent completion between the insert and this read is the only
        // way to miss; surface it rather than loop.
        self.find_cart(owner).await?.ok_or(RepositoryError::NotFound)
    }

    /// Get an order by ID only if it belongs to `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_customer_order(
        &self,
        id: OrderId,
        customer_id: CustomerId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM store.order WHERE id = $1 AND customer_id = $2"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Completed orders of a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn completed_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM store.order
             WHERE customer_id = $1 AND complete
             ORDER BY date_completed DESC NULLS LAST, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Lines of an order with the product and variant data needed for pricing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a product row is invalid.
    pub async fn lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, LineRow>(
            r"
            SELECT oi.id AS item_id, oi.quantity, oi.date_added,
                   p.id AS product_id, p.name AS product_name, p.slug AS product_slug,
                   p.price AS product_price, p.discount_percent, p.digital,
                   v.id AS variant_id, v.name AS variant_name, v.value AS variant_value,
                   v.price_adjustment
            FROM store.order_item oi
            LEFT JOIN store.product p ON p.id = oi.product_id
            LEFT JOIN store.product_variant v ON v.id = oi.variant_id
            WHERE oi.order_id = $1
            ORDER BY oi.date_added, oi.id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }

    /// Load an order together with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, order: Order) -> Result<Cart, RepositoryError> {
        let lines = self.lines(order.id).await?;
        Ok(Cart::new(order, lines))
    }

    /// Apply a line mutation to a cart.
    ///
    /// Existing rows for the line are locked, their quantities summed (which
    /// consolidates legacy duplicates), the action applied, and the line
    /// rewritten as a single row or deleted when the result is not positive.
    ///
    /// Returns the new quantity, or `None` if the line no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn apply_line_action(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        action: LineAction,
    ) -> Result<Option<i32>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, ItemQuantityRow>(
            r"
            SELECT id, quantity
            FROM store.order_item
            WHERE order_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_all(&mut *tx)
        .await?;

        let current = existing
            .iter()
            .fold(0_i32, |sum, row| sum.saturating_add(row.quantity));
        let next = action.apply(current);

        let quantity = match existing.split_first() {
            Some((first, rest)) => {
                let stale: Vec<i32> = if next > 0 {
                    rest.iter().map(|r| r.id.as_i32()).collect()
                } else {
                    existing.iter().map(|r| r.id.as_i32()).collect()
                };
                if !stale.is_empty() {
                    sqlx::query("DELETE FROM store.order_item WHERE id = ANY($1)")
                        .bind(&stale)
                        .execute(&mut *tx)
                        .await?;
                }
                if next > 0 {
                    sqlx::query("UPDATE store.order_item SET quantity = $2 WHERE id = $1")
                        .bind(first.id)
                        .bind(next)
                        .execute(&mut *tx)
                        .await?;
                    Some(next)
                } else {
                    None
                }
            }
            None if next > 0 => {
                // The line did not exist when we looked; a concurrent request may
                // insert it first, so resolve against the unique line index.
                let conflict_update = if action.accumulates() {
                    "quantity = store.order_item.quantity + EXCLUDED.quantity"
                } else {
                    "quantity = EXCLUDED.quantity"
                };
                let quantity: i32 = sqlx::query_scalar(&format!(
                    "INSERT INTO store.order_item (order_id, product_id, variant_id, quantity)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (order_id, product_id, (COALESCE(variant_id, 0)))
                     DO UPDATE SET {conflict_update}
                     RETURNING quantity"
                ))
                .bind(order_id)
                .bind(product_id)
                .bind(variant_id)
                .bind(next)
                .fetch_one(&mut *tx)
                .await?;
                Some(quantity)
            }
            None => None,
        };

        tx.commit().await?;
        Ok(quantity)
    }

    /// Move a guest cart's lines into a customer's cart.
    ///
    /// If the customer has no cart, the guest cart is reassigned as-is.
    /// Otherwise quantities are summed into the customer's cart, the guest
    /// cart's transaction and shipping address follow its lines, and the
    /// guest cart is deleted. A started payment is never dropped: when both
    /// carts already hold a transaction, the guest cart is left untouched so
    /// its gateway reference still resolves.
    ///
    /// Returns the customer's cart, if any exists afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn merge_guest_cart(
        &self,
        token: GuestToken,
        customer_id: CustomerId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest: Option<OrderId> = sqlx::query_scalar(
            "SELECT id FROM store.order WHERE guest_token = $1 AND complete = FALSE FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(guest_id) = guest else {
            tx.commit().await?;
            return Ok(None);
        };

        let customer_cart: Option<OrderId> = sqlx::query_scalar(
            "SELECT id FROM store.order WHERE customer_id = $1 AND complete = FALSE FOR UPDATE",
        )
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(target) = customer_cart else {
            sqlx::query(
                "UPDATE store.order SET customer_id = $2, guest_token = NULL WHERE id = $1",
            )
            .bind(guest_id)
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(Some(guest_id));
        };

        let guest_paying = has_transaction(&mut *tx, guest_id).await?;
        if guest_paying && has_transaction(&mut *tx, target).await? {
            tracing::warn!(
                guest_order = %guest_id,
                customer_order = %target,
                "Both carts have a payment in progress; keeping the guest cart"
            );
            tx.commit().await?;
            return Ok(Some(target));
        }

        sqlx::query(
            r"
            INSERT INTO store.order_item (order_id, product_id, variant_id, quantity)
            SELECT $2, product_id, variant_id, SUM(quantity)::INT
            FROM store.order_item
            WHERE order_id = $1 AND product_id IS NOT NULL
            GROUP BY product_id, variant_id
            ON CONFLICT (order_id, product_id, (COALESCE(variant_id, 0)))
            DO UPDATE SET quantity = store.order_item.quantity + EXCLUDED.quantity
            ",
        )
        .bind(guest_id)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        if guest_paying {
            sqlx::query(
                "UPDATE store.transaction SET order_id = $2, updated_at = now() WHERE order_id = $1",
            )
            .bind(guest_id)
            .bind(target)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r"
                UPDATE store.order
                SET transaction_id = (SELECT transaction_id FROM store.transaction WHERE order_id = $1)
                WHERE id = $1
                ",
            )
            .bind(target)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"
            UPDATE store.shipping_address
            SET order_id = $2
            WHERE order_id = $1
              AND NOT EXISTS (SELECT 1 FROM store.shipping_address WHERE order_id = $2)
            ",
        )
        .bind(guest_id)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM store.order WHERE id = $1")
            .bind(guest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(target))
    }

    /// Link a guest cart to the customer created at checkout.
    ///
    /// Skipped when that customer already holds another open cart, since a
    /// customer may only have one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn attach_customer(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE store.order
            SET customer_id = $2
            WHERE id = $1
              AND customer_id IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM store.order other
                  WHERE other.customer_id = $2 AND other.complete = FALSE AND other.id <> $1
              )
            ",
        )
        .bind(order_id)
        .bind(customer_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Assign `reference` to the order unless it already has one.
    ///
    /// Returns the order's reference after the update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn ensure_transaction_ref(
        &self,
        order_id: OrderId,
        reference: &TransactionRef,
    ) -> Result<TransactionRef, RepositoryError> {
        let assigned: Option<TransactionRef> = sqlx::query_scalar(
            r"
            UPDATE store.order
            SET transaction_id = COALESCE(transaction_id, $2)
            WHERE id = $1
            RETURNING transaction_id
            ",
        )
        .bind(order_id)
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        assigned.ok_or(RepositoryError::NotFound)
    }

    /// Shipping address stored for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shipping_address(
        &self,
        order_id: OrderId,
    ) -> Result<Option<ShippingAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingAddressRow>(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM store.shipping_address WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShippingAddress::from))
    }

    /// Store the order's shipping address unless one is already stored.
    ///
    /// Returns the address on file after the call.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn save_shipping_address(
        &self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
        address: &NewShippingAddress,
    ) -> Result<ShippingAddress, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO store.shipping_address (customer_id, order_id, address, city, state, zipcode)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO NOTHING
            ",
        )
        .bind(customer_id)
        .bind(order_id)
        .bind(address.address.trim())
        .bind(address.city.trim())
        .bind(address.state.trim())
        .bind(address.zipcode.trim())
        .execute(self.pool)
        .await?;

        self.shipping_address(order_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Whether the customer has a completed order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_purchased(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let purchased: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM store.order o
                JOIN store.order_item oi ON oi.order_id = o.id
                WHERE o.customer_id = $1 AND o.complete AND oi.product_id = $2
            )
            ",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(purchased)
    }
}

/// Whether a payment transaction exists for the order.
async fn has_transaction(conn: &mut PgConnection, order_id: OrderId) -> Result<bool, RepositoryError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM store.transaction WHERE order_id = $1)",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// Mark an order complete and apply its stock movements.
///
/// Runs on the caller's connection so it shares the caller's transaction.
/// The conditional update makes this a no-op for an order that is already
/// complete; stock and sales counts only move on the first completion.
/// Returns whether this call completed the order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub(crate) async fn complete_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let completed = sqlx::query(
        r"
        UPDATE store.order
        SET complete = TRUE, date_completed = now()
        WHERE id = $1 AND complete = FALSE
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    if completed.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        r"
        UPDATE store.product p
        SET stock = GREATEST(p.stock - s.qty, 0),
            sales_count = p.sales_count + s.qty,
            stock_status = CASE
                WHEN p.stock - s.qty <= 0 AND p.stock_status <> 'pre_order' THEN 'out_of_stock'::store.stock_status
                ELSE p.stock_status
            END,
            updated_at = now()
        FROM (
            SELECT product_id, SUM(quantity)::INT AS qty
            FROM store.order_item
            WHERE order_id = $1 AND product_id IS NOT NULL AND quantity > 0
            GROUP BY product_id
        ) s
        WHERE p.id = s.product_id
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE store.product_variant v
        SET stock = GREATEST(v.stock - s.qty, 0)
        FROM (
            SELECT variant_id, SUM(quantity)::INT AS qty
            FROM store.order_item
            WHERE order_id = $1 AND variant_id IS NOT NULL AND quantity > 0
            GROUP BY variant_id
        ) s
        WHERE v.id = s.variant_id
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(%order_id, "order completed");
    Ok(true)
}
