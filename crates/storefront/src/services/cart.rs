//! Cart operations.

use sqlx::PgPool;
use tracing::instrument;

use warung_core::{CustomerId, GuestToken, ProductId, VariantId};

use crate::db::{CatalogRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::models::{Cart, CartOwner, LineAction};

/// Result of a cart mutation.
#[derive(Debug, Clone)]
pub struct CartUpdate {
    pub message: String,
    /// Line quantity after the update; `None` if the line was removed.
    pub quantity: Option<i32>,
    pub cart: Cart,
}

/// Cart service.
pub struct CartService<'a> {
    catalog: CatalogRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            catalog: CatalogRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// The owner's cart, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn current(&self, owner: Option<CartOwner>) -> Result<Option<Cart>> {
        let Some(owner) = owner else {
            return Ok(None);
        };
        let Some(order) = self.orders.find_cart(owner).await? else {
            return Ok(None);
        };
        Ok(Some(self.orders.load(order).await?))
    }

    /// Add, remove or set the quantity of a product (and variant) in the
    /// owner's cart, creating the cart if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product or variant does not exist.
    /// Returns `AppError::BadRequest` if the variant belongs to another product.
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        owner: CartOwner,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        action: LineAction,
    ) -> Result<CartUpdate> {
        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        if let Some(variant_id) = variant_id {
            let variant = self
                .catalog
                .get_variant(variant_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Variant not found".to_string()))?;
            if variant.product_id != product_id {
                return Err(AppError::BadRequest(
                    "Variant does not belong to this product".to_string(),
                ));
            }
        }

        let order = self.orders.get_or_create_cart(owner).await?;
        let quantity = self
            .orders
            .apply_line_action(order.id, product_id, variant_id, action)
            .await?;
        let cart = self.orders.load(order).await?;

        let message = if quantity.is_some() {
            format!("Item {}", action.verb())
        } else {
            "Item removed from cart".to_string()
        };

        Ok(CartUpdate {
            message,
            quantity,
            cart,
        })
    }

    /// Move the guest cart into the customer's cart after login.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn merge_guest_cart(
        &self,
        token: GuestToken,
        customer_id: CustomerId,
    ) -> Result<()> {
        if let Some(order_id) = self.orders.merge_guest_cart(token, customer_id).await? {
            tracing::info!(%order_id, %customer_id, "Merged guest cart");
        }
        Ok(())
    }
}
