//! Cart route handlers.
//!
//! Logged-in visitors use their customer's cart; anonymous visitors get a
//! guest cart tied to their session (see [`CartSession`]).

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use warung_core::{OrderId, OrderItemId, ProductId, VariantId};

use crate::error::{AppError, Result};
use crate::middleware::CartSession;
use crate::models::{Cart, LineAction, LineVariant, OrderLine};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: OrderItemId,
    /// `None` when the product was deleted.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub slug: Option<String>,
    pub variant: Option<LineVariant>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub digital: bool,
}

impl From<&OrderLine> for CartItemView {
    fn from(line: &OrderLine) -> Self {
        Self {
            id: line.item_id,
            product_id: line.product.as_ref().map(|p| p.id),
            name: line
                .product
                .as_ref()
                .map_or_else(|| "Unavailable product".to_string(), |p| p.name.clone()),
            slug: line.product.as_ref().and_then(|p| p.slug.clone()),
            variant: line.variant.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price().amount,
            line_total: line.total().amount,
            digital: line.product.as_ref().is_some_and(|p| p.digital),
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub order_id: Option<OrderId>,
    pub items: Vec<CartItemView>,
    pub total: Decimal,
    pub item_count: i64,
    pub shipping_required: bool,
}

impl CartView {
    /// A visitor without a cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            order_id: None,
            items: Vec::new(),
            total: Decimal::ZERO,
            item_count: 0,
            shipping_required: false,
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            order_id: Some(cart.order.id),
            items: cart.lines.iter().map(CartItemView::from).collect(),
            total: cart.total().amount,
            item_count: cart.item_count(),
            shipping_required: cart.needs_shipping(),
        }
    }
}

impl From<Option<&Cart>> for CartView {
    fn from(cart: Option<&Cart>) -> Self {
        cart.map_or_else(Self::empty, Self::from)
    }
}

/// Body of `POST /cart/update-item`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    #[serde(alias = "productId")]
    pub product_id: ProductId,
    #[serde(default, alias = "variantId")]
    pub variant_id: Option<VariantId>,
    pub action: String,
    #[serde(default)]
    pub quantity: Option<i32>,
}

/// Response of a cart mutation.
#[derive(Debug, Serialize)]
pub struct UpdateItemResponse {
    pub message: String,
    /// Absent when the line was removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    pub cart_item_count: i64,
    pub cart_total: Decimal,
}

/// Current cart.
#[instrument(skip(state, cart))]
pub async fn show(State(state): State<AppState>, cart: CartSession) -> Result<Json<CartView>> {
    let current = CartService::new(state.pool()).current(cart.owner()).await?;
    Ok(Json(CartView::from(current.as_ref())))
}

/// Add, remove or set the quantity of a cart line.
#[instrument(skip(state, cart), fields(product_id = %request.product_id))]
pub async fn update_item(
    State(state): State<AppState>,
    mut cart: CartSession,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<UpdateItemResponse>> {
    let action =
        LineAction::parse(&request.action, request.quantity).map_err(AppError::BadRequest)?;
    let owner = cart.owner_or_create().await?;

    let update = CartService::new(state.pool())
        .update_item(owner, request.product_id, request.variant_id, action)
        .await?;

    Ok(Json(UpdateItemResponse {
        message: update.message,
        quantity: update.quantity,
        cart_item_count: update.cart.item_count(),
        cart_total: update.cart.total().amount,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_accepts_camel_case_product_id() {
        let camel: UpdateItemRequest =
            serde_json::from_str(r#"{"productId": 7, "action": "add"}"#).unwrap();
        let snake: UpdateItemRequest =
            serde_json::from_str(r#"{"product_id": 7, "variant_id": 2, "action": "set", "quantity": 3}"#)
                .unwrap();
        assert_eq!(camel.product_id, ProductId::new(7));
        assert!(camel.variant_id.is_none());
        assert_eq!(snake.variant_id, Some(VariantId::new(2)));
        assert_eq!(snake.quantity, Some(3));
    }

    #[test]
    fn test_removed_line_omits_quantity() {
        let body = serde_json::to_value(UpdateItemResponse {
            message: "Item removed from cart".to_string(),
            quantity: None,
            cart_item_count: 0,
            cart_total: Decimal::ZERO,
        })
        .unwrap();
        assert!(body.get("quantity").is_none());
        assert_eq!(body["cart_total"], "0");
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::from(None);
        assert!(view.items.is_empty());
        assert_eq!(view.item_count, 0);
        assert!(!view.shipping_required);
    }
}
