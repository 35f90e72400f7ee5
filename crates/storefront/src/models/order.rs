//! Order, cart and shipping domain types.
//!
//! A cart is simply the owner's incomplete [`Order`] together with its lines.
//! Totals are computed here from catalog prices; nothing about money is ever
//! taken from the client.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use warung_core::{
    CustomerId, DiscountPercent, GuestToken, OrderId, OrderItemId, Price, ProductId,
    ShippingAddressId, TransactionRef, VariantId,
};

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    /// A customer record (registered user or identified guest).
    Customer(CustomerId),
    /// An anonymous browser session.
    Guest(GuestToken),
}

/// A cart line mutation requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Increase the quantity.
    Add(i32),
    /// Decrease the quantity.
    Remove(i32),
    /// Replace the quantity.
    Set(i32),
}

impl LineAction {
    /// Parse an action name and optional quantity.
    ///
    /// `add` and `remove` default to one unit and require a positive
    /// quantity; `set` requires an explicit quantity.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for a 400 response.
    pub fn parse(action: &str, quantity: Option<i32>) -> Result<Self, String> {
        match action.trim().to_ascii_lowercase().as_str() {
            "add" => positive(quantity.unwrap_or(1)).map(Self::Add),
            "remove" => positive(quantity.unwrap_or(1)).map(Self::Remove),
            "set" => quantity
                .map(Self::Set)
                .ok_or_else(|| "quantity is required for set".to_string()),
            other => Err(format!("unknown cart action: {other}")),
        }
    }

    /// Quantity after applying this action to `current`.
    ///
    /// A result of zero or less means the line is removed.
    #[must_use]
    pub const fn apply(self, current: i32) -> i32 {
        match self {
            Self::Add(n) => current.saturating_add(n),
            Self::Remove(n) => current.saturating_sub(n),
            Self::Set(n) => n,
        }
    }

    /// Whether a concurrent insert of the same line should be added to
    /// rather than overwritten.
    #[must_use]
    pub const fn accumulates(self) -> bool {
        matches!(self, Self::Add(_))
    }

    /// Past-tense label for response messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Add(_) => "added",
            Self::Remove(_) => "removed",
            Self::Set(_) => "updated",
        }
    }
}

fn positive(quantity: i32) -> Result<i32, String> {
    if quantity > 0 {
        Ok(quantity)
    } else {
        Err(format!("quantity must be positive (got {quantity})"))
    }
}

/// An order row.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    #[serde(skip)]
    pub guest_token: Option<GuestToken>,
    pub date_ordered: DateTime<Utc>,
    pub date_completed: Option<DateTime<Utc>>,
    pub complete: bool,
    pub transaction_id: Option<TransactionRef>,
}

/// Product fields needed to price an order line.
#[derive(Debug, Clone, Serialize)]
pub struct LineProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: Option<String>,
    pub price: Price,
    pub discount_percent: DiscountPercent,
    pub digital: bool,
}

/// Variant fields needed to price an order line.
#[derive(Debug, Clone, Serialize)]
pub struct LineVariant {
    pub id: VariantId,
    pub name: String,
    pub value: String,
    pub price_adjustment: Decimal,
}

/// One line of an order.
///
/// `product` is `None` when the product was deleted after the line was added.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub item_id: OrderItemId,
    pub quantity: i32,
    pub product: Option<LineProduct>,
    pub variant: Option<LineVariant>,
    pub date_added: DateTime<Utc>,
}

impl OrderLine {
    /// Price of a single unit: variant-adjusted if a variant is set, else the
    /// discounted product price.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        let Some(product) = &self.product else {
            return Price::zero();
        };
        let discounted = product.price.discounted(product.discount_percent);
        match &self.variant {
            Some(variant) => discounted.adjusted(variant.price_adjustment),
            None => discounted,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn total(&self) -> Price {
        self.unit_price().times(self.quantity)
    }

    fn key(&self) -> (Option<ProductId>, Option<VariantId>) {
        (
            self.product.as_ref().map(|p| p.id),
            self.variant.as_ref().map(|v| v.id),
        )
    }
}

/// An order together with its lines.
#[derive(Debug, Clone)]
pub struct Cart {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl Cart {
    /// Build a cart, merging duplicate lines for the same product and variant.
    #[must_use]
    pub fn new(order: Order, lines: Vec<OrderLine>) -> Self {
        Self {
            order,
            lines: consolidate_lines(lines),
        }
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(OrderLine::total).sum()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| i64::from(l.quantity)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line holds a physical (non-digital) product.
    #[must_use]
    pub fn needs_shipping(&self) -> bool {
        self.lines
            .iter()
            .any(|l| l.product.as_ref().is_some_and(|p| !p.digital))
    }
}

/// Merge lines that share a product and variant, summing quantities.
///
/// The first occurrence keeps its item id and position. Lines whose product
/// was deleted are never merged with each other.
#[must_use]
pub fn consolidate_lines(lines: Vec<OrderLine>) -> Vec<OrderLine> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        let key = line.key();
        let existing = key
            .0
            .and_then(|_| merged.iter_mut().find(|m| m.key() == key));
        match existing {
            Some(m) => m.quantity += line.quantity,
            None => merged.push(line),
        }
    }
    merged
}

/// A stored shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingAddress {
    pub id: ShippingAddressId,
    pub customer_id: Option<CustomerId>,
    pub order_id: OrderId,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub date_added: DateTime<Utc>,
}

/// Shipping fields submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct NewShippingAddress {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl NewShippingAddress {
    /// Whether every field has non-blank content.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.address, &self.city, &self.state, &self.zipcode]
            .iter()
            .all(|f| !f.trim().is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, discount: i32, digital: bool) -> LineProduct {
        LineProduct {
            id: ProductId::new(id),
            name: format!("Produk {id}"),
            slug: None,
            price: Price::idr(Decimal::from(price)),
            discount_percent: DiscountPercent::new(discount).unwrap(),
            digital,
        }
    }

    fn variant(id: i32, adjustment: i64) -> LineVariant {
        LineVariant {
            id: VariantId::new(id),
            name: "Warna".to_string(),
            value: "Merah".to_string(),
            price_adjustment: Decimal::from(adjustment),
        }
    }

    fn line(id: i32, quantity: i32, product: Option<LineProduct>, variant: Option<LineVariant>) -> OrderLine {
        OrderLine {
            item_id: OrderItemId::new(id),
            quantity,
            product,
            variant,
            date_added: Utc::now(),
        }
    }

    fn order() -> Order {
        Order {
            id: OrderId::new(1),
            customer_id: Some(CustomerId::new(1)),
            guest_token: None,
            date_ordered: Utc::now(),
            date_completed: None,
            complete: false,
            transaction_id: None,
        }
    }

    #[test]
    fn test_adding_twice_increments() {
        let once = LineAction::Add(1).apply(0);
        assert_eq!(LineAction::Add(1).apply(once), 2);
    }

    #[test]
    fn test_remove_to_zero_signals_deletion() {
        assert_eq!(LineAction::Remove(1).apply(1), 0);
        assert!(LineAction::Remove(3).apply(1) <= 0);
        assert_eq!(LineAction::Set(0).apply(7), 0);
    }

    #[test]
    fn test_parse_line_action() {
        assert_eq!(LineAction::parse("add", None), Ok(LineAction::Add(1)));
        assert_eq!(LineAction::parse("Remove", Some(2)), Ok(LineAction::Remove(2)));
        assert_eq!(LineAction::parse("set", Some(0)), Ok(LineAction::Set(0)));
        assert!(LineAction::parse("set", None).is_err());
        assert!(LineAction::parse("add", Some(-1)).is_err());
        assert!(LineAction::parse("delete", None).is_err());
    }

    #[test]
    fn test_only_add_accumulates() {
        assert!(LineAction::Add(1).accumulates());
        assert!(!LineAction::Set(4).accumulates());
    }

    #[test]
    fn test_line_unit_price_prefers_variant() {
        let plain = line(1, 1, Some(product(1, 200_000, 10, false)), None);
        assert_eq!(plain.unit_price().amount, Decimal::from(180_000));

        let with_variant = line(2, 1, Some(product(1, 200_000, 10, false)), Some(variant(3, -20_000)));
        assert_eq!(with_variant.unit_price().amount, Decimal::from(160_000));
    }

    #[test]
    fn test_deleted_product_contributes_zero() {
        let orphan = line(1, 4, None, None);
        assert_eq!(orphan.total(), Price::zero());
    }

    #[test]
    fn test_cart_total_is_sum_of_line_totals() {
        let cart = Cart::new(
            order(),
            vec![
                line(1, 2, Some(product(1, 50_000, 0, false)), None),
                line(2, 3, Some(product(2, 10_000, 50, true)), Some(variant(9, 1_000))),
                line(3, 1, None, None),
            ],
        );
        let expected: Price = cart.lines.iter().map(OrderLine::total).sum();
        assert_eq!(cart.total(), expected);
        assert_eq!(cart.total().amount, Decimal::from(118_000));
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_needs_shipping_only_for_physical_goods() {
        let digital = Cart::new(order(), vec![line(1, 1, Some(product(1, 1, 0, true)), None)]);
        assert!(!digital.needs_shipping());

        let mixed = Cart::new(
            order(),
            vec![
                line(1, 1, Some(product(1, 1, 0, true)), None),
                line(2, 1, Some(product(2, 1, 0, false)), None),
            ],
        );
        assert!(mixed.needs_shipping());
    }

    #[test]
    fn test_duplicate_lines_are_consolidated() {
        let cart = Cart::new(
            order(),
            vec![
                line(1, 2, Some(product(1, 1_000, 0, false)), None),
                line(2, 1, Some(product(1, 1_000, 0, false)), Some(variant(5, 0))),
                line(3, 3, Some(product(1, 1_000, 0, false)), None),
            ],
        );
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].item_id, OrderItemId::new(1));
        assert_eq!(cart.lines[0].quantity, 5);
        assert_eq!(cart.lines[1].quantity, 1);
    }

    #[test]
    fn test_orphan_lines_are_not_merged() {
        let merged = consolidate_lines(vec![line(1, 1, None, None), line(2, 1, None, None)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_shipping_address_completeness() {
        let mut address = NewShippingAddress {
            address: "Jl. Sudirman 1".to_string(),
            city: "Bandung".to_string(),
            state: "Jawa Barat".to_string(),
            zipcode: "40111".to_string(),
        };
        assert!(address.is_complete());
        address.zipcode = "  ".to_string();
        assert!(!address.is_complete());
    }
}
