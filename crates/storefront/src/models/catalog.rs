//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use warung_core::{
    CategoryId, DiscountPercent, Price, ProductId, Rating, ReviewId, StockStatus, UserId,
    VariantId, VariantType,
};

/// Products shown per listing page.
pub const PRODUCTS_PER_PAGE: i64 = 12;

/// Maximum number of related products on a product page.
pub const RELATED_PRODUCTS_LIMIT: i64 = 4;

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub icon_class: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A category with its product count and active children.
///
/// `product_count` covers the category and all of its descendants.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
    pub children: Vec<CategoryNode>,
}

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Option<String>,
    pub price: Price,
    pub discount_percent: DiscountPercent,
    pub digital: bool,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub description: Option<String>,
    pub features: Option<String>,
    pub specifications: Option<serde_json::Value>,
    pub stock: i32,
    pub stock_status: StockStatus,
    pub sales_count: i32,
    /// Average review rating, one decimal place.
    pub rating: Decimal,
    pub review_count: i32,
    pub is_featured: bool,
    pub is_new: bool,
    pub weight: Decimal,
    pub dimensions: Option<String>,
    pub sku: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price after the product's percentage discount.
    #[must_use]
    pub fn discounted_price(&self) -> Price {
        self.price.discounted(self.discount_percent)
    }

    #[must_use]
    pub const fn has_discount(&self) -> bool {
        !self.discount_percent.is_zero()
    }

    /// Share of the original stock still available, in percent.
    ///
    /// `stock / (sales_count + stock) * 100`, or 100 when nothing was ever
    /// stocked or sold.
    #[must_use]
    pub fn stock_percentage(&self) -> Decimal {
        let total = i64::from(self.sales_count) + i64::from(self.stock);
        if total <= 0 {
            return Decimal::ONE_HUNDRED;
        }
        (Decimal::from(self.stock) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(1)
    }

    /// Non-empty lines of the newline-separated features text.
    #[must_use]
    pub fn features_list(&self) -> Vec<&str> {
        self.features
            .as_deref()
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A purchasable variant of a product (color, size, ...).
#[derive(Debug, Clone, Serialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub variant_type: VariantType,
    pub name: String,
    pub value: String,
    pub color_code: Option<String>,
    /// Signed adjustment applied on top of the discounted product price.
    pub price_adjustment: Decimal,
    pub stock: i32,
    pub is_default: bool,
}

impl ProductVariant {
    /// Discounted product price plus this variant's adjustment.
    #[must_use]
    pub fn adjusted_price(&self, product_price: Price, discount: DiscountPercent) -> Price {
        product_price
            .discounted(discount)
            .adjusted(self.price_adjustment)
    }
}

/// A customer review of a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReview {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub username: String,
    pub rating: Rating,
    pub review_text: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

/// Page metadata for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    /// Resolve a requested page against the total item count.
    ///
    /// Missing or non-positive pages resolve to 1; pages past the end clamp to
    /// the last page. An empty listing has a single empty page.
    #[must_use]
    pub fn resolve(requested: Option<i64>, total_items: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let total_items = total_items.max(0);
        let total_pages = ((total_items + per_page - 1) / per_page).max(1);
        let page = requested.unwrap_or(1).clamp(1, total_pages);

        Self {
            page,
            per_page,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    /// Row offset of the current page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: i64, discount: i32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Kopi Gayo 250g".to_string(),
            slug: Some("kopi-gayo-250g".to_string()),
            price: Price::idr(Decimal::from(price)),
            discount_percent: DiscountPercent::new(discount).unwrap(),
            digital: false,
            category_id: None,
            category_name: None,
            description: None,
            features: Some("Arabika\n\n  Single origin  \n".to_string()),
            specifications: None,
            stock: 30,
            stock_status: StockStatus::Available,
            sales_count: 10,
            rating: Decimal::new(50, 1),
            review_count: 0,
            is_featured: false,
            is_new: true,
            weight: Decimal::ZERO,
            dimensions: None,
            sku: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discounted_price() {
        let p = product(120_000, 25);
        assert!(p.has_discount());
        assert_eq!(p.discounted_price().amount, Decimal::from(90_000));
        assert!(!product(120_000, 0).has_discount());
    }

    #[test]
    fn test_variant_adjusted_price_applies_after_discount() {
        let p = product(100_000, 10);
        let variant = ProductVariant {
            id: VariantId::new(1),
            product_id: p.id,
            variant_type: VariantType::Size,
            name: "Ukuran".to_string(),
            value: "1kg".to_string(),
            color_code: None,
            price_adjustment: Decimal::from(15_000),
            stock: 5,
            is_default: false,
        };
        let price = variant.adjusted_price(p.price, p.discount_percent);
        assert_eq!(price.amount, Decimal::from(105_000));
    }

    #[test]
    fn test_stock_percentage() {
        assert_eq!(product(1, 0).stock_percentage(), Decimal::from(75));
        let mut empty = product(1, 0);
        empty.stock = 0;
        empty.sales_count = 0;
        assert_eq!(empty.stock_percentage(), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_features_list_skips_blank_lines() {
        assert_eq!(product(1, 0).features_list(), vec!["Arabika", "Single origin"]);
    }

    #[test]
    fn test_pagination_clamps_out_of_range() {
        let page = Pagination::resolve(Some(99), 25, 12);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_next);
        assert!(page.has_previous);
        assert_eq!(page.offset(), 24);
    }

    #[test]
    fn test_pagination_non_positive_is_first_page() {
        let page = Pagination::resolve(Some(-4), 25, 12);
        assert_eq!(page.page, 1);
        assert!(page.has_next);
        assert!(!page.has_previous);
        assert_eq!(Pagination::resolve(None, 25, 12).page, 1);
    }

    #[test]
    fn test_pagination_empty_listing() {
        let page = Pagination::resolve(Some(2), 0, 12);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
    }
}
