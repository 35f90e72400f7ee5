//! Catalog route handlers: product listing, product pages and categories.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use warung_core::{CategoryId, CurrencyCode, DiscountPercent, ProductId, StockStatus};

use crate::error::{AppError, Result};
use crate::models::{CategoryNode, Pagination, Product, ProductReview, ProductVariant};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// Product display data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub slug: Option<String>,
    pub price: Decimal,
    pub discounted_price: Decimal,
    pub discount_percent: DiscountPercent,
    pub has_discount: bool,
    pub currency_code: CurrencyCode,
    pub digital: bool,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub stock: i32,
    pub stock_status: StockStatus,
    pub stock_percentage: Decimal,
    pub sales_count: i32,
    pub rating: Decimal,
    pub review_count: i32,
    pub is_featured: bool,
    pub is_new: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.price.amount,
            discounted_price: product.discounted_price().amount,
            discount_percent: product.discount_percent,
            has_discount: product.has_discount(),
            currency_code: product.price.currency_code,
            digital: product.digital,
            category_id: product.category_id,
            category_name: product.category_name.clone(),
            stock: product.stock,
            stock_status: product.stock_status,
            stock_percentage: product.stock_percentage(),
            sales_count: product.sales_count,
            rating: product.rating,
            review_count: product.review_count,
            is_featured: product.is_featured,
            is_new: product.is_new,
            created_at: product.created_at,
        }
    }
}

/// Full product page data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetailView {
    #[serde(flatten)]
    pub product: ProductView,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub specifications: Option<serde_json::Value>,
    pub weight: Decimal,
    pub dimensions: Option<String>,
    pub sku: Option<String>,
    pub variants: Vec<VariantView>,
    pub reviews: Vec<ProductReview>,
    pub related_products: Vec<ProductView>,
}

/// Variant display data with its final price.
#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub price: Decimal,
}

/// Product listing response.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListView {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
    pub categories: Vec<String>,
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Category tree response.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryListView {
    pub categories: Vec<CategoryNode>,
}

/// Category page response.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDetailView {
    pub category: crate::models::Category,
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
}

/// Page query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Parse a page parameter; anything that is not an integer means page 1.
fn parse_page(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|p| p.trim().parse().ok())
}

/// Blank query values are treated as absent.
fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Product listing with search, category filter and pagination.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<ProductListView>> {
    let search = non_empty(query.search.as_deref());
    let category = non_empty(query.category.as_deref());

    let listing = CatalogService::new(state.pool(), state.catalog_cache())
        .list_products(search, category, parse_page(query.page.as_deref()))
        .await?;

    Ok(Json(ProductListView {
        products: listing.products.iter().map(ProductView::from).collect(),
        pagination: listing.pagination,
        categories: listing.categories.as_ref().clone(),
        search: search.map(String::from),
        category: category.map(String::from),
    }))
}

/// Product detail with variants, reviews and related products.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetailView>> {
    let detail = CatalogService::new(state.pool(), state.catalog_cache())
        .product_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let product = &detail.product;
    let variants = detail
        .variants
        .into_iter()
        .map(|variant| VariantView {
            price: variant
                .adjusted_price(product.price, product.discount_percent)
                .amount,
            variant,
        })
        .collect();

    Ok(Json(ProductDetailView {
        product: ProductView::from(product),
        description: product.description.clone(),
        features: product.features_list().into_iter().map(String::from).collect(),
        specifications: product.specifications.clone(),
        weight: product.weight,
        dimensions: product.dimensions.clone(),
        sku: product.sku.clone(),
        variants,
        reviews: detail.reviews,
        related_products: detail.related.iter().map(ProductView::from).collect(),
    }))
}

/// Active root categories with children and product counts.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<CategoryListView>> {
    let tree = CatalogService::new(state.pool(), state.catalog_cache())
        .category_tree()
        .await?;

    Ok(Json(CategoryListView {
        categories: tree.as_ref().clone(),
    }))
}

/// A category and a page of its products (including subcategories).
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryDetailView>> {
    let detail = CatalogService::new(state.pool(), state.catalog_cache())
        .category_detail(&slug, parse_page(query.page.as_deref()))
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(CategoryDetailView {
        category: detail.category,
        products: detail.products.iter().map(ProductView::from).collect(),
        pagination: detail.pagination,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_is_lenient() {
        assert_eq!(parse_page(Some("3")), Some(3));
        assert_eq!(parse_page(Some(" 2 ")), Some(2));
        assert_eq!(parse_page(Some("abc")), None);
        assert_eq!(parse_page(None), None);
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" kopi ")), Some("kopi"));
    }
}
