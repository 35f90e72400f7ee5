//! Catalog repository: categories, products and variants.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use warung_core::{
    CategoryId, CurrencyCode, DiscountPercent, Price, ProductId, StockStatus, VariantId,
    VariantType,
};

use super::RepositoryError;
use crate::models::catalog::{
    Category, CategoryNode, Pagination, Product, ProductVariant, PRODUCTS_PER_PAGE,
    RELATED_PRODUCTS_LIMIT,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<CategoryId>,
    is_active: bool,
    icon_class: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id: row.parent_id,
            is_active: row.is_active,
            icon_class: row.icon_class,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: Option<String>,
    price: Decimal,
    discount_percent: i32,
    digital: bool,
    category_id: Option<CategoryId>,
    category_name: Option<String>,
    description: Option<String>,
    features: Option<String>,
    specifications: Option<serde_json::Value>,
    stock: i32,
    stock_status: StockStatus,
    sales_count: i32,
    rating: Decimal,
    review_count: i32,
    is_featured: bool,
    is_new: bool,
    weight: Decimal,
    dimensions: Option<String>,
    sku: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let discount_percent = DiscountPercent::new(row.discount_percent).map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            price: Price::new(row.price, CurrencyCode::IDR),
            discount_percent,
            digital: row.digital,
            category_id: row.category_id,
            category_name: row.category_name,
            description: row.description,
            features: row.features,
            specifications: row.specifications,
            stock: row.stock,
            stock_status: row.stock_status,
            sales_count: row.sales_count,
            rating: row.rating,
            review_count: row.review_count,
            is_featured: row.is_featured,
            is_new: row.is_new,
            weight: row.weight,
            dimensions: row.dimensions,
            sku: row.sku,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    variant_type: VariantType,
    name: String,
    value: String,
    color_code: Option<String>,
    price_adjustment: Decimal,
    stock: i32,
    is_default: bool,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            variant_type: row.variant_type,
            name: row.name,
            value: row.value,
            color_code: row.color_code,
            price_adjustment: row.price_adjustment,
            stock: row.stock,
            is_default: row.is_default,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryCountRow {
    category_id: CategoryId,
    count: i64,
}

// =============================================================================
// Query fragments
// =============================================================================

const PRODUCT_COLUMNS: &str = r"
    p.id, p.name, p.slug, p.price, p.discount_percent, p.digital, p.category_id,
    c.name AS category_name, p.description, p.features, p.specifications, p.stock,
    p.stock_status, p.sales_count, p.rating, p.review_count, p.is_featured, p.is_new,
    p.weight, p.dimensions, p.sku, p.created_at, p.updated_at
";

const VARIANT_COLUMNS: &str = r"
    id, product_id, variant_type, name, value, color_code, price_adjustment, stock, is_default
";

/// Listing filter. `$1` is the search pattern, `$2` the category slug or name.
///
/// The category filter covers the matched category and all of its active
/// descendants.
const LISTING_FROM: &str = r"
    FROM store.product p
    LEFT JOIN store.category c ON c.id = p.category_id
    WHERE ($1::TEXT IS NULL OR p.name ILIKE $1 OR c.name ILIKE $1)
      AND ($2::TEXT IS NULL OR p.category_id IN (
          WITH RECURSIVE subtree AS (
              SELECT id FROM store.category
              WHERE is_active AND (slug = $2 OR name = $2)
              UNION
              SELECT child.id FROM store.category child
              JOIN subtree s ON child.parent_id = s.id
              WHERE child.is_active
          )
          SELECT id FROM subtree
      ))
";

/// Product listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter<'a> {
    /// Case-insensitive substring of the product or category name.
    pub search: Option<&'a str>,
    /// Category slug or name; includes descendant categories.
    pub category: Option<&'a str>,
}

/// Build an `ILIKE` pattern matching `term` anywhere, escaping wildcards.
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products newest first, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a product row is invalid.
    #[instrument(skip(self), fields(search = ?filter.search, category = ?filter.category))]
    pub async fn list_products(
        &self,
        filter: ProductFilter<'_>,
        page: Option<i64>,
    ) -> Result<(Vec<Product>, Pagination), RepositoryError> {
        let search = filter
            .search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);
        let category = filter.category.map(str::trim).filter(|s| !s.is_empty());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {LISTING_FROM}"))
            .bind(search.as_deref())
            .bind(category)
            .fetch_one(self.pool)
            .await?;

        let pagination = Pagination::resolve(page, total, PRODUCTS_PER_PAGE);

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} {LISTING_FROM}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(search.as_deref())
        .bind(category)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((products, pagination))
    }

    /// Distinct category names that have at least one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_names(&self) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT c.name
            FROM store.category c
            JOIN store.product p ON p.category_id = c.id
            ORDER BY c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(names)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the product row is invalid.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM store.product p
             LEFT JOIN store.category c ON c.id = p.category_id
             WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Up to four other products from the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a product row is invalid.
    pub async fn related_products(&self, product: &Product) -> Result<Vec<Product>, RepositoryError> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM store.product p
             LEFT JOIN store.category c ON c.id = p.category_id
             WHERE p.category_id = $1 AND p.id <> $2
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $3"
        ))
        .bind(category_id)
        .bind(product.id)
        .bind(RELATED_PRODUCTS_LIMIT)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Variants of a product, default variant first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants(&self, product_id: ProductId) -> Result<Vec<ProductVariant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS}
             FROM store.product_variant
             WHERE product_id = $1
             ORDER BY is_default DESC, id"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductVariant::from).collect())
    }

    /// Get a variant by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM store.product_variant WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ProductVariant::from))
    }

    /// Get an active category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_category(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, slug, description, parent_id, is_active, icon_class, created_at
            FROM store.category
            WHERE slug = $1 AND is_active
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Active category tree with product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn category_tree(&self) -> Result<Vec<CategoryNode>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, slug, description, parent_id, is_active, icon_class, created_at
            FROM store.category
            WHERE is_active
            ORDER BY name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let counts = sqlx::query_as::<_, CategoryCountRow>(
            r"
            SELECT category_id, COUNT(*) AS count
            FROM store.product
            WHERE category_id IS NOT NULL
            GROUP BY category_id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let direct: HashMap<CategoryId, i64> =
            counts.into_iter().map(|r| (r.category_id, r.count)).collect();

        Ok(build_category_tree(
            categories.into_iter().map(Category::from).collect(),
            &direct,
        ))
    }
}

/// Assemble active categories into a tree rooted at categories without an
/// active parent, summing product counts over each subtree.
///
/// Categories whose parent is missing from `categories` (inactive or deleted)
/// are dropped together with their subtree, except true roots.
fn build_category_tree(
    categories: Vec<Category>,
    direct_counts: &HashMap<CategoryId, i64>,
) -> Vec<CategoryNode> {
    let mut children: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();
    for category in categories {
        children.entry(category.parent_id).or_default().push(category);
    }

    children
        .remove(&None)
        .unwrap_or_default()
        .into_iter()
        .map(|root| attach(root, &mut children, direct_counts))
        .collect()
}

/// Build the node for `category`, consuming its children from `children`.
fn attach(
    category: Category,
    children: &mut HashMap<Option<CategoryId>, Vec<Category>>,
    direct_counts: &HashMap<CategoryId, i64>,
) -> CategoryNode {
    let kids: Vec<CategoryNode> = children
        .remove(&Some(category.id))
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach(child, children, direct_counts))
        .collect();
    let own = direct_counts.get(&category.id).copied().unwrap_or(0);
    let product_count = own + kids.iter().map(|k| k.product_count).sum::<i64>();

    CategoryNode {
        category,
        product_count,
        children: kids,
    }
}
