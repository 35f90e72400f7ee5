//! Seed the catalog from a YAML file.
//!
//! Categories and products are upserted by slug, so the same file can be
//! loaded repeatedly. Variants are matched by product, type and value.
//!
//! ```yaml
//! categories:
//!   - name: Minuman
//!     slug: minuman
//!     children:
//!       - name: Kopi
//!         slug: kopi
//! products:
//!   - name: Kopi Gayo 250g
//!     slug: kopi-gayo-250g
//!     category: kopi
//!     price: 85000
//!     discount_percent: 10
//!     stock: 30
//!     variants:
//!       - variant_type: size
//!         name: Ukuran
//!         value: 1kg
//!         price_adjustment: 150000
//!         stock: 5
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info};

use warung_core::{CategoryId, DiscountPercent, ProductId, StockStatus, VariantType};
use warung_storefront::db;

/// Errors from seeding the catalog.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The file is not valid catalog YAML.
    #[error("Invalid catalog file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The catalog failed validation.
    #[error("{0} validation errors found")]
    Invalid(usize),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Top-level catalog file.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// A category and its subcategories.
#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_class: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub children: Vec<CategorySeed>,
}

/// A product with its variants.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub slug: String,
    /// Slug of the product's category.
    #[serde(default)]
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: DiscountPercent,
    #[serde(default)]
    pub digital: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Option<String>,
    #[serde(default)]
    pub specifications: Option<serde_json::Value>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub stock_status: StockStatus,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_new: bool,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

/// A product variant.
#[derive(Debug, Deserialize)]
pub struct VariantSeed {
    #[serde(default)]
    pub variant_type: VariantType,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub color_code: Option<String>,
    #[serde(default)]
    pub price_adjustment: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub is_default: bool,
}

const fn default_true() -> bool {
    true
}

/// Counts of rows written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub variants: usize,
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails
/// validation, or a database write fails. All writes happen in one
/// transaction.
pub async fn catalog(path: &Path) -> Result<(), SeedError> {
    let database_url = super::database_url().map_err(SeedError::MissingEnvVar)?;

    info!(path = %path.display(), "Loading catalog from file");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let summary = write_catalog(&pool, &file).await?;

    info!("Seeding complete");
    info!("  Categories: {}", summary.categories);
    info!("  Products: {}", summary.products);
    info!("  Variants: {}", summary.variants);

    Ok(())
}

/// Check slugs, category references, prices and stock.
///
/// Returns one message per problem; an empty list means the file is valid.
#[must_use]
pub fn validate(file: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_slugs = HashSet::new();
    let mut pending: Vec<&CategorySeed> = file.categories.iter().collect();
    while let Some(category) = pending.pop() {
        if category.slug.trim().is_empty() {
            errors.push(format!("category '{}' has an empty slug", category.name));
        } else if !category_slugs.insert(category.slug.as_str()) {
            errors.push(format!("duplicate category slug '{}'", category.slug));
        }
        pending.extend(category.children.iter());
    }

    let mut product_slugs = HashSet::new();
    for product in &file.products {
        if !product_slugs.insert(product.slug.as_str()) {
            errors.push(format!("duplicate product slug '{}'", product.slug));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("product '{}' has a negative price", product.slug));
        }
        if product.stock < 0 {
            errors.push(format!("product '{}' has negative stock", product.slug));
        }
        if let Some(category) = &product.category
            && !category_slugs.contains(category.as_str())
        {
            errors.push(format!(
                "product '{}' references unknown category '{category}'",
                product.slug
            ));
        }
        for variant in &product.variants {
            if variant.stock < 0 {
                errors.push(format!(
                    "variant '{}' of product '{}' has negative stock",
                    variant.value, product.slug
                ));
            }
        }
    }

    errors
}

async fn write_catalog(pool: &PgPool, file: &CatalogFile) -> Result<SeedSummary, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    // Parents before children
    let mut pending: Vec<(&CategorySeed, Option<CategoryId>)> =
        file.categories.iter().map(|c| (c, None)).collect();
    while let Some((category, parent_id)) = pending.pop() {
        let id: CategoryId = sqlx::query_scalar(
            r"
            INSERT INTO store.category (name, slug, description, parent_id, is_active, icon_class)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (slug) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                parent_id = EXCLUDED.parent_id,
                is_active = EXCLUDED.is_active,
                icon_class = EXCLUDED.icon_class
            RETURNING id
            ",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(parent_id)
        .bind(category.is_active)
        .bind(&category.icon_class)
        .fetch_one(&mut *tx)
        .await?;

        summary.categories += 1;
        pending.extend(category.children.iter().map(|c| (c, Some(id))));
    }

    for product in &file.products {
        let product_id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO store.product (
                name, slug, price, discount_percent, digital, category_id, description,
                features, specifications, stock, stock_status, is_featured, is_new,
                weight, dimensions, sku
            )
            VALUES (
                $1, $2, $3, $4, $5,
                (SELECT id FROM store.category WHERE slug = $6),
                $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
            )
            ON CONFLICT (slug) DO UPDATE
            SET name = EXCLUDED.name,
                price = EXCLUDED.price,
                discount_percent = EXCLUDED.discount_percent,
                digital = EXCLUDED.digital,
                category_id = EXCLUDED.category_id,
                description = EXCLUDED.description,
                features = EXCLUDED.features,
                specifications = EXCLUDED.specifications,
                stock = EXCLUDED.stock,
                stock_status = EXCLUDED.stock_status,
                is_featured = EXCLUDED.is_featured,
                is_new = EXCLUDED.is_new,
                weight = EXCLUDED.weight,
                dimensions = EXCLUDED.dimensions,
                sku = EXCLUDED.sku,
                updated_at = now()
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(&product.slug)
        .bind(product.price)
        .bind(i32::from(product.discount_percent))
        .bind(product.digital)
        .bind(&product.category)
        .bind(&product.description)
        .bind(&product.features)
        .bind(&product.specifications)
        .bind(product.stock)
        .bind(product.stock_status)
        .bind(product.is_featured)
        .bind(product.is_new)
        .bind(product.weight)
        .bind(&product.dimensions)
        .bind(&product.sku)
        .fetch_one(&mut *tx)
        .await?;

        summary.products += 1;

        for variant in &product.variants {
            let updated = sqlx::query(
                r"
                UPDATE store.product_variant
                SET name = $4,
                    color_code = $5,
                    price_adjustment = $6,
                    stock = $7,
                    is_default = $8
                WHERE product_id = $1 AND variant_type = $2 AND value = $3
                ",
            )
            .bind(product_id)
            .bind(variant.variant_type)
            .bind(&variant.value)
            .bind(&variant.name)
            .bind(&variant.color_code)
            .bind(variant.price_adjustment)
            .bind(variant.stock)
            .bind(variant.is_default)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                sqlx::query(
                    r"
                    INSERT INTO store.product_variant (
                        product_id, variant_type, value, name, color_code,
                        price_adjustment, stock, is_default
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ",
                )
                .bind(product_id)
                .bind(variant.variant_type)
                .bind(&variant.value)
                .bind(&variant.name)
                .bind(&variant.color_code)
                .bind(variant.price_adjustment)
                .bind(variant.stock)
                .bind(variant.is_default)
                .execute(&mut *tx)
                .await?;
            }

            summary.variants += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}
