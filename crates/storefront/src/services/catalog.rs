//! Catalog reads with a short-lived cache for the category tree.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use warung_core::ProductId;

use crate::db::catalog::ProductFilter;
use crate::db::{CatalogRepository, RepositoryError, ReviewRepository};
use crate::models::{Category, CategoryNode, Pagination, Product, ProductReview, ProductVariant};

/// How long cached category data is served before it is reloaded.
const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    Tree,
    Names,
}

#[derive(Clone)]
enum CacheValue {
    Tree(Arc<Vec<CategoryNode>>),
    Names(Arc<Vec<String>>),
}

/// Cache for category data shown on every listing page.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Cache<CacheKey, CacheValue>,
}

impl CatalogCache {
    /// Create an empty cache (5-minute TTL).
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(16)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A page of products plus the category names for the filter dropdown.
#[derive(Debug, Clone)]
pub struct ProductListing {
    pub products: Vec<Product>,
    pub pagination: Pagination,
    pub categories: Arc<Vec<String>>,
}

/// Everything shown on a product page.
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub reviews: Vec<ProductReview>,
    pub related: Vec<Product>,
}

/// A category with a page of its products.
#[derive(Debug, Clone)]
pub struct CategoryDetail {
    pub category: Category,
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

/// Catalog service.
pub struct CatalogService<'a> {
    catalog: CatalogRepository<'a>,
    reviews: ReviewRepository<'a>,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self {
            catalog: CatalogRepository::new(pool),
            reviews: ReviewRepository::new(pool),
            cache,
        }
    }

    /// Search and filter products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        page: Option<i64>,
    ) -> Result<ProductListing, RepositoryError> {
        let (products, pagination) = self
            .catalog
            .list_products(ProductFilter { search, category }, page)
            .await?;
        let categories = self.category_names().await?;

        Ok(ProductListing {
            products,
            pagination,
            categories,
        })
    }

    /// Distinct names of categories that have products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn category_names(&self) -> Result<Arc<Vec<String>>, RepositoryError> {
        if let Some(CacheValue::Names(names)) = self.cache.inner.get(&CacheKey::Names).await {
            debug!("Cache hit for category names");
            return Ok(names);
        }

        let names = Arc::new(self.catalog.category_names().await?);
        self.cache
            .inner
            .insert(CacheKey::Names, CacheValue::Names(Arc::clone(&names)))
            .await;

        Ok(names)
    }

    /// Product page data, or `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self))]
    pub async fn product_detail(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = self.catalog.get_product(id).await? else {
            return Ok(None);
        };

        let variants = self.catalog.variants(id).await?;
        let reviews = self.reviews.for_product(id).await?;
        let related = self.catalog.related_products(&product).await?;

        Ok(Some(ProductDetail {
            product,
            variants,
            reviews,
            related,
        }))
    }

    /// Active root categories with their active children and product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn category_tree(&self) -> Result<Arc<Vec<CategoryNode>>, RepositoryError> {
        if let Some(CacheValue::Tree(tree)) = self.cache.inner.get(&CacheKey::Tree).await {
            debug!("Cache hit for category tree");
            return Ok(tree);
        }

        let tree = Arc::new(self.catalog.category_tree().await?);
        self.cache
            .inner
            .insert(CacheKey::Tree, CacheValue::Tree(Arc::clone(&tree)))
            .await;

        Ok(tree)
    }

    /// An active category with a page of products from it and its active
    /// descendants, or `None` if the category is missing or inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self))]
    pub async fn category_detail(
        &self,
        slug: &str,
        page: Option<i64>,
    ) -> Result<Option<CategoryDetail>, RepositoryError> {
        let Some(category) = self.catalog.get_active_category(slug).await? else {
            return Ok(None);
        };

        let filter = ProductFilter {
            search: None,
            category: Some(&category.slug),
        };
        let (products, pagination) = self.catalog.list_products(filter, page).await?;

        Ok(Some(CategoryDetail {
            category,
            products,
            pagination,
        }))
    }
}
