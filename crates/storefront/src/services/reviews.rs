//! Product reviews.

use sqlx::PgPool;
use tracing::{info, instrument};

use warung_core::{ProductId, Rating};

use crate::db::reviews::SavedReview;
use crate::db::{CatalogRepository, OrderRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::models::CurrentUser;

/// Longest accepted review text, in characters.
const MAX_REVIEW_LENGTH: usize = 5000;

/// Review service.
pub struct ReviewService<'a> {
    catalog: CatalogRepository<'a>,
    orders: OrderRepository<'a>,
    reviews: ReviewRepository<'a>,
}

impl<'a> ReviewService<'a> {
    /// Create a new review service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            catalog: CatalogRepository::new(pool),
            orders: OrderRepository::new(pool),
            reviews: ReviewRepository::new(pool),
        }
    }

    /// Create or update the user's review of a product.
    ///
    /// A new review is marked as a verified purchase when the user has a
    /// completed order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the rating is outside 1..=5 or the
    /// text is too long.
    /// Returns `AppError::NotFound` if the product does not exist.
    #[instrument(skip(self, user, text), fields(user_id = %user.id))]
    pub async fn add_review(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        rating: i32,
        text: &str,
    ) -> Result<SavedReview> {
        let rating = Rating::try_from(rating).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let text = validate_text(text)?;

        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        let verified = self.orders.has_purchased(user.customer_id, product_id).await?;
        let saved = self
            .reviews
            .save(product_id, user.id, rating, text, verified)
            .await?;

        info!(
            review_id = %saved.id,
            created = saved.created,
            product_rating = %saved.product_rating,
            review_count = saved.review_count,
            "Review saved"
        );

        Ok(saved)
    }
}

fn validate_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.chars().count() > MAX_REVIEW_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Review must be at most {MAX_REVIEW_LENGTH} characters"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_text_is_trimmed() {
        assert!(matches!(validate_text("  Bagus sekali \n"), Ok("Bagus sekali")));
    }

    #[test]
    fn test_review_text_length_limit() {
        assert!(validate_text(&"a".repeat(MAX_REVIEW_LENGTH)).is_ok());
        assert!(matches!(
            validate_text(&"a".repeat(MAX_REVIEW_LENGTH + 1)),
            Err(AppError::BadRequest(_))
        ));
    }
}
