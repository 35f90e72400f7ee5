//! Review repository and product rating aggregation.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use tracing::instrument;

use warung_core::{ProductId, Rating, ReviewId, UserId};

use super::RepositoryError;
use crate::models::catalog::ProductReview;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    username: String,
    rating: i32,
    review_text: String,
    is_verified_purchase: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for ProductReview {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::try_from(row.rating)
            .map_err(|e| RepositoryError::DataCorruption(format!("review {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            username: row.username,
            rating,
            review_text: row.review_text,
            is_verified_purchase: row.is_verified_purchase,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SavedReviewRow {
    id: ReviewId,
    created: bool,
}

/// Outcome of saving a review.
#[derive(Debug, Clone)]
pub struct SavedReview {
    pub id: ReviewId,
    /// `true` for a new review, `false` when the user's review was updated.
    pub created: bool,
    /// Product rating after the write.
    pub product_rating: Decimal,
    /// Product review count after the write.
    pub review_count: i32,
}

/// Rating assigned to products without reviews.
const DEFAULT_RATING: Decimal = Decimal::from_parts(50, 0, 0, false, 1);

/// Average rating (one decimal, half away from zero) and count.
///
/// No reviews yields the default rating of 5.0.
fn rating_summary(ratings: &[i32]) -> (Decimal, i32) {
    let count = i32::try_from(ratings.len()).unwrap_or(i32::MAX);
    if ratings.is_empty() {
        return (DEFAULT_RATING, 0);
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let average = (Decimal::from(sum) / Decimal::from(count))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    (average, count)
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored rating is out of range.
    pub async fn for_product(&self, product_id: ProductId) -> Result<Vec<ProductReview>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.username, r.rating, r.review_text,
                   r.is_verified_purchase, r.created_at
            FROM store.product_review r
            JOIN store.user u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(ProductReview::try_from).collect()
    }

    /// Create or update the user's review of a product and refresh the
    /// product's rating and review count.
    ///
    /// `verified_purchase` is only recorded when the review is created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, text))]
    pub async fn save(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: Rating,
        text: &str,
        verified_purchase: bool,
    ) -> Result<SavedReview, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // xmax = 0 only for freshly inserted tuples.
        let saved = sqlx::query_as::<_, SavedReviewRow>(
            r"
            INSERT INTO store.product_review (product_id, user_id, rating, review_text, is_verified_purchase)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id, user_id) DO UPDATE
            SET rating = EXCLUDED.rating, review_text = EXCLUDED.review_text
            RETURNING id, (xmax = 0) AS created
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(i32::from(rating))
        .bind(text)
        .bind(verified_purchase)
        .fetch_one(&mut *tx)
        .await?;

        // Lock the product row so concurrent reviews aggregate serially.
        sqlx::query("SELECT id FROM store.product WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let ratings: Vec<i32> =
            sqlx::query_scalar("SELECT rating FROM store.product_review WHERE product_id = $1")
                .bind(product_id)
                .fetch_all(&mut *tx)
                .await?;

        let (product_rating, review_count) = rating_summary(&ratings);

        sqlx::query(
            r"
            UPDATE store.product
            SET rating = $2, review_count = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .bind(product_rating)
        .bind(review_count)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SavedReview {
            id: saved.id,
            created: saved.created,
            product_rating,
            review_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary_rounds_to_one_decimal() {
        // 14 / 3 = 4.666..
        assert_eq!(rating_summary(&[5, 5, 4]), (Decimal::new(47, 1), 3));
        // 4.25 rounds half away from zero
        assert_eq!(rating_summary(&[5, 4, 4, 4]), (Decimal::new(43, 1), 4));
    }

    #[test]
    fn test_rating_summary_single_review() {
        assert_eq!(rating_summary(&[2]), (Decimal::new(20, 1), 1));
    }

    #[test]
    fn test_rating_summary_without_reviews_is_default() {
        assert_eq!(rating_summary(&[]), (Decimal::new(50, 1), 0));
    }
}
