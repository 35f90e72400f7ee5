//! Review route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use warung_core::{ProductId, ReviewId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::reviews::ReviewService;
use crate::state::AppState;

/// Review request body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    #[serde(default, alias = "text")]
    pub review_text: String,
}

/// Review response.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub message: &'static str,
    pub review_id: ReviewId,
    pub product_rating: Decimal,
    pub review_count: i32,
}

/// Create or update the user's review of a product.
///
/// Responds 201 for a new review and 200 for an update.
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn add_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    let saved = ReviewService::new(state.pool())
        .add_review(&user, product_id, request.rating, &request.review_text)
        .await?;

    let (status, message) = if saved.created {
        (StatusCode::CREATED, "Review added")
    } else {
        (StatusCode::OK, "Review updated")
    };

    Ok((
        status,
        Json(ReviewResponse {
            message,
            review_id: saved.id,
            product_rating: saved.product_rating,
            review_count: saved.review_count,
        }),
    ))
}
