//! Review API endpoints.
//!
//! - GET /reviews - All reviews, newest first
//! - POST /reviews - Save a review and copy its rating onto the policy

use super::blogs::MessageResponse;
use crate::error::AppError;
use crate::server::state::AppState;
use crate::store::{collections, decode_vec, encode, Filter, FindQuery, Sort, Update};
use crate::types::Review;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Request to save a review.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    /// Reviewed policy.
    pub policy_id: Option<String>,
    /// Star rating, 1-5.
    pub rating: Option<f64>,
    /// Review text.
    pub feedback: Option<String>,
    /// Reviewer display name.
    pub customer_name: Option<String>,
    /// Reviewer email.
    pub customer_email: Option<String>,
}

/// All reviews, newest first.
pub async fn list_reviews(State(state): State<AppState>) -> Result<Json<Vec<Review>>, AppError> {
    let documents = state
        .store
        .find(
            collections::REVIEWS,
            FindQuery::new().sort(Sort::desc("createdAt")),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// Save a review. The review's rating overwrites the policy's displayed
/// rating (last write wins).
pub async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let (Some(policy_id), Some(rating)) = (
        request.policy_id.filter(|p| !p.is_empty()),
        request.rating,
    ) else {
        return Err(AppError::bad_request("policyId and rating are required"));
    };
    if !(1.0..=5.0).contains(&rating) {
        return Err(AppError::bad_request("rating must be between 1 and 5"));
    }

    let review = Review {
        id: Uuid::new_v4(),
        policy_id: policy_id.clone(),
        rating,
        feedback: request.feedback,
        customer_name: request.customer_name,
        customer_email: request.customer_email,
        created_at: Utc::now(),
    };
    state.store.insert(collections::REVIEWS, encode(&review)?).await?;

    let outcome = state
        .store
        .update_one(
            collections::POLICIES,
            &Filter::new().eq("id", policy_id.clone()),
            Update::new().set("rating", rating),
            false,
        )
        .await?;
    if outcome.matched == 0 {
        tracing::warn!(policy = %policy_id, "review references an unknown policy");
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse { message: "Review saved and rating updated".to_string() }),
    ))
}
