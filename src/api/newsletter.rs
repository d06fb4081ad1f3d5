//! Newsletter API endpoint.
//!
//! - POST /newsletter - Subscribe an email; duplicates are a 409

use super::blogs::MessageResponse;
use crate::error::AppError;
use crate::server::state::AppState;
use crate::store::{collections, encode, Filter};
use crate::types::NewsletterSubscription;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Subscription request.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Email to subscribe.
    pub email: Option<String>,
}

/// Subscribe an email to the newsletter. Each email subscribes at most
/// once; a repeat is answered with 409.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let email = request
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Email is required"))?
        .to_lowercase();

    let existing = state
        .store
        .find_one(collections::NEWSLETTERS, &Filter::new().eq("email", email.clone()))
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict("Email already subscribed"));
    }

    let subscription = NewsletterSubscription {
        id: Uuid::new_v4(),
        email,
        created_at: Utc::now(),
    };
    state
        .store
        .insert(collections::NEWSLETTERS, encode(&subscription)?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse { message: "Subscribed successfully".to_string() }),
    ))
}
