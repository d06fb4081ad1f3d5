//! Claim API endpoints.
//!
//! - GET /claims/all - Every claim, newest first (admin panel)
//! - GET /claims?email= - A customer's claims
//! - POST /claims - File a claim
//! - PATCH /claims/:id - Update a claim's status

use super::blogs::MessageResponse;
use super::parse_id;
use crate::error::AppError;
use crate::server::state::AppState;
use crate::store::{collections, decode, decode_vec, encode, Filter, FindQuery, Sort, Update};
use crate::types::{Claim, ClaimId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Query string carrying a required claimant email.
#[derive(Debug, Deserialize)]
pub struct ClaimsQuery {
    /// Claimant email.
    pub email: Option<String>,
}

/// Request to file a claim. Unknown fields are stored verbatim.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClaimRequest {
    /// Claimant email address.
    pub user_email: Option<String>,
    /// Reference to the claimed-against policy.
    pub policy_id: Option<String>,
    /// Display name of the claimed-against policy.
    pub policy_name: Option<String>,
    /// Initial status; defaults to "Pending".
    pub status: Option<String>,
    /// Claimant-supplied extension fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request to change a claim's status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaimStatusRequest {
    /// The new status.
    pub new_status: Option<String>,
}

/// Every claim, newest first.
pub async fn list_all_claims(State(state): State<AppState>) -> Result<Json<Vec<Claim>>, AppError> {
    let documents = state
        .store
        .find(
            collections::CLAIMS,
            FindQuery::new().sort(Sort::desc("claimDate")),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// A customer's claims.
pub async fn customer_claims(
    State(state): State<AppState>,
    Query(query): Query<ClaimsQuery>,
) -> Result<Json<Vec<Claim>>, AppError> {
    let email = query
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("Email is required"))?;
    let documents = state
        .store
        .find(
            collections::CLAIMS,
            FindQuery::new()
                .filter(Filter::new().eq("userEmail", email))
                .sort(Sort::desc("claimDate")),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// File a claim. The claim date is assigned server-side.
pub async fn create_claim(
    State(state): State<AppState>,
    Json(request): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<Claim>), AppError> {
    let user_email = request
        .user_email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Claimant email is required"))?;

    let mut extra = request.extra;
    extra.remove("id");
    extra.remove("claimDate");

    let claim = Claim {
        id: ClaimId::new(),
        user_email,
        policy_id: request.policy_id,
        policy_name: request.policy_name,
        status: request.status.unwrap_or_else(|| "Pending".to_string()),
        claim_date: Utc::now(),
        extra,
    };
    let stored = state.store.insert(collections::CLAIMS, encode(&claim)?).await?;
    Ok((StatusCode::CREATED, Json(decode(stored)?)))
}

/// Update a claim's status (agent panel).
pub async fn update_claim_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateClaimStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: ClaimId = parse_id(&id, "claim")?;
    let new_status = request
        .new_status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("New status is required"))?;

    let outcome = state
        .store
        .update_one(
            collections::CLAIMS,
            &Filter::new().eq("id", id.to_string()),
            Update::new().set("status", new_status),
            false,
        )
        .await?;
    if outcome.matched == 0 {
        return Err(AppError::not_found("Claim", id));
    }
    Ok(Json(MessageResponse { message: "Claim status updated".to_string() }))
}
