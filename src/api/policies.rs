//! Policy catalog API endpoints.
//!
//! - GET /policies - Paginated catalog with category filter and title search
//! - GET /policies/popular - Most purchased policies
//! - GET /policies/:id - Policy details
//! - GET /admin/policies - Unpaginated catalog (admin panel)
//! - POST /policies - Add a policy
//! - PUT /policies/:id - Update a policy
//! - DELETE /policies/:id - Remove a policy

use super::{parse_id, timestamp_value};
use crate::error::AppError;
use crate::server::state::AppState;
use crate::store::{collections, decode, decode_vec, encode, Filter, FindQuery, Sort, Update};
use crate::types::{Policy, PolicyId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

const POPULAR_LIMIT: u64 = 6;

/// Query parameters for the paginated catalog.
#[derive(Debug, Deserialize)]
pub struct ListPoliciesQuery {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u64,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Exact-match category filter.
    pub category: Option<String>,
    /// Case-insensitive substring search on the title.
    pub search: Option<String>,
}

const fn default_page() -> u64 {
    1
}

const fn default_limit() -> u64 {
    9
}

/// One catalog page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPoliciesResponse {
    /// Policies matching the filter across all pages.
    pub total: u64,
    /// The requested page.
    pub current_page: u64,
    /// Page count for the current filter and limit.
    pub total_pages: u64,
    /// Policies on this page.
    pub policies: Vec<Policy>,
}

/// Request to add a policy to the catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyRequest {
    /// Policy title.
    pub title: Option<String>,
    /// Product category.
    pub category: Option<String>,
    /// Marketing description.
    pub description: Option<String>,
    /// Minimum eligible age.
    pub min_age: Option<u32>,
    /// Maximum eligible age.
    pub max_age: Option<u32>,
    /// Base premium in dollars.
    pub base_premium: Option<f64>,
    /// Cover image URL.
    pub image: Option<String>,
    /// Human-readable coverage range.
    pub coverage_range: Option<String>,
    /// Offered term durations.
    #[serde(default)]
    pub duration_options: Vec<String>,
    /// Eligibility notes.
    #[serde(default)]
    pub eligibility: Vec<String>,
    /// Benefit highlights.
    #[serde(default)]
    pub benefits: Vec<String>,
    /// Free-text premium calculation notes.
    pub premium_logic: Option<String>,
}

/// Request to update an existing policy. The purchase counter and rating
/// are never writable through this endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePolicyRequest {
    /// New title.
    pub title: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New minimum eligible age.
    pub min_age: Option<u32>,
    /// New maximum eligible age.
    pub max_age: Option<u32>,
    /// New base premium in dollars.
    pub base_premium: Option<f64>,
    /// New cover image URL.
    pub image: Option<String>,
    /// New coverage range.
    pub coverage_range: Option<String>,
    /// New term durations (cleared when omitted).
    #[serde(default)]
    pub duration_options: Vec<String>,
    /// New eligibility notes (cleared when omitted).
    #[serde(default)]
    pub eligibility: Vec<String>,
    /// New benefit highlights (cleared when omitted).
    #[serde(default)]
    pub benefits: Vec<String>,
    /// New premium notes (cleared when omitted).
    #[serde(default)]
    pub premium_logic: String,
}

/// Paginated catalog listing.
pub async fn list_policies(
    State(state): State<AppState>,
    Query(query): Query<ListPoliciesQuery>,
) -> Result<Json<ListPoliciesResponse>, AppError> {
    let page = query.page.max(1);
    let limit = query.limit.max(1);

    let mut filter = Filter::new();
    if let Some(category) = query.category.filter(|c| !c.is_empty()) {
        filter = filter.eq("category", category);
    }
    if let Some(search) = query.search.filter(|s| !s.is_empty()) {
        filter = filter.contains("title", &search);
    }

    // Saturates for absurd page numbers; the window then starts past the
    // end and the page comes back empty.
    let skip = page.saturating_sub(1).saturating_mul(limit);

    let total = state.store.count(collections::POLICIES, &filter).await?;
    let documents = state
        .store
        .find(
            collections::POLICIES,
            FindQuery::new().filter(filter).skip(skip).limit(limit),
        )
        .await?;

    Ok(Json(ListPoliciesResponse {
        total,
        current_page: page,
        total_pages: total.div_ceil(limit),
        policies: decode_vec(documents)?,
    }))
}

/// The most purchased policies, for the landing page.
pub async fn popular_policies(
    State(state): State<AppState>,
) -> Result<Json<Vec<Policy>>, AppError> {
    let documents = state
        .store
        .find(
            collections::POLICIES,
            FindQuery::new()
                .sort(Sort::desc("purchaseCount"))
                .limit(POPULAR_LIMIT),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// Unpaginated catalog for the admin panel.
pub async fn admin_policies(
    State(state): State<AppState>,
) -> Result<Json<Vec<Policy>>, AppError> {
    let documents = state
        .store
        .find(collections::POLICIES, FindQuery::new())
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// Policy details.
pub async fn get_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Policy>, AppError> {
    let id: PolicyId = parse_id(&id, "policy")?;
    let document = state
        .store
        .find_one(collections::POLICIES, &Filter::new().eq("id", id.to_string()))
        .await?
        .ok_or_else(|| AppError::not_found("Policy", id))?;
    Ok(Json(decode(document)?))
}

/// Add a policy to the catalog.
pub async fn create_policy(
    State(state): State<AppState>,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), AppError> {
    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Title is required"))?;

    let policy = Policy {
        id: PolicyId::new(),
        title,
        category: request.category,
        description: request.description,
        min_age: request.min_age,
        max_age: request.max_age,
        base_premium: request.base_premium,
        image: request.image,
        coverage_range: request.coverage_range,
        duration_options: request.duration_options,
        eligibility: request.eligibility,
        benefits: request.benefits,
        premium_logic: request.premium_logic,
        purchase_count: 0,
        rating: None,
        created_at: Utc::now(),
        updated_at: None,
    };

    let stored = state
        .store
        .insert(collections::POLICIES, encode(&policy)?)
        .await?;
    Ok((StatusCode::CREATED, Json(decode(stored)?)))
}

/// Update a policy's descriptive fields.
pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePolicyRequest>,
) -> Result<Json<Policy>, AppError> {
    let id: PolicyId = parse_id(&id, "policy")?;
    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Title is required"))?;

    let mut update = Update::new()
        .set("title", title)
        .set("durationOptions", request.duration_options)
        .set("eligibility", request.eligibility)
        .set("benefits", request.benefits)
        .set("premiumLogic", request.premium_logic)
        .set("updatedAt", timestamp_value(Utc::now()));
    if let Some(category) = request.category {
        update = update.set("category", category);
    }
    if let Some(description) = request.description {
        update = update.set("description", description);
    }
    if let Some(min_age) = request.min_age {
        update = update.set("minAge", min_age);
    }
    if let Some(max_age) = request.max_age {
        update = update.set("maxAge", max_age);
    }
    if let Some(base_premium) = request.base_premium {
        update = update.set("basePremium", base_premium);
    }
    if let Some(image) = request.image {
        update = update.set("image", image);
    }
    if let Some(coverage_range) = request.coverage_range {
        update = update.set("coverageRange", coverage_range);
    }

    let filter = Filter::new().eq("id", id.to_string());
    let outcome = state
        .store
        .update_one(collections::POLICIES, &filter, update, false)
        .await?;
    if outcome.matched == 0 {
        return Err(AppError::not_found("Policy", id));
    }

    let document = state
        .store
        .find_one(collections::POLICIES, &filter)
        .await?
        .ok_or_else(|| AppError::not_found("Policy", id))?;
    Ok(Json(decode(document)?))
}

/// Deletion summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    /// How many documents were removed (0 or 1).
    pub deleted_count: u64,
}

/// Remove a policy from the catalog.
pub async fn delete_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id: PolicyId = parse_id(&id, "policy")?;
    let deleted = state
        .store
        .delete_one(collections::POLICIES, &Filter::new().eq("id", id.to_string()))
        .await?;
    if deleted == 0 {
        return Err(AppError::not_found("Policy", id));
    }
    Ok(Json(DeleteResponse { deleted_count: deleted }))
}
