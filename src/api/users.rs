//! User account API endpoints.
//!
//! Accounts are addressed by email (lowercased on every read and write).
//!
//! - GET /agents - Featured agents for the landing page
//! - GET /users/profile?email= - Account profile
//! - GET /users/:email/role - Account role
//! - POST /users - Login: create the account or refresh its last-login
//! - PUT /users/:email - Save or update the account (upsert)
//! - PATCH /users/:email - Update name or avatar
//! - PATCH /users/promote/:email - Customer becomes agent
//! - PATCH /users/demote/:email - Agent becomes customer
//! - DELETE /users/:email - Remove the account

use super::blogs::MessageResponse;
use super::policies::DeleteResponse;
use super::timestamp_value;
use crate::error::AppError;
use crate::server::state::AppState;
use crate::store::{collections, decode, decode_vec, encode, Filter, FindQuery, Sort, Update};
use crate::types::{User, UserRole};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const FEATURED_AGENTS_LIMIT: u64 = 3;

fn email_filter(email: &str) -> Filter {
    Filter::new().eq("email", email.to_lowercase())
}

/// Query string carrying a required email.
#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    /// Account email.
    pub email: Option<String>,
}

/// Login request. Unrecognized fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Account email.
    pub email: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Requested role; defaults to customer.
    pub role: Option<UserRole>,
}

/// Login outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Whether a new account was created.
    pub inserted: bool,
    /// Whether an existing account had its last-login refreshed.
    pub last_login_updated: bool,
}

/// Request to save or update an account. Fields outside this allowlist
/// are rejected by deserialization, never stored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpsertUserRequest {
    /// Ignored; the path email always wins.
    pub email: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Account role.
    pub role: Option<UserRole>,
}

/// Request to update name or avatar.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// New display name.
    pub name: Option<String>,
    /// New avatar URL.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Role lookup response.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    /// The account's role.
    pub role: UserRole,
}

/// Role change outcome.
#[derive(Debug, Serialize)]
pub struct RoleChangeResponse {
    /// Whether an account in the expected role was found and changed.
    pub updated: bool,
}

/// Upsert outcome.
#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    /// Whether the account was created rather than updated.
    pub upserted: bool,
}

/// Featured agents for the landing page, newest first.
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let documents = state
        .store
        .find(
            collections::USERS,
            FindQuery::new()
                .filter(Filter::new().eq("role", UserRole::Agent.as_str()))
                .sort(Sort::desc("createdAt"))
                .limit(FEATURED_AGENTS_LIMIT),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// Account profile lookup.
pub async fn get_profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<User>, AppError> {
    let email = query
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("Email is required"))?;
    let document = state
        .store
        .find_one(collections::USERS, &email_filter(&email))
        .await?
        .ok_or_else(|| AppError::not_found("User", &email))?;
    Ok(Json(decode(document)?))
}

/// Account role lookup.
pub async fn get_role(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<RoleResponse>, AppError> {
    let document = state
        .store
        .find_one(collections::USERS, &email_filter(&email))
        .await?
        .ok_or_else(|| AppError::not_found("User", &email))?;
    let user: User = decode(document)?;
    Ok(Json(RoleResponse { role: user.role }))
}

/// Login. Creates the account on first sight; afterwards only refreshes
/// the last-login timestamp.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    let email = request
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("Email is required"))?
        .to_lowercase();

    let filter = email_filter(&email);
    if state.store.find_one(collections::USERS, &filter).await?.is_some() {
        let update = Update::new().set("lastLogin", timestamp_value(Utc::now()));
        let outcome = state
            .store
            .update_one(collections::USERS, &filter, update, false)
            .await?;
        return Ok((
            StatusCode::OK,
            Json(LoginResponse {
                message: "User already exists, last login updated".to_string(),
                inserted: false,
                last_login_updated: outcome.matched == 1,
            }),
        ));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        name: request.name,
        photo_url: request.photo_url,
        role: request.role.unwrap_or_default(),
        created_at: now,
        last_login: Some(now),
    };
    state.store.insert(collections::USERS, encode(&user)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            message: "User created".to_string(),
            inserted: true,
            last_login_updated: false,
        }),
    ))
}

/// Save or update the account addressed by the path email.
///
/// Unknown accounts are created with a complete record (upsert); the path
/// email always wins over anything in the body. Only the allowlisted
/// fields are writable, so a hostile body cannot smuggle arbitrary fields
/// into the account.
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(request): Json<UpsertUserRequest>,
) -> Result<Json<UpsertResponse>, AppError> {
    let email = email.to_lowercase();
    let filter = email_filter(&email);

    if state.store.find_one(collections::USERS, &filter).await?.is_some() {
        let mut update = Update::new();
        if let Some(name) = request.name {
            update = update.set("name", name);
        }
        if let Some(photo_url) = request.photo_url {
            update = update.set("photoURL", photo_url);
        }
        if let Some(role) = request.role {
            update = update.set("role", role.as_str());
        }
        if !update.set.is_empty() {
            state
                .store
                .update_one(collections::USERS, &filter, update, false)
                .await?;
        }
        return Ok(Json(UpsertResponse { upserted: false }));
    }

    let user = User {
        id: Uuid::new_v4(),
        email,
        name: request.name,
        photo_url: request.photo_url,
        role: request.role.unwrap_or_default(),
        created_at: Utc::now(),
        last_login: None,
    };
    state.store.insert(collections::USERS, encode(&user)?).await?;
    Ok(Json(UpsertResponse { upserted: true }))
}

/// Update the account's display name or avatar.
pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut update = Update::new();
    let mut any = false;
    if let Some(name) = request.name.filter(|n| !n.is_empty()) {
        update = update.set("name", name);
        any = true;
    }
    if let Some(photo_url) = request.photo_url.filter(|p| !p.is_empty()) {
        update = update.set("photoURL", photo_url);
        any = true;
    }
    if !any {
        return Err(AppError::bad_request("No valid fields to update"));
    }

    let outcome = state
        .store
        .update_one(collections::USERS, &email_filter(&email), update, false)
        .await?;
    if outcome.matched == 0 {
        return Err(AppError::not_found("User", &email));
    }
    Ok(Json(MessageResponse { message: "User updated".to_string() }))
}

async fn change_role(
    state: &AppState,
    email: &str,
    from: UserRole,
    to: UserRole,
) -> Result<Json<RoleChangeResponse>, AppError> {
    let filter = email_filter(email).eq("role", from.as_str());
    let update = Update::new().set("role", to.as_str());
    let outcome = state
        .store
        .update_one(collections::USERS, &filter, update, false)
        .await?;
    if outcome.matched == 1 {
        tracing::info!(email, %from, %to, "user role changed");
    }
    Ok(Json(RoleChangeResponse { updated: outcome.matched == 1 }))
}

/// Promote a customer to agent.
pub async fn promote_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<RoleChangeResponse>, AppError> {
    change_role(&state, &email, UserRole::Customer, UserRole::Agent).await
}

/// Demote an agent back to customer.
pub async fn demote_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<RoleChangeResponse>, AppError> {
    change_role(&state, &email, UserRole::Agent, UserRole::Customer).await
}

/// Remove the account.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = state
        .store
        .delete_one(collections::USERS, &email_filter(&email))
        .await?;
    if deleted == 0 {
        return Err(AppError::not_found("User", &email));
    }
    Ok(Json(DeleteResponse { deleted_count: deleted }))
}
