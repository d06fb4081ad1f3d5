//! Blog API endpoints.
//!
//! - GET /blogs - All posts, newest first
//! - GET /blogs/latest - Most visited posts
//! - GET /blogs/manage?email=&role= - Posts for the management panel
//! - GET /blogs/:id - Post details; bumps the visit counter
//! - POST /blogs - Create a post
//! - PATCH /blogs/:id - Edit a post
//! - DELETE /blogs/:id - Remove a post

use super::policies::DeleteResponse;
use super::{parse_id, timestamp_value};
use crate::error::AppError;
use crate::server::state::AppState;
use crate::store::{collections, decode, decode_vec, encode, Filter, FindQuery, Sort, Update};
use crate::types::{Blog, BlogId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

const LATEST_LIMIT: u64 = 4;

/// Query parameters for the management listing.
#[derive(Debug, Deserialize)]
pub struct ManageBlogsQuery {
    /// Requesting author's email.
    pub email: Option<String>,
    /// Requesting user's role; admins see every post.
    pub role: Option<String>,
}

/// Request to create a blog post.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    /// Post title.
    pub title: Option<String>,
    /// Post body.
    pub details: Option<String>,
    /// Cover image URL.
    pub image: Option<String>,
    /// Author display name.
    pub author: Option<String>,
    /// Author profile URL or avatar.
    pub author_profile: Option<String>,
    /// Author email.
    pub author_email: Option<String>,
}

/// Request to edit a blog post.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub details: Option<String>,
    /// New cover image URL.
    pub image: Option<String>,
    /// New author profile URL.
    pub author_profile: Option<String>,
}

/// Acknowledgement message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

/// All posts, newest first.
pub async fn list_blogs(State(state): State<AppState>) -> Result<Json<Vec<Blog>>, AppError> {
    let documents = state
        .store
        .find(
            collections::BLOGS,
            FindQuery::new().sort(Sort::desc("createdAt")),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// The most visited posts, for the landing page.
pub async fn latest_blogs(State(state): State<AppState>) -> Result<Json<Vec<Blog>>, AppError> {
    let documents = state
        .store
        .find(
            collections::BLOGS,
            FindQuery::new()
                .sort(Sort::desc("totalVisit"))
                .limit(LATEST_LIMIT),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// Posts for the management panel: admins see everything, other roles only
/// their own posts.
pub async fn manage_blogs(
    State(state): State<AppState>,
    Query(query): Query<ManageBlogsQuery>,
) -> Result<Json<Vec<Blog>>, AppError> {
    let email = query
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("Email and role are required"))?;
    let role = query
        .role
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::bad_request("Email and role are required"))?;

    let mut filter = Filter::new();
    if role != "admin" {
        filter = filter.eq("authorEmail", email.to_lowercase());
    }

    let documents = state
        .store
        .find(
            collections::BLOGS,
            FindQuery::new().filter(filter).sort(Sort::desc("createdAt")),
        )
        .await?;
    Ok(Json(decode_vec(documents)?))
}

/// Post details. Each read bumps the visit counter atomically, and the
/// returned record reflects the bumped count.
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Blog>, AppError> {
    let id: BlogId = parse_id(&id, "blog")?;
    let filter = Filter::new().eq("id", id.to_string());

    let document = state
        .store
        .find_one(collections::BLOGS, &filter)
        .await?
        .ok_or_else(|| AppError::not_found("Blog", id))?;
    let mut blog: Blog = decode(document)?;

    state
        .store
        .update_one(collections::BLOGS, &filter, Update::new().inc("totalVisit", 1), false)
        .await?;
    blog.total_visit += 1;
    Ok(Json(blog))
}

/// Create a post. The visit counter starts at zero.
pub async fn create_blog(
    State(state): State<AppState>,
    Json(request): Json<CreateBlogRequest>,
) -> Result<(StatusCode, Json<Blog>), AppError> {
    let (Some(title), Some(details), Some(author), Some(author_email)) = (
        request.title.filter(|t| !t.is_empty()),
        request.details.filter(|d| !d.is_empty()),
        request.author.filter(|a| !a.is_empty()),
        request.author_email.filter(|e| !e.is_empty()),
    ) else {
        return Err(AppError::bad_request("Missing required fields"));
    };

    let blog = Blog {
        id: BlogId::new(),
        title,
        details,
        image: request.image,
        author,
        author_profile: request.author_profile,
        author_email: author_email.to_lowercase(),
        created_at: Utc::now(),
        updated_at: None,
        total_visit: 0,
    };

    let stored = state.store.insert(collections::BLOGS, encode(&blog)?).await?;
    Ok((StatusCode::CREATED, Json(decode(stored)?)))
}

/// Edit a post's title, body, image, or author profile.
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateBlogRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: BlogId = parse_id(&id, "blog")?;
    let (Some(title), Some(details)) = (
        request.title.filter(|t| !t.is_empty()),
        request.details.filter(|d| !d.is_empty()),
    ) else {
        return Err(AppError::bad_request("Title and details are required"));
    };

    let mut update = Update::new()
        .set("title", title)
        .set("details", details)
        .set("updatedAt", timestamp_value(Utc::now()));
    if let Some(image) = request.image {
        update = update.set("image", image);
    }
    if let Some(author_profile) = request.author_profile {
        update = update.set("authorProfile", author_profile);
    }

    let outcome = state
        .store
        .update_one(collections::BLOGS, &Filter::new().eq("id", id.to_string()), update, false)
        .await?;
    if outcome.matched == 0 {
        return Err(AppError::not_found("Blog", id));
    }
    Ok(Json(MessageResponse { message: "Blog updated successfully".to_string() }))
}

/// Remove a post.
pub async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id: BlogId = parse_id(&id, "blog")?;
    let deleted = state
        .store
        .delete_one(collections::BLOGS, &Filter::new().eq("id", id.to_string()))
        .await?;
    if deleted == 0 {
        return Err(AppError::not_found("Blog", id));
    }
    Ok(Json(DeleteResponse { deleted_count: deleted }))
}
