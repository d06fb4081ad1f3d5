//! Application lifecycle API endpoints.
//!
//! - POST /applications - Submit a new application (always starts Pending)
//! - GET /applications - List all applications (admin panel)
//! - GET /applications/customer?email= - Applications submitted by a customer
//! - GET /applications/assigned?email= - Applications assigned to an agent
//! - GET /applications/approved?email= - A customer's approved applications
//! - PATCH /applications/assign/:id - Approve and assign the handling agent
//! - PATCH /applications/reject/:id - Reject a pending application
//! - PATCH /applications/:id - Set the payment-status attribute

use super::parse_id;
use crate::error::AppError;
use crate::lifecycle::SubmitApplication;
use crate::server::state::AppState;
use crate::types::{Application, ApplicationId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

/// Query string carrying a required email.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    /// Email to filter on.
    pub email: Option<String>,
}

impl EmailQuery {
    fn require(self) -> Result<String, AppError> {
        self.email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::bad_request("Email is required"))
    }
}

/// Request to approve an application.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    /// Agent taking over the application.
    pub agent: Option<String>,
}

/// Request to set the payment-status attribute.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    /// New payment status (free text, e.g. "Paid").
    pub payment_status: Option<String>,
}

/// Submit a new application.
///
/// Whatever status or agent the body claims, the stored record starts
/// `Pending` and unassigned.
pub async fn submit_application(
    State(state): State<AppState>,
    Json(request): Json<SubmitApplication>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let application = state.lifecycle.submit(request).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// List every application, newest first.
pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.lifecycle.list_all().await?))
}

/// List the applications a customer submitted.
pub async fn customer_applications(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let email = query.require()?;
    Ok(Json(state.lifecycle.list_by_applicant(&email).await?))
}

/// List the applications assigned to an agent.
pub async fn assigned_applications(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let email = query.require()?;
    Ok(Json(state.lifecycle.list_by_agent(&email).await?))
}

/// List a customer's approved applications.
pub async fn approved_applications(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let email = query.require()?;
    Ok(Json(state.lifecycle.list_approved(&email).await?))
}

/// Approve an application and assign the handling agent.
///
/// Safe to retry: a second call on the same application is a no-op that
/// returns the current record without touching the policy's purchase
/// counter again.
pub async fn assign_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Application>, AppError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    let agent = request.agent.unwrap_or_default();
    Ok(Json(state.lifecycle.assign(id, &agent).await?))
}

/// Reject a pending application.
pub async fn reject_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Application>, AppError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    Ok(Json(state.lifecycle.reject(id).await?))
}

/// Set the payment-status attribute, independent of lifecycle status.
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PaymentStatusRequest>,
) -> Result<Json<Application>, AppError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    let payment_status = request
        .payment_status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("paymentStatus is required"))?;
    Ok(Json(state.lifecycle.update_payment_status(id, &payment_status).await?))
}
