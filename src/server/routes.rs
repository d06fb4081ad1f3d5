//! Router configuration.
//!
//! Builds the complete Axum router with all endpoints.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{
    applications, blogs, claims, newsletter, policies, reviews, transactions, users,
};
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn root() -> &'static str {
    "Life Insurance Backend is Running..."
}

/// Build the complete Axum router.
///
/// Static path segments are registered alongside parameterized siblings
/// (e.g. `/applications/customer` and `/applications/:id`); Axum prefers
/// the static match.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Application lifecycle
        .route("/applications", post(applications::submit_application))
        .route("/applications", get(applications::list_applications))
        .route("/applications/customer", get(applications::customer_applications))
        .route("/applications/assigned", get(applications::assigned_applications))
        .route("/applications/approved", get(applications::approved_applications))
        .route("/applications/assign/:id", patch(applications::assign_application))
        .route("/applications/reject/:id", patch(applications::reject_application))
        .route("/applications/:id", patch(applications::update_payment_status))
        // Payments and transactions
        .route("/create-payment-intent", post(transactions::create_payment_intent))
        .route("/payments", post(transactions::record_payment))
        .route("/transactions", get(transactions::list_transactions))
        // Policy catalog
        .route("/policies", get(policies::list_policies))
        .route("/policies", post(policies::create_policy))
        .route("/policies/popular", get(policies::popular_policies))
        .route("/policies/:id", get(policies::get_policy))
        .route("/policies/:id", put(policies::update_policy))
        .route("/policies/:id", delete(policies::delete_policy))
        .route("/admin/policies", get(policies::admin_policies))
        // Blog
        .route("/blogs", get(blogs::list_blogs))
        .route("/blogs", post(blogs::create_blog))
        .route("/blogs/latest", get(blogs::latest_blogs))
        .route("/blogs/manage", get(blogs::manage_blogs))
        .route("/blogs/:id", get(blogs::get_blog))
        .route("/blogs/:id", patch(blogs::update_blog))
        .route("/blogs/:id", delete(blogs::delete_blog))
        // Users
        .route("/agents", get(users::list_agents))
        .route("/users", post(users::login))
        .route("/users/profile", get(users::get_profile))
        .route("/users/promote/:email", patch(users::promote_user))
        .route("/users/demote/:email", patch(users::demote_user))
        .route("/users/:email/role", get(users::get_role))
        .route("/users/:email", put(users::upsert_user))
        .route("/users/:email", patch(users::update_user))
        .route("/users/:email", delete(users::delete_user))
        // Reviews
        .route("/reviews", get(reviews::list_reviews))
        .route("/reviews", post(reviews::create_review))
        // Claims
        .route("/claims/all", get(claims::list_all_claims))
        .route("/claims", get(claims::customer_claims))
        .route("/claims", post(claims::create_claim))
        .route("/claims/:id", patch(claims::update_claim_status))
        // Newsletter
        .route("/newsletter", post(newsletter::subscribe))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
