//! Life-insurance marketplace backend.
//!
//! A REST service where customers browse policies, apply for coverage, and
//! pay premiums, while agents and admins work the applications. The core is
//! the application lifecycle: every application starts `Pending` and moves
//! exactly once to `Approved` (incrementing the policy's purchase counter)
//! or `Rejected`.
//!
//! # Architecture
//!
//! ```text
//!            HTTP (Axum router, src/api + src/server)
//!                             │
//!        ┌────────────────────┼─────────────────────┐
//!        ▼                    ▼                     ▼
//! LifecycleService      flat CRUD handlers    PaymentGateway
//! (applications,        (policies, blogs,     (Stripe or mock)
//!  transactions)         users, reviews,
//!        │                claims, newsletter)
//!        └────────────────────┤
//!                             ▼
//!                      DocumentStore trait
//!                  (PostgreSQL JSONB / in-memory)
//! ```
//!
//! Handlers stay thin; the lifecycle rules live in [`lifecycle`], and every
//! collection access goes through the [`store::DocumentStore`] trait so the
//! whole API can be tested against the in-memory store.

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod payments;
pub mod server;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{AppError, DomainError};
pub use lifecycle::LifecycleService;
pub use server::{build_router, AppState};
