//! Application state for the HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers: the document
//! store, the lifecycle service built on top of it, and the payment
//! gateway. It's cloned (cheaply via Arc) for each request.

use crate::lifecycle::LifecycleService;
use crate::payments::PaymentGateway;
use crate::store::DocumentStore;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document store backing every collection.
    pub store: Arc<dyn DocumentStore>,

    /// Application lifecycle service (submit/assign/reject/payments).
    pub lifecycle: Arc<LifecycleService>,

    /// Payment gateway for creating payment intents.
    pub gateway: Arc<dyn PaymentGateway>,

    /// ISO currency code used for payment intents.
    pub currency: String,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The lifecycle service is built over the same store handlers use for
    /// the flat CRUD collections.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleService::new(store.clone()));
        Self { store, lifecycle, gateway, currency }
    }
}
