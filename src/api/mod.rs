//! HTTP API endpoints.
//!
//! One module per resource. Handlers stay thin: parse and validate the
//! request, call the lifecycle service or the document store, map the
//! outcome into a response. Application lifecycle semantics live in
//! [`crate::lifecycle`], never here.

pub mod applications;
pub mod blogs;
pub mod claims;
pub mod newsletter;
pub mod policies;
pub mod reviews;
pub mod transactions;
pub mod users;

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::str::FromStr;

/// Parses a path segment into a typed identifier, mapping failures to a
/// 400 with the resource name in the message.
pub(crate) fn parse_id<T: FromStr>(raw: &str, resource: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid {resource} ID")))
}

/// Serializes a timestamp the same way the typed records do, so stored
/// documents keep one timestamp format throughout.
pub(crate) fn timestamp_value(instant: DateTime<Utc>) -> Value {
    serde_json::json!(instant)
}
