//! Payment and transaction API endpoints.
//!
//! - POST /create-payment-intent - Ask the gateway for a client secret
//! - POST /payments - Record a completed payment as a transaction
//! - GET /transactions - Filtered transaction report with income total

use crate::error::AppError;
use crate::lifecycle::{NewPayment, TransactionQuery, TransactionReport};
use crate::server::state::AppState;
use crate::types::{Money, Transaction};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Request for a new payment intent. The amount arrives in dollars, the
/// gateway is charged in cents.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    /// Amount in dollars.
    pub amount: Option<f64>,
}

/// Response carrying the gateway client secret.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    /// Secret the browser uses to confirm the payment.
    pub client_secret: String,
}

/// Query parameters for the transaction report. Dates accept RFC 3339 or
/// a plain `YYYY-MM-DD` (interpreted as midnight UTC).
#[derive(Debug, Deserialize)]
pub struct TransactionParams {
    /// Lower date bound.
    pub from: Option<String>,
    /// Upper date bound.
    pub to: Option<String>,
    /// Substring match on the payer email.
    pub user: Option<String>,
    /// Substring match on the policy name.
    pub policy: Option<String>,
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .ok_or_else(|| AppError::bad_request(format!("Invalid date: {raw}")))
}

/// Create a payment intent with the gateway.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<CreatePaymentIntentResponse>, AppError> {
    let dollars = request
        .amount
        .ok_or_else(|| AppError::bad_request("Amount is required"))?;
    let amount = Money::from_dollars_f64(dollars);
    if amount.is_negative() {
        return Err(AppError::bad_request("Amount must not be negative"));
    }

    let intent = state
        .gateway
        .create_payment_intent(amount, &state.currency)
        .await?;
    Ok(Json(CreatePaymentIntentResponse { client_secret: intent.client_secret }))
}

/// Record a completed payment.
///
/// The transaction date is assigned server-side; a client-supplied date is
/// ignored.
pub async fn record_payment(
    State(state): State<AppState>,
    Json(payment): Json<NewPayment>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let transaction = state.lifecycle.record_payment(payment).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Transaction report: filtered transactions, newest first, plus the sum
/// of their amounts.
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<TransactionParams>,
) -> Result<Json<TransactionReport>, AppError> {
    let query = TransactionQuery {
        from: params.from.as_deref().map(parse_instant).transpose()?,
        to: params.to.as_deref().map(parse_instant).transpose()?,
        user: params.user.filter(|s| !s.is_empty()),
        policy: params.policy.filter(|s| !s.is_empty()),
    };
    Ok(Json(state.lifecycle.transactions(query).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_instant_accepts_rfc3339() {
        let instant = parse_instant("2026-03-01T10:30:00Z").unwrap();
        assert_eq!(instant.to_rfc3339(), "2026-03-01T10:30:00+00:00");
    }

    #[test]
    fn parse_instant_accepts_plain_dates_as_midnight_utc() {
        let instant = parse_instant("2026-03-01").unwrap();
        assert_eq!(instant.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    }

    #[test]
    fn parse_instant_rejects_garbage() {
        assert!(parse_instant("yesterday").is_err());
    }
}
