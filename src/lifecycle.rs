//! Application Lifecycle Service.
//!
//! State machine over `Application.status`:
//!
//! ```text
//! submit ──▶ Pending ──assign──▶ Approved   (policy purchaseCount += 1)
//!                │
//!                └───reject──▶ Rejected
//! ```
//!
//! `Approved` and `Rejected` are terminal for the status field; the separate
//! `paymentStatus` attribute may be set independently at any time after
//! approval. The approval transition is idempotent: the status write is
//! conditional on the application still being `Pending`, so re-approving an
//! already-approved application (or losing a concurrent-approval race) takes
//! a no-op path and never double-counts the policy's purchase counter.
//!
//! The counter increment itself uses the store's per-document atomic
//! increment. The status write and the counter increment are deliberately
//! not wrapped in a cross-document transaction: if the increment fails after
//! a successful status write, the status change persists and the failure is
//! reported to the caller.

use crate::error::DomainError;
use crate::store::{
    collections, decode, decode_vec, encode, DocumentStore, Filter, FindQuery, Sort, Update,
};
use crate::types::{Application, ApplicationId, ApplicationStatus, Money, Transaction, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Source of timestamps, injectable for tests.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fields owned by the lifecycle service; stripped from caller-supplied
/// extension maps so a hostile body cannot smuggle them in.
const RESERVED_APPLICATION_FIELDS: &[&str] =
    &["id", "status", "assignedAgent", "paymentStatus", "appliedAt"];

const RESERVED_TRANSACTION_FIELDS: &[&str] = &["id", "date"];

/// A submission request. Required fields are validated by [`LifecycleService::submit`];
/// unknown fields travel in `extra` and are stored verbatim (minus reserved names).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplication {
    /// Applicant email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Target policy reference.
    #[serde(default)]
    pub policy_id: Option<String>,
    /// Display name of the target policy.
    #[serde(default)]
    pub policy_name: Option<String>,
    /// Extension fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A completed payment to record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    /// Payer email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Reference to the paid-for policy.
    #[serde(default)]
    pub policy_id: Option<String>,
    /// Display name of the paid-for policy.
    #[serde(default)]
    pub policy_name: Option<String>,
    /// Paid amount in cents.
    #[serde(default)]
    pub amount: Option<Money>,
    /// Gateway-supplied extension fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Filters for the transaction report.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    /// Only transactions at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only transactions at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on the payer email.
    pub user: Option<String>,
    /// Case-insensitive substring match on the policy name.
    pub policy: Option<String>,
}

/// Filtered transactions plus their summed total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReport {
    /// Matching transactions, newest first.
    pub transactions: Vec<Transaction>,
    /// Sum of all matching amounts, in cents.
    pub total_income: Money,
}

/// Sums transaction amounts, saturating on overflow.
#[must_use]
pub fn total_of(transactions: &[Transaction]) -> Money {
    transactions
        .iter()
        .fold(Money::default(), |acc, tx| acc.saturating_add(tx.amount))
}

/// Service applying lifecycle events to the application, policy, and
/// transaction collections. The store is an injected dependency, never
/// ambient state.
pub struct LifecycleService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl LifecycleService {
    /// Creates a service using wall-clock time.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a service with an explicit clock (tests).
    #[must_use]
    pub fn with_clock(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Submits a new application.
    ///
    /// The status is always forced to `Pending` regardless of anything the
    /// caller supplied.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the applicant email or policy reference is
    /// missing or malformed; `Upstream` on store failures.
    pub async fn submit(&self, request: SubmitApplication) -> Result<Application, DomainError> {
        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DomainError::invalid("applicant email is required"))?;
        if !email.contains('@') {
            return Err(DomainError::invalid("applicant email is malformed"));
        }
        let policy_id = request
            .policy_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DomainError::invalid("policyId is required"))?;

        let mut extra = request.extra;
        for field in RESERVED_APPLICATION_FIELDS {
            extra.remove(*field);
        }

        let application = Application {
            id: ApplicationId::new(),
            email: email.to_owned(),
            policy_id: policy_id.to_owned(),
            policy_name: request.policy_name,
            status: ApplicationStatus::Pending,
            assigned_agent: None,
            payment_status: None,
            applied_at: self.clock.now(),
            extra,
        };

        let stored = self
            .store
            .insert(collections::APPLICATIONS, encode(&application)?)
            .await?;
        tracing::info!(application = %application.id, email, "application submitted");
        Ok(decode(stored)?)
    }

    /// Approves an application and assigns the handling agent.
    ///
    /// Exactly one successful `Pending -> Approved` transition increments
    /// the referenced policy's purchase counter by 1; any further call is a
    /// no-op returning the current record.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the agent identity is empty, `NotFound` when
    /// the application does not exist, `Upstream` on store failures
    /// (including a failed counter increment, which does not roll back the
    /// status change).
    pub async fn assign(
        &self,
        id: ApplicationId,
        agent: &str,
    ) -> Result<Application, DomainError> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(DomainError::invalid("agent identity is required"));
        }

        let pending = Filter::new()
            .eq("id", id.to_string())
            .eq("status", ApplicationStatus::Pending.as_str());
        let update = Update::new()
            .set("status", ApplicationStatus::Approved.as_str())
            .set("assignedAgent", agent);
        let outcome = self
            .store
            .update_one(collections::APPLICATIONS, &pending, update, false)
            .await?;

        let application = self.fetch(id).await?;

        if outcome.matched == 1 {
            let policy_filter = Filter::new().eq("id", application.policy_id.clone());
            let increment = Update::new().inc("purchaseCount", 1);
            let counter = self
                .store
                .update_one(collections::POLICIES, &policy_filter, increment, false)
                .await
                .map_err(|err| {
                    // The status change persists; the inconsistency window is
                    // accepted and the failure reported to the caller.
                    tracing::error!(
                        application = %id,
                        policy = %application.policy_id,
                        error = %err,
                        "purchase counter increment failed after approval"
                    );
                    DomainError::from(err)
                })?;
            if counter.matched == 0 {
                tracing::warn!(
                    application = %id,
                    policy = %application.policy_id,
                    "approved application references an unknown policy"
                );
            }
            tracing::info!(application = %id, agent, "application approved");
        } else {
            tracing::debug!(
                application = %id,
                status = %application.status,
                "assign on a non-pending application is a no-op"
            );
        }

        Ok(application)
    }

    /// Rejects a pending application. Terminal; no side effects.
    ///
    /// # Errors
    ///
    /// `NotFound` when the application does not exist; `Upstream` on store
    /// failures.
    pub async fn reject(&self, id: ApplicationId) -> Result<Application, DomainError> {
        let pending = Filter::new()
            .eq("id", id.to_string())
            .eq("status", ApplicationStatus::Pending.as_str());
        let update =
            Update::new().set("status", ApplicationStatus::Rejected.as_str());
        let outcome = self
            .store
            .update_one(collections::APPLICATIONS, &pending, update, false)
            .await?;

        let application = self.fetch(id).await?;
        if outcome.matched == 1 {
            tracing::info!(application = %id, "application rejected");
        }
        Ok(application)
    }

    /// Sets the payment-status attribute without touching lifecycle status.
    ///
    /// # Errors
    ///
    /// `NotFound` when the application does not exist; `Upstream` on store
    /// failures.
    pub async fn update_payment_status(
        &self,
        id: ApplicationId,
        payment_status: &str,
    ) -> Result<Application, DomainError> {
        let filter = Filter::new().eq("id", id.to_string());
        let update = Update::new().set("paymentStatus", payment_status);
        let outcome = self
            .store
            .update_one(collections::APPLICATIONS, &filter, update, false)
            .await?;
        if outcome.matched == 0 {
            return Err(DomainError::not_found("Application", id));
        }
        self.fetch(id).await
    }

    /// Appends an immutable transaction record.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the payer email or the amount is missing, or
    /// the amount is negative; `Upstream` on store failures.
    pub async fn record_payment(&self, payment: NewPayment) -> Result<Transaction, DomainError> {
        let email = payment
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DomainError::invalid("payer email is required"))?;
        let amount = payment
            .amount
            .ok_or_else(|| DomainError::invalid("amount is required"))?;
        if amount.is_negative() {
            return Err(DomainError::invalid("amount must not be negative"));
        }

        let mut extra = payment.extra;
        for field in RESERVED_TRANSACTION_FIELDS {
            extra.remove(*field);
        }

        let transaction = Transaction {
            id: TransactionId::new(),
            email: email.to_owned(),
            policy_id: payment.policy_id,
            policy_name: payment.policy_name,
            amount,
            date: self.clock.now(),
            extra,
        };
        let stored = self
            .store
            .insert(collections::TRANSACTIONS, encode(&transaction)?)
            .await?;
        tracing::info!(transaction = %transaction.id, amount = amount.cents(), "payment recorded");
        Ok(decode(stored)?)
    }

    /// All applications, newest first.
    ///
    /// # Errors
    ///
    /// `Upstream` on store failures.
    pub async fn list_all(&self) -> Result<Vec<Application>, DomainError> {
        self.list(Filter::new()).await
    }

    /// Applications assigned to `agent`, newest first.
    ///
    /// # Errors
    ///
    /// `Upstream` on store failures.
    pub async fn list_by_agent(&self, agent: &str) -> Result<Vec<Application>, DomainError> {
        self.list(Filter::new().eq("assignedAgent", agent)).await
    }

    /// Applications submitted by `email`, newest first.
    ///
    /// # Errors
    ///
    /// `Upstream` on store failures.
    pub async fn list_by_applicant(&self, email: &str) -> Result<Vec<Application>, DomainError> {
        self.list(Filter::new().eq("email", email)).await
    }

    /// Approved applications submitted by `email`, newest first.
    ///
    /// # Errors
    ///
    /// `Upstream` on store failures.
    pub async fn list_approved(&self, email: &str) -> Result<Vec<Application>, DomainError> {
        self.list(
            Filter::new()
                .eq("email", email)
                .eq("status", ApplicationStatus::Approved.as_str()),
        )
        .await
    }

    /// Filtered transactions, newest first, with their summed total.
    ///
    /// # Errors
    ///
    /// `Upstream` on store failures.
    pub async fn transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<TransactionReport, DomainError> {
        let mut filter = Filter::new();
        if let Some(from) = query.from {
            filter = filter.since("date", from);
        }
        if let Some(to) = query.to {
            filter = filter.until("date", to);
        }
        if let Some(user) = &query.user {
            filter = filter.contains("email", user);
        }
        if let Some(policy) = &query.policy {
            filter = filter.contains("policyName", policy);
        }

        let documents = self
            .store
            .find(
                collections::TRANSACTIONS,
                FindQuery::new().filter(filter).sort(Sort::desc("date")),
            )
            .await?;
        let transactions: Vec<Transaction> = decode_vec(documents)?;
        let total_income = total_of(&transactions);
        Ok(TransactionReport { transactions, total_income })
    }

    async fn list(&self, filter: Filter) -> Result<Vec<Application>, DomainError> {
        let documents = self
            .store
            .find(
                collections::APPLICATIONS,
                FindQuery::new().filter(filter).sort(Sort::desc("appliedAt")),
            )
            .await?;
        Ok(decode_vec(documents)?)
    }

    async fn fetch(&self, id: ApplicationId) -> Result<Application, DomainError> {
        let document = self
            .store
            .find_one(collections::APPLICATIONS, &Filter::new().eq("id", id.to_string()))
            .await?
            .ok_or_else(|| DomainError::not_found("Application", id))?;
        Ok(decode(document)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Policy, PolicyId};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Deterministic clock ticking one whole second per call, so timestamp
    /// ordering in assertions is exact.
    struct StepClock {
        start: DateTime<Utc>,
        ticks: AtomicI64,
    }

    impl StepClock {
        fn new() -> Self {
            Self {
                start: "2026-01-01T00:00:00Z".parse().unwrap(),
                ticks: AtomicI64::new(0),
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            self.start + chrono::Duration::seconds(tick)
        }
    }

    fn service() -> (Arc<MemoryStore>, LifecycleService) {
        let store = Arc::new(MemoryStore::new());
        let lifecycle =
            LifecycleService::with_clock(store.clone(), Arc::new(StepClock::new()));
        (store, lifecycle)
    }

    async fn seed_policy(store: &MemoryStore) -> PolicyId {
        let policy = Policy {
            id: PolicyId::new(),
            title: "Term Life 20".to_owned(),
            category: Some("term".to_owned()),
            description: None,
            min_age: Some(18),
            max_age: Some(65),
            base_premium: Some(42.0),
            image: None,
            coverage_range: None,
            duration_options: Vec::new(),
            eligibility: Vec::new(),
            benefits: Vec::new(),
            premium_logic: None,
            purchase_count: 0,
            rating: None,
            created_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            updated_at: None,
        };
        store
            .insert(collections::POLICIES, encode(&policy).unwrap())
            .await
            .unwrap();
        policy.id
    }

    async fn purchase_count(store: &MemoryStore, policy: PolicyId) -> i64 {
        store
            .find_one(collections::POLICIES, &Filter::new().eq("id", policy.to_string()))
            .await
            .unwrap()
            .unwrap()["purchaseCount"]
            .as_i64()
            .unwrap()
    }

    fn submission(policy: &str) -> SubmitApplication {
        SubmitApplication {
            email: Some("a@x.com".to_owned()),
            policy_id: Some(policy.to_owned()),
            policy_name: Some("Term Life 20".to_owned()),
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn submit_forces_pending_even_when_caller_supplies_status() {
        let (_, lifecycle) = service();
        let hostile: SubmitApplication = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "policyId": "P1",
            "status": "Approved",
            "assignedAgent": "mallory",
            "nomineeName": "R. Doe",
        }))
        .unwrap();

        let application = lifecycle.submit(hostile).await.unwrap();
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert_eq!(application.assigned_agent, None);
        // Benign extension fields survive; lifecycle-owned ones do not.
        assert!(application.extra.contains_key("nomineeName"));
        assert!(!application.extra.contains_key("status"));
    }

    #[tokio::test]
    async fn submit_requires_email_and_policy() {
        let (_, lifecycle) = service();

        let no_email = SubmitApplication {
            email: None,
            policy_id: Some("P1".to_owned()),
            policy_name: None,
            extra: Map::new(),
        };
        assert!(matches!(
            lifecycle.submit(no_email).await,
            Err(DomainError::InvalidArgument(_))
        ));

        let bad_email = SubmitApplication {
            email: Some("not-an-email".to_owned()),
            policy_id: Some("P1".to_owned()),
            policy_name: None,
            extra: Map::new(),
        };
        assert!(matches!(
            lifecycle.submit(bad_email).await,
            Err(DomainError::InvalidArgument(_))
        ));

        let no_policy = SubmitApplication {
            email: Some("a@x.com".to_owned()),
            policy_id: None,
            policy_name: None,
            extra: Map::new(),
        };
        assert!(matches!(
            lifecycle.submit(no_policy).await,
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn assign_approves_and_increments_counter_once() {
        let (store, lifecycle) = service();
        let policy = seed_policy(&store).await;
        let application = lifecycle
            .submit(submission(&policy.to_string()))
            .await
            .unwrap();

        let approved = lifecycle.assign(application.id, "agent1").await.unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);
        assert_eq!(approved.assigned_agent.as_deref(), Some("agent1"));
        assert_eq!(purchase_count(&store, policy).await, 1);
    }

    #[tokio::test]
    async fn reapproval_is_idempotent_and_never_double_counts() {
        let (store, lifecycle) = service();
        let policy = seed_policy(&store).await;
        let application = lifecycle
            .submit(submission(&policy.to_string()))
            .await
            .unwrap();

        lifecycle.assign(application.id, "agent1").await.unwrap();
        let second = lifecycle.assign(application.id, "agent1").await.unwrap();

        assert_eq!(second.status, ApplicationStatus::Approved);
        assert_eq!(purchase_count(&store, policy).await, 1);
    }

    #[tokio::test]
    async fn reject_never_touches_the_counter() {
        let (store, lifecycle) = service();
        let policy = seed_policy(&store).await;
        let application = lifecycle
            .submit(submission(&policy.to_string()))
            .await
            .unwrap();

        let rejected = lifecycle.reject(application.id).await.unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
        assert_eq!(purchase_count(&store, policy).await, 0);

        // Rejection is terminal: a late assign is a no-op.
        let still_rejected = lifecycle.assign(application.id, "agent1").await.unwrap();
        assert_eq!(still_rejected.status, ApplicationStatus::Rejected);
        assert_eq!(purchase_count(&store, policy).await, 0);
    }

    #[tokio::test]
    async fn assign_and_reject_fail_not_found_for_unknown_ids() {
        let (_, lifecycle) = service();
        let unknown = ApplicationId::new();

        assert!(matches!(
            lifecycle.assign(unknown, "agent1").await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            lifecycle.reject(unknown).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn assign_requires_an_agent_identity() {
        let (_, lifecycle) = service();
        assert!(matches!(
            lifecycle.assign(ApplicationId::new(), "  ").await,
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn payment_status_updates_without_touching_lifecycle_status() {
        let (store, lifecycle) = service();
        let policy = seed_policy(&store).await;
        let application = lifecycle
            .submit(submission(&policy.to_string()))
            .await
            .unwrap();
        lifecycle.assign(application.id, "agent1").await.unwrap();

        let updated = lifecycle
            .update_payment_status(application.id, "paid")
            .await
            .unwrap();
        assert_eq!(updated.status, ApplicationStatus::Approved);
        assert_eq!(updated.payment_status.as_deref(), Some("paid"));
        // Setting the attribute again did not re-increment.
        assert_eq!(purchase_count(&store, policy).await, 1);
    }

    #[tokio::test]
    async fn list_by_agent_returns_only_that_agents_applications_newest_first() {
        let (_, lifecycle) = service();

        let first = lifecycle.submit(submission("P1")).await.unwrap();
        let second = lifecycle.submit(submission("P2")).await.unwrap();
        let other = lifecycle.submit(submission("P3")).await.unwrap();

        lifecycle.assign(first.id, "agent1").await.unwrap();
        lifecycle.assign(second.id, "agent1").await.unwrap();
        lifecycle.assign(other.id, "agent2").await.unwrap();

        let mine = lifecycle.list_by_agent("agent1").await.unwrap();
        assert_eq!(
            mine.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert!(mine.iter().all(|a| a.assigned_agent.as_deref() == Some("agent1")));
    }

    #[tokio::test]
    async fn recorded_payments_sum_into_the_report_total() {
        let (_, lifecycle) = service();

        for (amount, email) in [(12_000, "a@x.com"), (5_500, "b@y.com")] {
            lifecycle
                .record_payment(NewPayment {
                    email: Some(email.to_owned()),
                    policy_id: Some("P1".to_owned()),
                    policy_name: Some("Term Life 20".to_owned()),
                    amount: Some(Money::from_cents(amount)),
                    extra: Map::new(),
                })
                .await
                .unwrap();
        }

        let report = lifecycle.transactions(TransactionQuery::default()).await.unwrap();
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.total_income, Money::from_cents(17_500));

        // Payer substring filter narrows the total.
        let filtered = lifecycle
            .transactions(TransactionQuery {
                user: Some("A@X".to_owned()),
                ..TransactionQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.transactions.len(), 1);
        assert_eq!(filtered.total_income, Money::from_cents(12_000));
    }

    #[tokio::test]
    async fn record_payment_validates_email_and_amount() {
        let (_, lifecycle) = service();

        let missing_amount = NewPayment {
            email: Some("a@x.com".to_owned()),
            policy_id: None,
            policy_name: None,
            amount: None,
            extra: Map::new(),
        };
        assert!(matches!(
            lifecycle.record_payment(missing_amount).await,
            Err(DomainError::InvalidArgument(_))
        ));

        let negative = NewPayment {
            email: Some("a@x.com".to_owned()),
            policy_id: None,
            policy_name: None,
            amount: Some(Money::from_cents(-1)),
            extra: Map::new(),
        };
        assert!(matches!(
            lifecycle.record_payment(negative).await,
            Err(DomainError::InvalidArgument(_))
        ));
    }

    proptest! {
        #[test]
        fn report_total_equals_sum_of_amounts(amounts in prop::collection::vec(-1_000_000_i64..1_000_000, 0..64)) {
            let transactions: Vec<Transaction> = amounts
                .iter()
                .map(|cents| Transaction {
                    id: TransactionId::new(),
                    email: "a@x.com".to_owned(),
                    policy_id: None,
                    policy_name: None,
                    amount: Money::from_cents(*cents),
                    date: "2026-01-01T00:00:00Z".parse().unwrap(),
                    extra: Map::new(),
                })
                .collect();
            prop_assert_eq!(total_of(&transactions).cents(), amounts.iter().sum::<i64>());
        }
    }
}
