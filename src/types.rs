//! Domain types for the life-insurance marketplace.
//!
//! Value objects (identifiers, money, statuses) and the records stored in
//! each collection. All wire names are camelCase to match the public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id! {
    /// Unique identifier for an application.
    ApplicationId
}
define_id! {
    /// Unique identifier for a policy.
    PolicyId
}
define_id! {
    /// Unique identifier for a transaction.
    TransactionId
}
define_id! {
    /// Unique identifier for a blog post.
    BlogId
}
define_id! {
    /// Unique identifier for a claim.
    ClaimId
}

// ============================================================================
// Money
// ============================================================================

/// A monetary amount in minor units (cents).
///
/// Stored and transmitted as an integer number of cents so that transaction
/// totals sum exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a `Money` value from cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole dollars.
    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Converts a fractional dollar amount, rounding to the nearest cent.
    #[must_use]
    pub fn from_dollars_f64(dollars: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self((dollars * 100.0).round() as i64)
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true for amounts below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Saturating addition, used when summing transaction totals.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

// ============================================================================
// Statuses and roles
// ============================================================================

/// Lifecycle status of an application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    /// Submitted, awaiting agent review.
    #[default]
    Pending,
    /// Approved by an agent; terminal for the status field.
    Approved,
    /// Rejected; terminal.
    Rejected,
}

impl ApplicationStatus {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role attached to a user account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular marketplace customer.
    #[default]
    Customer,
    /// Staff member handling applications and claims.
    Agent,
    /// Administrator.
    Admin,
}

impl UserRole {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A customer's request to purchase a policy, tracked through a status
/// lifecycle.
///
/// Known fields are typed; anything else the applicant sent travels in the
/// `extra` extensions map (lifecycle-owned fields are stripped from it on
/// submission).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Generated identifier.
    pub id: ApplicationId,
    /// Applicant email address.
    pub email: String,
    /// Opaque reference to the target policy.
    pub policy_id: String,
    /// Display name of the target policy, if the applicant supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
    /// Lifecycle status; always `Pending` on submission.
    #[serde(default)]
    pub status: ApplicationStatus,
    /// Agent assigned on approval.
    #[serde(default)]
    pub assigned_agent: Option<String>,
    /// Post-approval payment status, decoupled from the lifecycle status.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Submission timestamp.
    pub applied_at: DateTime<Utc>,
    /// Applicant-supplied extension fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An insurance product offering.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Generated identifier.
    pub id: PolicyId,
    /// Policy title.
    pub title: String,
    /// Product category.
    #[serde(default)]
    pub category: Option<String>,
    /// Marketing description.
    #[serde(default)]
    pub description: Option<String>,
    /// Minimum eligible age.
    #[serde(default)]
    pub min_age: Option<u32>,
    /// Maximum eligible age.
    #[serde(default)]
    pub max_age: Option<u32>,
    /// Base premium in dollars (descriptive, never computed on).
    #[serde(default)]
    pub base_premium: Option<f64>,
    /// Cover image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Human-readable coverage range.
    #[serde(default)]
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
    #[serde(default)]
    pub premium_logic: Option<String>,
    /// How many approved applications reference this policy. Monotonic.
    #[serde(default)]
    pub purchase_count: u64,
    /// Latest review rating; overwritten by each new review.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An immutable record of a completed payment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Generated identifier.
    pub id: TransactionId,
    /// Payer email address.
    pub email: String,
    /// Reference to the paid-for policy.
    #[serde(default)]
    pub policy_id: Option<String>,
    /// Display name of the paid-for policy.
    #[serde(default)]
    pub policy_name: Option<String>,
    /// Paid amount in cents.
    pub amount: Money,
    /// When the payment completed.
    pub date: DateTime<Utc>,
    /// Gateway-supplied extension fields (intent id, card brand, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A marketplace user account, addressed by email.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Generated identifier.
    pub id: Uuid,
    /// Account email, lowercased.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Account role.
    #[serde(default)]
    pub role: UserRole,
    /// First-seen timestamp.
    pub created_at: DateTime<Utc>,
    /// Last login timestamp.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// A blog post with a visit counter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    /// Generated identifier.
    pub id: BlogId,
    /// Post title.
    pub title: String,
    /// Post body.
    pub details: String,
    /// Cover image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Author display name.
    pub author: String,
    /// Author profile URL or avatar.
    #[serde(default)]
    pub author_profile: Option<String>,
    /// Author email, lowercased.
    pub author_email: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Total page visits. Incremented atomically on each read.
    #[serde(default)]
    pub total_visit: u64,
}

/// A customer review of a policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Generated identifier.
    pub id: Uuid,
    /// Reviewed policy.
    pub policy_id: String,
    /// Star rating, 1-5.
    pub rating: f64,
    /// Review text.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Reviewer display name.
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Reviewer email.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An insurance claim filed by a customer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// Generated identifier.
    pub id: ClaimId,
    /// Claimant email address.
    pub user_email: String,
    /// Reference to the claimed-against policy.
    #[serde(default)]
    pub policy_id: Option<String>,
    /// Display name of the claimed-against policy.
    #[serde(default)]
    pub policy_name: Option<String>,
    /// Claim status, free text ("Pending", "Approved", ...).
    pub status: String,
    /// When the claim was filed.
    pub claim_date: DateTime<Utc>,
    /// Claimant-supplied extension fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A newsletter subscription, unique per email.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSubscription {
    /// Generated identifier.
    pub id: Uuid,
    /// Subscriber email.
    pub email: String,
    /// Subscription timestamp.
    pub created_at: DateTime<Utc>,
}
