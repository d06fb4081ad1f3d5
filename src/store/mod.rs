//! Document-store abstraction.
//!
//! Every operation in the backend is a short sequence of calls against a
//! shared document store. The store is passed explicitly (constructor
//! injection) so handlers and services can run against either the
//! PostgreSQL-backed implementation or the in-memory one used by tests.
//!
//! The contract mirrors what the service actually needs from a document
//! database: insert, filtered find with sort/skip/limit, count, a single
//! conditional update carrying `$set`-style field writes plus `$inc`-style
//! atomic integer increments, and delete.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Collection names used by the backend.
pub mod collections {
    /// Policy applications.
    pub const APPLICATIONS: &str = "applications";
    /// Insurance products.
    pub const POLICIES: &str = "policies";
    /// Completed payments.
    pub const TRANSACTIONS: &str = "transactions";
    /// User accounts.
    pub const USERS: &str = "users";
    /// Blog posts.
    pub const BLOGS: &str = "blogs";
    /// Policy reviews.
    pub const REVIEWS: &str = "reviews";
    /// Insurance claims.
    pub const CLAIMS: &str = "claims";
    /// Newsletter subscriptions.
    pub const NEWSLETTERS: &str = "newsletters";
}

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying database failed or is unreachable.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A document was structurally invalid (e.g. missing its id).
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

/// A single filter condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Field equals value.
    Eq(String, Value),
    /// String field contains the needle, case-insensitively.
    Contains(String, String),
    /// Timestamp field is at or after the bound.
    Since(String, DateTime<Utc>),
    /// Timestamp field is at or before the bound.
    Until(String, DateTime<Utc>),
}

/// Conjunction of filter conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Creates an empty filter.
    #[must_use]
    pub const fn new() -> Self {
        Self { conditions: Vec::new() }
    }

    /// Requires `field == value`.
    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.to_owned(), value.into()));
        self
    }

    /// Requires the string field to contain `needle`, case-insensitively.
    #[must_use]
    pub fn contains(mut self, field: &str, needle: &str) -> Self {
        self.conditions
            .push(Condition::Contains(field.to_owned(), needle.to_owned()));
        self
    }

    /// Requires `field >= bound` on a timestamp field.
    #[must_use]
    pub fn since(mut self, field: &str, bound: DateTime<Utc>) -> Self {
        self.conditions.push(Condition::Since(field.to_owned(), bound));
        self
    }

    /// Requires `field <= bound` on a timestamp field.
    #[must_use]
    pub fn until(mut self, field: &str, bound: DateTime<Utc>) -> Self {
        self.conditions.push(Condition::Until(field.to_owned(), bound));
        self
    }

    /// The conjunction's conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Single-field sort. Numeric fields order numerically, strings
/// lexicographically (RFC 3339 timestamps therefore order chronologically).
#[derive(Debug, Clone)]
pub struct Sort {
    /// Field to order by.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

impl Sort {
    /// Ascending sort on `field`.
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_owned(), order: SortOrder::Ascending }
    }

    /// Descending sort on `field`.
    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_owned(), order: SortOrder::Descending }
    }
}

/// A find request: filter plus optional sort and pagination window.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    /// Conditions documents must match.
    pub filter: Filter,
    /// Optional ordering.
    pub sort: Option<Sort>,
    /// Documents to skip from the front of the result.
    pub skip: Option<u64>,
    /// Maximum documents to return.
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Creates a query matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Skips the first `n` matches.
    #[must_use]
    pub const fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Caps the result at `n` documents.
    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Field writes applied by [`DocumentStore::update_one`].
///
/// Increments are applied atomically relative to the stored value, which is
/// what makes the policy purchase counter safe under concurrent approvals.
#[derive(Debug, Clone, Default)]
pub struct Update {
    /// Fields to overwrite.
    pub set: Map<String, Value>,
    /// Integer fields to increment (missing fields start at 0).
    pub inc: Vec<(String, i64)>,
}

impl Update {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites `field` with `value`.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_owned(), value.into());
        self
    }

    /// Atomically adds `delta` to the integer `field`.
    #[must_use]
    pub fn inc(mut self, field: &str, delta: i64) -> Self {
        self.inc.push((field.to_owned(), delta));
        self
    }
}

/// Result of an update call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOutcome {
    /// Documents that matched the filter.
    pub matched: u64,
    /// Whether an upsert inserted a new document.
    pub upserted: bool,
}

/// Per-collection document operations.
///
/// Documents are JSON objects. `insert` injects a generated `id` field
/// (UUID v4, string form) when the document does not carry one.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document and returns it as stored.
    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StoreError>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Value>, StoreError>;

    /// Returns all documents matching the query, honoring sort/skip/limit.
    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<Value>, StoreError>;

    /// Counts documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Applies `update` to at most one document matching `filter`.
    ///
    /// With `upsert` set, a new document is built from the filter's equality
    /// conditions plus the update's `set` fields when nothing matches.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Deletes at most one document matching `filter`; returns deleted count.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Injects a generated string-form UUID `id` when the document lacks one.
pub(crate) fn inject_id(document: &mut Value) {
    if let Value::Object(map) = document {
        if !map.contains_key("id") {
            map.insert(
                "id".to_owned(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }
}

/// Builds the document an upsert inserts when nothing matched: the filter's
/// equality conditions, the update's `set` fields, and increments applied
/// from zero.
pub(crate) fn upsert_document(filter: &Filter, update: &Update) -> Value {
    let mut map = Map::new();
    for condition in filter.conditions() {
        if let Condition::Eq(field, value) = condition {
            map.insert(field.clone(), value.clone());
        }
    }
    for (field, value) in &update.set {
        map.insert(field.clone(), value.clone());
    }
    for (field, delta) in &update.inc {
        let current = map.get(field).and_then(Value::as_i64).unwrap_or(0);
        map.insert(field.clone(), Value::from(current + delta));
    }
    let mut document = Value::Object(map);
    inject_id(&mut document);
    document
}

/// Encodes a typed record into a storable document.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when the record cannot be
/// represented as JSON.
pub fn encode<T: serde::Serialize>(record: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(record)?)
}

/// Decodes a stored document into a typed record.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when the document does not match
/// the record shape.
pub fn decode<T: DeserializeOwned>(document: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(document)?)
}

/// Decodes a batch of stored documents.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] on the first document that does not
/// match the record shape.
pub fn decode_vec<T: DeserializeOwned>(documents: Vec<Value>) -> Result<Vec<T>, StoreError> {
    documents.into_iter().map(decode).collect()
}
