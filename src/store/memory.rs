//! In-memory document store.
//!
//! Backs every test and doubles as a dev fallback when no database is
//! configured. Semantics match the PostgreSQL implementation: insertion
//! order is preserved, sorts are stable, and increments are applied under
//! the same write lock that serializes updates.

use super::{
    inject_id, upsert_document, Condition, DocumentStore, Filter, FindQuery, SortOrder,
    StoreError, Update, UpdateOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Thread-safe in-memory store keyed by collection name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn matches(document: &Value, filter: &Filter) -> bool {
    filter.conditions().iter().all(|condition| match condition {
        Condition::Eq(field, value) => document.get(field) == Some(value),
        Condition::Contains(field, needle) => document
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
        Condition::Since(field, bound) => document
            .get(field)
            .and_then(parse_timestamp)
            .is_some_and(|ts| ts >= *bound),
        Condition::Until(field, bound) => document
            .get(field)
            .and_then(parse_timestamp)
            .is_some_and(|ts| ts <= *bound),
    })
}

/// Orders two field values the way jsonb does: numbers numerically,
/// strings lexicographically. Missing fields sort first.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(nx), Some(ny)) => nx.partial_cmp(&ny).unwrap_or(Ordering::Equal),
            _ => match (x.as_str(), y.as_str()) {
                (Some(sx), Some(sy)) => sx.cmp(sy),
                _ => x.to_string().cmp(&y.to_string()),
            },
        },
    }
}

fn apply_update(document: &mut Value, update: &Update) {
    let Value::Object(map) = document else { return };
    for (field, value) in &update.set {
        map.insert(field.clone(), value.clone());
    }
    for (field, delta) in &update.inc {
        let current = map.get(field).and_then(Value::as_i64).unwrap_or(0);
        map.insert(field.clone(), Value::from(current + delta));
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, mut document: Value) -> Result<Value, StoreError> {
        inject_id(&mut document);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_owned())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, filter)).cloned()))
    }

    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut result: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(doc, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = &query.sort {
            result.sort_by(|a, b| {
                let ordering = compare_fields(a.get(&sort.field), b.get(&sort.field));
                match sort.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let skip = usize::try_from(query.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let mut windowed: Vec<Value> = result.into_iter().skip(skip).collect();
        if let Some(limit) = query.limit {
            windowed.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(windowed)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| matches(doc, filter)).count())
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();

        if let Some(document) = docs.iter_mut().find(|doc| matches(doc, filter)) {
            apply_update(document, &update);
            return Ok(UpdateOutcome { matched: 1, upserted: false });
        }

        if upsert {
            docs.push(upsert_document(filter, &update));
            return Ok(UpdateOutcome { matched: 0, upserted: true });
        }

        Ok(UpdateOutcome { matched: 0, upserted: false })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| matches(doc, filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Sort;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn insert_injects_generated_id() {
        let store = MemoryStore::new();
        let doc = store
            .insert("things", json!({ "name": "a" }))
            .await
            .unwrap();
        let id = doc["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn find_filters_by_equality_and_contains() {
        let store = MemoryStore::new();
        store
            .insert("users", json!({ "email": "Alice@X.com", "role": "agent" }))
            .await
            .unwrap();
        store
            .insert("users", json!({ "email": "bob@y.com", "role": "customer" }))
            .await
            .unwrap();

        let agents = store
            .find("users", FindQuery::new().filter(Filter::new().eq("role", "agent")))
            .await
            .unwrap();
        assert_eq!(agents.len(), 1);

        let by_substring = store
            .find(
                "users",
                FindQuery::new().filter(Filter::new().contains("email", "ALICE")),
            )
            .await
            .unwrap();
        assert_eq!(by_substring.len(), 1);
    }

    #[tokio::test]
    async fn contains_treats_pattern_metacharacters_literally() {
        let store = MemoryStore::new();
        store
            .insert("users", json!({ "email": "alice@x.com" }))
            .await
            .unwrap();
        store
            .insert("users", json!({ "email": "100%@x.com" }))
            .await
            .unwrap();

        let wildcard = Filter::new().contains("email", "%");
        assert_eq!(store.count("users", &wildcard).await.unwrap(), 1);

        let underscore = Filter::new().contains("email", "_");
        assert_eq!(store.count("users", &underscore).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_sorts_numbers_numerically() {
        let store = MemoryStore::new();
        for count in [2, 10, 1] {
            store
                .insert("policies", json!({ "purchaseCount": count }))
                .await
                .unwrap();
        }
        let sorted = store
            .find(
                "policies",
                FindQuery::new().sort(Sort::desc("purchaseCount")),
            )
            .await
            .unwrap();
        let counts: Vec<i64> = sorted
            .iter()
            .map(|doc| doc["purchaseCount"].as_i64().unwrap())
            .collect();
        assert_eq!(counts, vec![10, 2, 1]);
    }

    #[tokio::test]
    async fn find_applies_skip_and_limit_after_sort() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store.insert("items", json!({ "n": n })).await.unwrap();
        }
        let page = store
            .find(
                "items",
                FindQuery::new().sort(Sort::asc("n")).skip(1).limit(2),
            )
            .await
            .unwrap();
        let ns: Vec<i64> = page.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2]);
    }

    #[tokio::test]
    async fn date_range_filters_inclusive_bounds() {
        let store = MemoryStore::new();
        for date in ["2026-01-01T00:00:00Z", "2026-02-01T00:00:00Z", "2026-03-01T00:00:00Z"] {
            store
                .insert("transactions", json!({ "date": date }))
                .await
                .unwrap();
        }
        let filter = Filter::new()
            .since("date", "2026-01-15T00:00:00Z".parse().unwrap())
            .until("date", "2026-02-01T00:00:00Z".parse().unwrap());
        assert_eq!(store.count("transactions", &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_one_increments_atomically_from_missing_field() {
        let store = MemoryStore::new();
        let doc = store.insert("policies", json!({ "title": "Term" })).await.unwrap();
        let id = doc["id"].clone();

        let filter = Filter::new().eq("id", id.clone());
        for _ in 0..3 {
            store
                .update_one("policies", &filter, Update::new().inc("purchaseCount", 1), false)
                .await
                .unwrap();
        }
        let updated = store.find_one("policies", &filter).await.unwrap().unwrap();
        assert_eq!(updated["purchaseCount"], json!(3));
    }

    #[tokio::test]
    async fn conditional_update_matches_zero_when_condition_fails() {
        let store = MemoryStore::new();
        let doc = store
            .insert("applications", json!({ "status": "Approved" }))
            .await
            .unwrap();
        let filter = Filter::new()
            .eq("id", doc["id"].clone())
            .eq("status", "Pending");
        let outcome = store
            .update_one("applications", &filter, Update::new().set("status", "Approved"), false)
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);
        assert!(!outcome.upserted);
    }

    #[tokio::test]
    async fn upsert_builds_document_from_filter_and_set() {
        let store = MemoryStore::new();
        let filter = Filter::new().eq("email", "a@x.com");
        let outcome = store
            .update_one("users", &filter, Update::new().set("name", "Alice"), true)
            .await
            .unwrap();
        assert!(outcome.upserted);

        let user = store.find_one("users", &filter).await.unwrap().unwrap();
        assert_eq!(user["name"], json!("Alice"));
        assert!(user["id"].is_string());
    }

    #[tokio::test]
    async fn delete_one_removes_a_single_document() {
        let store = MemoryStore::new();
        store.insert("blogs", json!({ "title": "a" })).await.unwrap();
        store.insert("blogs", json!({ "title": "a" })).await.unwrap();
        let deleted = store
            .delete_one("blogs", &Filter::new().eq("title", "a"))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count("blogs", &Filter::new()).await.unwrap(), 1);
    }
}
