//! `PostgreSQL`-backed document store.
//!
//! Documents live in a single `documents` table as JSONB, keyed by
//! `(collection, id)`. Filters and sorts compile to jsonb expressions with
//! runtime-built queries, so the crate builds without a live database.
//! Increments execute inside a single `UPDATE` statement, giving the
//! per-document atomicity the purchase counter relies on.

use super::{
    inject_id, upsert_document, Condition, DocumentStore, Filter, FindQuery, SortOrder,
    StoreError, Update, UpdateOutcome,
};
use crate::config::PostgresConfig;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         UUID NOT NULL,
    data       JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
)";

/// Document store over a `PostgreSQL` connection pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects, configures the pool, and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the database is unreachable or
    /// the schema cannot be created.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .connect(&config.url)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!("document store schema ready");
        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for condition in filter.conditions() {
        builder.push(" AND ");
        match condition {
            Condition::Eq(field, value) => {
                builder.push("data -> ");
                builder.push_bind(field.clone());
                builder.push("::text = ");
                builder.push_bind(value.clone());
            }
            Condition::Contains(field, needle) => {
                builder.push("data ->> ");
                builder.push_bind(field.clone());
                builder.push("::text ILIKE '%' || ");
                builder.push_bind(escape_like(needle));
                builder.push(" || '%' ESCAPE '\\'");
            }
            Condition::Since(field, bound) => {
                builder.push("(data ->> ");
                builder.push_bind(field.clone());
                builder.push("::text)::timestamptz >= ");
                builder.push_bind(*bound);
            }
            Condition::Until(field, bound) => {
                builder.push("(data ->> ");
                builder.push_bind(field.clone());
                builder.push("::text)::timestamptz <= ");
                builder.push_bind(*bound);
            }
        }
    }
}

/// Escapes LIKE metacharacters so a user-supplied needle matches
/// literally, the same way the in-memory store treats it.
fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert(&self, collection: &str, mut document: Value) -> Result<Value, StoreError> {
        inject_id(&mut document);
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| StoreError::MalformedDocument("document id is not a UUID".into()))?;

        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(&document)
            .execute(&self.pool)
            .await?;
        Ok(document)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let query = FindQuery::new().filter(filter.clone()).limit(1);
        Ok(self.find(collection, query).await?.into_iter().next())
    }

    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<Value>, StoreError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_owned());
        push_conditions(&mut builder, &query.filter);

        if let Some(sort) = &query.sort {
            builder.push(" ORDER BY data -> ");
            builder.push_bind(sort.field.clone());
            builder.push("::text");
            builder.push(match sort.order {
                SortOrder::Ascending => " ASC",
                SortOrder::Descending => " DESC",
            });
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(clamp_i64(limit));
        }
        if let Some(skip) = query.skip {
            builder.push(" OFFSET ");
            builder.push_bind(clamp_i64(skip));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| row.try_get::<Value, _>("data").map_err(StoreError::from))
            .collect()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) AS count FROM documents WHERE collection = ",
        );
        builder.push_bind(collection.to_owned());
        push_conditions(&mut builder, filter);

        let row = builder.build().fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE documents SET data = ");

        for _ in &update.inc {
            builder.push("jsonb_set(");
        }
        if update.set.is_empty() {
            builder.push("data");
        } else {
            builder.push("data || ");
            builder.push_bind(Value::Object(update.set.clone()));
        }
        // Innermost jsonb_set pairs with the last pushed prefix, so close in
        // reverse. Each increment reads the pre-update row value.
        for (field, delta) in update.inc.iter().rev() {
            builder.push(", ARRAY[");
            builder.push_bind(field.clone());
            builder.push("::text], to_jsonb(COALESCE((data ->> ");
            builder.push_bind(field.clone());
            builder.push("::text)::bigint, 0) + ");
            builder.push_bind(*delta);
            builder.push("))");
        }

        builder.push(" WHERE ctid IN (SELECT ctid FROM documents WHERE collection = ");
        builder.push_bind(collection.to_owned());
        push_conditions(&mut builder, filter);
        builder.push(" LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;
        let matched = result.rows_affected();

        if matched == 0 && upsert {
            self.insert(collection, upsert_document(filter, &update)).await?;
            return Ok(UpdateOutcome { matched: 0, upserted: true });
        }
        Ok(UpdateOutcome { matched, upserted: false })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "DELETE FROM documents WHERE ctid IN \
             (SELECT ctid FROM documents WHERE collection = ",
        );
        builder.push_bind(collection.to_owned());
        push_conditions(&mut builder, filter);
        builder.push(" LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn escape_like_neutralizes_metacharacters() {
        assert_eq!(escape_like("100%_sure"), "100\\%\\_sure");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn contains_condition_carries_an_escape_clause() {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT data FROM documents WHERE collection = ");
        builder.push_bind("transactions");
        push_conditions(&mut builder, &Filter::new().contains("email", "a%b"));
        assert!(builder.build().sql().contains("ESCAPE '\\'"));
    }
}
