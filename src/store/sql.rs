//! SQLite-backed resource partition.
//!
//! One table, `objects(partition, uri, object)`, shared by every
//! partition instance (distinguished by `partition` name). `put` deletes
//! then inserts within one transaction so a write is always a full
//! replacement, never a partial merge.

use axum::async_trait;
use sqlx::SqlitePool;

use super::{Criteria, ResourceStore};
use crate::error::{AppError, Result};
use crate::resource::Resource;

pub struct SqlResourceStore {
    pool: SqlitePool,
    partition: String,
}

impl SqlResourceStore {
    pub async fn new(pool: SqlitePool, partition: impl Into<String>) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                partition TEXT NOT NULL,
                uri TEXT NOT NULL,
                object JSON NOT NULL,
                PRIMARY KEY (partition, uri)
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self {
            pool,
            partition: partition.into(),
        })
    }
}

#[async_trait]
impl ResourceStore for SqlResourceStore {
    async fn get(&self, uri: &str) -> Result<Option<Resource>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT object FROM objects WHERE partition = ? AND uri = ? LIMIT 1",
        )
        .bind(&self.partition)
        .bind(uri)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(json,)| {
            serde_json::from_str(&json)
                .map_err(|e| AppError::Store(format!("corrupt row for {uri}: {e}")))
        })
        .transpose()
    }

    async fn is_stored(&self, uri: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT count(*) FROM objects WHERE partition = ? AND uri = ?",
        )
        .bind(&self.partition)
        .bind(uri)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn put(&self, resource: Resource) -> Result<()> {
        let uri = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("resource must have an 'id' property".into()))?
            .to_string();
        let body = serde_json::to_string(&resource)
            .map_err(|e| AppError::Store(format!("failed to serialize resource: {e}")))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM objects WHERE partition = ? AND uri = ?")
            .bind(&self.partition)
            .bind(&uri)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO objects (partition, uri, object) VALUES (?, ?, ?)")
            .bind(&self.partition)
            .bind(&uri)
            .bind(&body)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, uri: &str) -> Result<()> {
        sqlx::query("DELETE FROM objects WHERE partition = ? AND uri = ?")
            .bind(&self.partition)
            .bind(uri)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, criteria: Criteria) -> Result<Vec<Resource>> {
        // Field names become JSON-path fragments; values are always bound
        // as parameters, never interpolated, even though they originate
        // from our own call sites rather than untrusted input.
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (key, value) in criteria.iter() {
            if key.starts_with('@') {
                continue;
            }
            let literal = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            clauses.push(format!(
                "(json_extract(object, '$.{key}') = ? \
                 OR (json_type(object, '$.{key}') = 'array' \
                     AND ? IN (SELECT value FROM json_each(object, '$.{key}'))))"
            ));
            values.push(literal);
        }

        let sql = if clauses.is_empty() {
            "SELECT object FROM objects WHERE partition = ? LIMIT 100".to_string()
        } else {
            format!(
                "SELECT object FROM objects WHERE partition = ? AND {} LIMIT 100",
                clauses.join(" AND ")
            )
        };

        let mut query = sqlx::query_as(&sql).bind(&self.partition);
        for literal in &values {
            query = query.bind(literal).bind(literal);
        }
        let rows: Vec<(String,)> = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(json,)| {
                serde_json::from_str(&json)
                    .map_err(|e| AppError::Store(format!("corrupt row: {e}")))
            })
            .collect()
    }
}
