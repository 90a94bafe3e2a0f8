//! The resource store contract and its concrete partitions.
//!
//! A [`ResourceStore`] is a content-addressed bag of JSON documents keyed by
//! their `id`. Every partition (memory, file, SQL) and every decorator
//! (prefix routing, fetch fallback) implements the same trait, so the
//! dispatch engine never needs to know which partition it is talking to.

pub mod fetch;
pub mod file;
pub mod memory;
pub mod prefix;
pub mod sql;

use axum::async_trait;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::resource::Resource;

/// Criteria for `query`/`query_one`/`upsert`.
///
/// A document matches if, for every non-`@`-prefixed key, the document's
/// value at that key equals the criterion value or (for array-valued
/// fields) contains it. A `@prefix` key routes the query to a partition in
/// [`prefix::PrefixRoutedStore`] and is stripped before matching.
pub type Criteria = Map<String, Value>;

/// Keys beginning with `@` are routing metadata, not match criteria.
fn is_match(doc: &Value, criteria: &Criteria) -> bool {
    criteria.iter().all(|(key, expected)| {
        if key.starts_with('@') {
            return true;
        }
        match doc.get(key) {
            Some(Value::Array(items)) => items.contains(expected),
            Some(actual) => actual == expected,
            None => false,
        }
    })
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, uri: &str) -> Result<Option<Resource>>;

    async fn is_stored(&self, uri: &str) -> Result<bool> {
        Ok(self.get(uri).await?.is_some())
    }

    async fn put(&self, resource: Resource) -> Result<()>;

    async fn remove(&self, uri: &str) -> Result<()>;

    async fn query(&self, criteria: Criteria) -> Result<Vec<Resource>>;

    /// Returns the single matching document, `None` if there are no
    /// matches, and an error if there is more than one.
    async fn query_one(&self, criteria: Criteria) -> Result<Option<Resource>> {
        let mut matches = self.query(criteria).await?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            _ => Err(AppError::Store("multiple matches for query_one".into())),
        }
    }

    /// Merge `updates` into the existing document named by `uri`. `id`
    /// cannot be changed this way. Fails if `uri` is unknown.
    async fn update(&self, uri: &str, updates: Map<String, Value>) -> Result<()> {
        let mut resource = self
            .get(uri)
            .await?
            .ok_or_else(|| AppError::Store(format!("unknown resource: {uri}")))?;
        let map = resource
            .as_object_mut()
            .ok_or_else(|| AppError::Store(format!("resource is not an object: {uri}")))?;
        for (k, v) in updates {
            if k == "id" {
                continue;
            }
            map.insert(k, v);
        }
        self.put(resource).await
    }

    /// Insert-or-update: `criteria` must include `id`. If no document
    /// matches `criteria`, one is created from it before `updates` is
    /// applied.
    async fn upsert(&self, criteria: Criteria, updates: Map<String, Value>) -> Result<()> {
        if !criteria.contains_key("id") {
            return Err(AppError::Store("id must be in criteria for upsert".into()));
        }
        let mut resource = match self.query_one(criteria.clone()).await? {
            Some(existing) => existing,
            None => Value::Object(criteria),
        };
        let map = resource
            .as_object_mut()
            .ok_or_else(|| AppError::Store("upsert target is not an object".into()))?;
        for (k, v) in updates {
            if k == "id" {
                continue;
            }
            map.insert(k, v);
        }
        self.put(resource).await
    }
}
