//! In-memory resource partition.
//!
//! Backed by a `HashMap` behind a single `RwLock`; intended for tests and
//! for the private partition in small deployments.

use axum::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Criteria, ResourceStore, is_match};
use crate::error::{AppError, Result};
use crate::resource::Resource;

#[derive(Default)]
pub struct MemoryResourceStore {
    objects: RwLock<HashMap<String, Resource>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn get(&self, uri: &str) -> Result<Option<Resource>> {
        Ok(self.objects.read().await.get(uri).cloned())
    }

    async fn is_stored(&self, uri: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(uri))
    }

    async fn put(&self, mut resource: Resource) -> Result<()> {
        let id = match resource.get("id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => {
                let id = format!("urn:uuid:{}", ulid::Ulid::new());
                resource
                    .as_object_mut()
                    .ok_or_else(|| AppError::Store("resource must be a JSON object".into()))?
                    .insert("id".into(), id.clone().into());
                id
            }
        };
        self.objects.write().await.insert(id, resource);
        Ok(())
    }

    async fn remove(&self, uri: &str) -> Result<()> {
        self.objects.write().await.remove(uri);
        Ok(())
    }

    async fn query(&self, criteria: Criteria) -> Result<Vec<Resource>> {
        let objects = self.objects.read().await;
        Ok(objects
            .values()
            .filter(|doc| is_match(doc, &criteria))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_update_upsert_roundtrip() {
        let store = MemoryResourceStore::new();
        let resource = json!({"id": "test", "name": "test data"});
        assert!(!store.is_stored("test").await.unwrap());
        store.put(resource.clone()).await.unwrap();
        assert!(store.is_stored("test").await.unwrap());
        assert_eq!(store.get("test").await.unwrap(), Some(resource));

        let mut updates = serde_json::Map::new();
        updates.insert("name".into(), json!("updated"));
        store.update("test", updates).await.unwrap();
        let updated = store.get("test").await.unwrap().unwrap();
        assert_eq!(updated["name"], json!("updated"));

        let mut criteria = serde_json::Map::new();
        criteria.insert("id".into(), json!("test"));
        let mut updates = serde_json::Map::new();
        updates.insert("name".into(), json!("upserted"));
        store.upsert(criteria, updates).await.unwrap();
        assert_eq!(store.get("test").await.unwrap().unwrap()["name"], json!("upserted"));

        let mut criteria = serde_json::Map::new();
        criteria.insert("id".into(), json!("test2"));
        let mut updates = serde_json::Map::new();
        updates.insert("name".into(), json!("inserted"));
        store.upsert(criteria, updates).await.unwrap();
        assert!(store.is_stored("test2").await.unwrap());
    }

    #[tokio::test]
    async fn query_one_errors_on_multiple_matches() {
        let store = MemoryResourceStore::new();
        store.put(json!({"id": "a", "kind": "x"})).await.unwrap();
        store.put(json!({"id": "b", "kind": "x"})).await.unwrap();
        let mut criteria = serde_json::Map::new();
        criteria.insert("kind".into(), json!("x"));
        assert!(store.query_one(criteria).await.is_err());
    }
}
