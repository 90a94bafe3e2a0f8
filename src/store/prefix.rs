//! Prefix-routed resource store.
//!
//! Routes each operation to one of: a configured tenant partition, the
//! shared remote partition (for non-tenant `http(s)` URIs), or the private
//! partition (for `urn:` identifiers). This is the store the rest of the
//! system is built against; tenants never see each other's resources and
//! remote caching never touches tenant data.

use axum::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use super::{Criteria, ResourceStore};
use crate::error::{AppError, Result};
use crate::resource::Resource;

/// `scheme://host[:port]` for a URI, used as the routing key.
pub fn url_prefix(uri: &str) -> Option<String> {
    let parsed = Url::parse(uri).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

fn is_private_prefix(prefix: &str) -> bool {
    prefix.starts_with("urn:")
}

pub struct PrefixRoutedStore {
    tenant_stores: HashMap<String, Arc<dyn ResourceStore>>,
    remote_store: Arc<dyn ResourceStore>,
    private_store: Arc<dyn ResourceStore>,
}

impl PrefixRoutedStore {
    pub fn new(
        tenant_stores: HashMap<String, Arc<dyn ResourceStore>>,
        remote_store: Arc<dyn ResourceStore>,
        private_store: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            tenant_stores,
            remote_store,
            private_store,
        }
    }

    pub fn is_tenant(&self, prefix: &str) -> bool {
        self.tenant_stores.contains_key(prefix) || self.tenant_stores.contains_key("*")
    }

    fn store_for_prefix(&self, prefix: &str) -> Result<&Arc<dyn ResourceStore>> {
        if is_private_prefix(prefix) {
            return Ok(&self.private_store);
        }
        if let Some(store) = self.tenant_stores.get(prefix) {
            return Ok(store);
        }
        if let Some(store) = self.tenant_stores.get("*") {
            return Ok(store);
        }
        Ok(&self.remote_store)
    }

    fn store_for_uri(&self, uri: &str) -> Result<&Arc<dyn ResourceStore>> {
        if is_private_prefix(uri) {
            return self.store_for_prefix(uri);
        }
        let prefix = url_prefix(uri)
            .ok_or_else(|| AppError::Validation(format!("invalid resource URI: {uri}")))?;
        self.store_for_prefix(&prefix)
    }

    /// Extract and strip the `@prefix` routing key from query criteria.
    fn take_prefix(criteria: &mut Criteria) -> Result<String> {
        criteria
            .remove("@prefix")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| AppError::Validation("query criteria has no @prefix".into()))
    }
}

#[async_trait]
impl ResourceStore for PrefixRoutedStore {
    async fn get(&self, uri: &str) -> Result<Option<Resource>> {
        self.store_for_uri(uri)?.get(uri).await
    }

    async fn is_stored(&self, uri: &str) -> Result<bool> {
        self.store_for_uri(uri)?.is_stored(uri).await
    }

    async fn put(&self, resource: Resource) -> Result<()> {
        let uri = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Validation("resource has no id".into()))?
            .to_string();
        self.store_for_uri(&uri)?.put(resource).await
    }

    async fn remove(&self, uri: &str) -> Result<()> {
        self.store_for_uri(uri)?.remove(uri).await
    }

    async fn query(&self, mut criteria: Criteria) -> Result<Vec<Resource>> {
        let prefix = Self::take_prefix(&mut criteria)?;
        self.store_for_prefix(&prefix)?.query(criteria).await
    }

    async fn query_one(&self, mut criteria: Criteria) -> Result<Option<Resource>> {
        let prefix = Self::take_prefix(&mut criteria)?;
        self.store_for_prefix(&prefix)?.query_one(criteria).await
    }

    async fn update(&self, uri: &str, updates: serde_json::Map<String, serde_json::Value>) -> Result<()> {
        self.store_for_uri(uri)?.update(uri, updates).await
    }

    async fn upsert(
        &self,
        mut criteria: Criteria,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let prefix = Self::take_prefix(&mut criteria)?;
        self.store_for_prefix(&prefix)?.upsert(criteria, updates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryResourceStore;
    use serde_json::json;

    #[tokio::test]
    async fn routes_by_tenant_and_remote_prefix() {
        let tenant1 = Arc::new(MemoryResourceStore::new());
        let tenant2 = Arc::new(MemoryResourceStore::new());
        let remote = Arc::new(MemoryResourceStore::new());
        let private = Arc::new(MemoryResourceStore::new());

        let mut tenants: HashMap<String, Arc<dyn ResourceStore>> = HashMap::new();
        tenants.insert("https://example1.test".into(), tenant1.clone());
        tenants.insert("https://example2.test".into(), tenant2.clone());

        let store = PrefixRoutedStore::new(tenants, remote.clone(), private);

        let r1 = json!({"id": "https://example1.test/r1"});
        store.put(r1.clone()).await.unwrap();
        let r2 = json!({"id": "https://example2.test/r2"});
        store.put(r2.clone()).await.unwrap();
        let r3 = json!({"id": "https://remote.test/foo"});
        store.put(r3.clone()).await.unwrap();

        assert_eq!(store.get("https://example1.test/r1").await.unwrap(), Some(r1.clone()));
        assert_eq!(tenant1.get("https://example1.test/r1").await.unwrap(), Some(r1));
        assert_eq!(tenant1.get("https://remote.test/foo").await.unwrap(), None);
        assert_eq!(tenant2.get("https://example1.test/r1").await.unwrap(), None);
        assert_eq!(remote.get("https://remote.test/foo").await.unwrap(), Some(r3));
    }
}
