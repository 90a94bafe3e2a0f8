//! HTTP fetch-fallback decorator.
//!
//! Wraps a [`PrefixRoutedStore`] so that a `get()` for an unknown remote
//! `http(s)` URI is transparently fetched over the network, cached into
//! the remote partition, and returned. Tenant and private lookups are
//! never subject to fetch fallback.

use axum::async_trait;

use super::prefix::{PrefixRoutedStore, url_prefix};
use super::{Criteria, ResourceStore};
use crate::error::Result;
use crate::metrics::STORE_FETCH_FALLBACK_TOTAL;
use crate::resource::Resource;

fn is_http_uri(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

pub struct FetchFallbackStore {
    inner: PrefixRoutedStore,
    client: reqwest::Client,
    enabled: bool,
}

impl FetchFallbackStore {
    pub fn new(inner: PrefixRoutedStore, client: reqwest::Client, enabled: bool) -> Self {
        Self {
            inner,
            client,
            enabled,
        }
    }

    pub fn is_tenant(&self, prefix: &str) -> bool {
        self.inner.is_tenant(prefix)
    }

    async fn fetch(&self, uri: &str) -> Option<Resource> {
        tracing::info!(uri, "fetching remote resource");
        let result: anyhow::Result<Resource> = async {
            let response = self
                .client
                .get(uri)
                .header("Accept", "application/activity+json")
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json().await?)
        }
        .await;

        match result {
            Ok(resource) => {
                STORE_FETCH_FALLBACK_TOTAL.with_label_values(&["success"]).inc();
                Some(resource)
            }
            Err(error) => {
                tracing::warn!(uri, %error, "failed to fetch remote resource");
                STORE_FETCH_FALLBACK_TOTAL.with_label_values(&["failure"]).inc();
                None
            }
        }
    }
}

#[async_trait]
impl ResourceStore for FetchFallbackStore {
    async fn get(&self, uri: &str) -> Result<Option<Resource>> {
        if let Some(resource) = self.inner.get(uri).await? {
            return Ok(Some(resource));
        }

        let prefix = url_prefix(uri);
        let eligible = self.enabled
            && is_http_uri(uri)
            && !prefix.as_deref().is_some_and(|p| self.inner.is_tenant(p));

        if !eligible {
            return Ok(None);
        }

        if let Some(resource) = self.fetch(uri).await {
            self.inner.put(resource.clone()).await?;
            return Ok(Some(resource));
        }
        Ok(None)
    }

    async fn is_stored(&self, uri: &str) -> Result<bool> {
        self.inner.is_stored(uri).await
    }

    async fn put(&self, resource: Resource) -> Result<()> {
        self.inner.put(resource).await
    }

    async fn remove(&self, uri: &str) -> Result<()> {
        self.inner.remove(uri).await
    }

    async fn query(&self, criteria: Criteria) -> Result<Vec<Resource>> {
        self.inner.query(criteria).await
    }

    async fn query_one(&self, criteria: Criteria) -> Result<Option<Resource>> {
        self.inner.query_one(criteria).await
    }

    async fn update(&self, uri: &str, updates: serde_json::Map<String, serde_json::Value>) -> Result<()> {
        self.inner.update(uri, updates).await
    }

    async fn upsert(
        &self,
        criteria: Criteria,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.inner.upsert(criteria, updates).await
    }
}
