//! Application state shared across every request: the routed store,
//! authentication/authorization pipelines, delivery service, and the
//! tenant table used to resolve a request's prefix into its server
//! identity.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::basic::BasicAuthenticator;
use crate::auth::bearer::BearerAuthenticator;
use crate::auth::signature::SignatureAuthenticator;
use crate::auth::{Authenticator, AuthenticatorChain};
use crate::authz::engine::CoreAuthorizer;
use crate::authz::{Authorizer, AuthorizerChain};
use crate::config::{AppConfig, StoreBackend};
use crate::delivery::{DeliveryService, HttpDeliveryService};
use crate::error::{AppError, Result};
use crate::store::ResourceStore;
use crate::store::fetch::FetchFallbackStore;
use crate::store::file::FileResourceStore;
use crate::store::memory::MemoryResourceStore;
use crate::store::prefix::PrefixRoutedStore;
use crate::store::sql::SqlResourceStore;

/// Shared, cheaply-cloned application state. Every field is already an
/// `Arc` internally, so `Context` itself derives `Clone`.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ResourceStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub delivery: Arc<dyn DeliveryService>,
    pub http_client: reqwest::Client,
    pub tenant_prefixes: Vec<String>,
}

impl Context {
    pub async fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("initializing application context");

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("firm/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.server.http_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        let tenant_table = config.tenant_table();
        let tenant_prefixes: Vec<String> = tenant_table.keys().cloned().collect();

        let mut tenant_stores: HashMap<String, Arc<dyn ResourceStore>> = HashMap::new();
        for prefix in tenant_table.keys() {
            let store = build_partition(&config, prefix).await?;
            tenant_stores.insert(prefix.clone(), store);
        }

        let remote_store = build_partition(&config, "remote").await?;
        let private_store = build_partition(&config, "private").await?;

        let routed = PrefixRoutedStore::new(tenant_stores, remote_store, private_store);
        let store: Arc<dyn ResourceStore> = Arc::new(FetchFallbackStore::new(
            routed,
            http_client.clone(),
            config.store.fetch_fallback,
        ));

        let authenticator: Arc<dyn Authenticator> = Arc::new(AuthenticatorChain::new(vec![
            Arc::new(SignatureAuthenticator::new(store.clone())),
            Arc::new(BasicAuthenticator::new(store.clone())),
            Arc::new(BearerAuthenticator::new(store.clone())),
        ]));

        let authorizers: Vec<Arc<dyn Authorizer>> = tenant_prefixes
            .iter()
            .map(|prefix| {
                Arc::new(CoreAuthorizer::new(prefix.clone(), store.clone())) as Arc<dyn Authorizer>
            })
            .collect();
        let authorizer: Arc<dyn Authorizer> = Arc::new(AuthorizerChain::new(authorizers));

        let delivery: Arc<dyn DeliveryService> =
            Arc::new(HttpDeliveryService::new(http_client.clone(), store.clone()));

        tracing::info!(tenants = tenant_prefixes.len(), "context ready");

        Ok(Self {
            config: Arc::new(config),
            store,
            authenticator,
            authorizer,
            delivery,
            http_client,
            tenant_prefixes,
        })
    }
}

/// Build one concrete partition store per the configured backend. Each
/// partition (a tenant, `remote`, `private`) gets its own namespace when
/// backed by SQL or the filesystem.
async fn build_partition(config: &AppConfig, partition: &str) -> Result<Arc<dyn ResourceStore>> {
    match &config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryResourceStore::new())),
        StoreBackend::File => {
            let root = config
                .store
                .file_root
                .as_ref()
                .ok_or_else(|| AppError::Config("store.file_root required for file backend".into()))?;
            Ok(Arc::new(
                FileResourceStore::new(root, partition).map_err(|e| AppError::Store(e.to_string()))?,
            ))
        }
        StoreBackend::Sql => {
            let path = config
                .store
                .sql_path
                .as_ref()
                .ok_or_else(|| AppError::Config("store.sql_path required for sql backend".into()))?;
            let url = format!("sqlite://{}?mode=rwc", path.display());
            let pool = sqlx::SqlitePool::connect(&url).await?;
            Ok(Arc::new(SqlResourceStore::new(pool, partition).await?))
        }
    }
}
