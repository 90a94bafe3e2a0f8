//! Outbound activity delivery.
//!
//! Resolves the inboxes addressed by an activity's `to`/`cc`/`bto`/`bcc`
//! fields (expanding any `followers` collection to its members), signs one
//! HTTP request per inbox with the sending actor's key, and delivers with
//! bounded concurrency.

use axum::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::auth::signature::sign_request;
use crate::error::{AppError, Result};
use crate::resource::{AP_PUBLIC_URIS, Resource, resource_id};
use crate::store::ResourceStore;
use crate::store::prefix::url_prefix;

const MAX_CONCURRENT_DELIVERIES: usize = 10;
const ADDRESSING_FIELDS: &[&str] = &["to", "cc", "bto", "bcc", "audience"];

#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Deliver `activity`, sent by `sender`, to every inbox its addressing
    /// fields resolve to. Individual inbox failures are logged, not
    /// propagated: delivery is best-effort per recipient.
    async fn deliver(&self, sender: &Resource, activity: &Resource) -> Result<Vec<DeliveryResult>>;
}

#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub inbox_uri: String,
    pub success: bool,
    pub error: Option<String>,
}

pub struct HttpDeliveryService {
    client: reqwest::Client,
    store: Arc<dyn ResourceStore>,
}

impl HttpDeliveryService {
    pub fn new(client: reqwest::Client, store: Arc<dyn ResourceStore>) -> Self {
        Self { client, store }
    }

    /// Collect recipient actor URIs from an activity's addressing fields,
    /// dropping the public collection URI and the sender itself.
    fn recipient_actor_uris(&self, sender_uri: &str, activity: &Resource) -> Vec<String> {
        let mut uris = HashSet::new();
        for field in ADDRESSING_FIELDS {
            match activity.get(field) {
                Some(serde_json::Value::String(s)) => {
                    uris.insert(s.clone());
                }
                Some(serde_json::Value::Array(items)) => {
                    for item in items {
                        if let Some(id) = resource_id(item) {
                            uris.insert(id.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        uris.retain(|uri| !AP_PUBLIC_URIS.contains(&uri.as_str()) && uri != sender_uri);
        uris.into_iter().collect()
    }

    /// Expand a recipient URI into one or more inboxes: actors resolve to
    /// their own inbox, a `followers` collection URI resolves to every
    /// follower's inbox.
    async fn resolve_inboxes(&self, sender_uri: &str, recipient_uri: &str) -> Vec<String> {
        let Ok(Some(resource)) = self.store.get(recipient_uri).await else {
            return Vec::new();
        };

        if let Some(inbox) = resource.get("inbox").and_then(|v| v.as_str()) {
            return vec![inbox.to_string()];
        }

        if resource.get("orderedItems").is_some() || resource.get("items").is_some() {
            let prefix = url_prefix(recipient_uri).unwrap_or_else(|| recipient_uri.to_string());
            let is_followers_collection = self
                .store
                .query_one(
                    serde_json::json!({ "@prefix": prefix, "followers": recipient_uri })
                        .as_object()
                        .expect("literal object")
                        .clone(),
                )
                .await
                .ok()
                .flatten()
                .is_some();

            if is_followers_collection {
                let items = resource
                    .get("orderedItems")
                    .or_else(|| resource.get("items"))
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();

                let mut inboxes = Vec::new();
                for item in items {
                    if let Some(follower_uri) = resource_id(&item) {
                        if follower_uri == sender_uri {
                            continue;
                        }
                        if let Ok(Some(follower)) = self.store.get(follower_uri).await {
                            if let Some(inbox) = follower.get("inbox").and_then(|v| v.as_str()) {
                                inboxes.push(inbox.to_string());
                            }
                        }
                    }
                }
                return inboxes;
            }
        }

        Vec::new()
    }

    async fn deliver_to_inbox(&self, sender: &Resource, inbox_uri: &str, activity: &Resource) -> Result<()> {
        let key_id = sender
            .get("publicKey")
            .and_then(|pk| pk.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Federation("sender has no publicKey.id".into()))?;
        let private_key_pem = sender
            .get("privateKeyPem")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Federation("sender has no privateKeyPem".into()))?;

        let body = serde_json::to_vec(activity)
            .map_err(|e| AppError::Federation(format!("failed to serialize activity: {e}")))?;

        let signed = sign_request("POST", inbox_uri, Some(&body), private_key_pem, key_id)?;

        let mut request = self
            .client
            .post(inbox_uri)
            .header("Content-Type", "application/activity+json")
            .header("Date", signed.date)
            .header("Signature", signed.signature);
        if let Some(digest) = signed.digest {
            request = request.header("Digest", digest);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Federation(format!("failed to deliver to {inbox_uri}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Federation(format!(
                "inbox {inbox_uri} rejected activity: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryService for HttpDeliveryService {
    async fn deliver(&self, sender: &Resource, activity: &Resource) -> Result<Vec<DeliveryResult>> {
        let sender_uri = resource_id(sender)
            .ok_or_else(|| AppError::Federation("sender has no id".into()))?
            .to_string();

        let recipients = self.recipient_actor_uris(&sender_uri, activity);
        let mut inboxes = HashSet::new();
        for recipient in recipients {
            for inbox in self.resolve_inboxes(&sender_uri, &recipient).await {
                inboxes.insert(inbox);
            }
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DELIVERIES));
        let activity = Arc::new(activity.clone());
        let sender = Arc::new(sender.clone());
        let mut tasks = Vec::new();

        for inbox_uri in inboxes {
            let semaphore = semaphore.clone();
            let activity = activity.clone();
            let sender = sender.clone();
            let client = self.client.clone();
            let store = self.store.clone();
            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let service = HttpDeliveryService { client, store };
                let result = service.deliver_to_inbox(&sender, &inbox_uri, &activity).await;
                if let Err(ref error) = result {
                    tracing::warn!(inbox_uri, %error, "delivery failed");
                }
                crate::metrics::DELIVERY_ATTEMPTS_TOTAL
                    .with_label_values(&[if result.is_ok() { "success" } else { "failure" }])
                    .inc();
                DeliveryResult {
                    inbox_uri,
                    success: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                }
            });
            tasks.push(task);
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Ok(result) = task.await {
                results.push(result);
            }
        }
        Ok(results)
    }
}
