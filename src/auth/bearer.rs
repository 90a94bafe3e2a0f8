//! Bearer token authentication against `firm:Credentials` documents.

use axum::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::{AuthRequest, Authenticator, Identity};
use crate::error::{AppError, Result};
use crate::resource::ns;
use crate::store::ResourceStore;

pub struct BearerAuthenticator {
    store: Arc<dyn ResourceStore>,
}

impl BearerAuthenticator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authenticator for BearerAuthenticator {
    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Option<Identity>> {
        let Some(header) = request.header("authorization") else {
            return Ok(None);
        };
        let Some(token) = header.strip_prefix("Bearer ") else {
            return Ok(None);
        };
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let Some(credentials) = self
            .store
            .query_one(
                json!({
                    "@prefix": "urn:",
                    "type": ns::CREDENTIALS,
                    (ns::TOKEN): token,
                })
                .as_object()
                .expect("literal object")
                .clone(),
            )
            .await?
        else {
            return Ok(None);
        };

        let actor_uri = credentials
            .get("attributedTo")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("credentials document has no attributedTo".into()))?;

        let actor = self
            .store
            .get(actor_uri)
            .await?
            .ok_or_else(|| AppError::AuthenticationError(format!("unknown user: {actor_uri}")))?;

        Ok(Some(Identity::new(actor)))
    }
}
