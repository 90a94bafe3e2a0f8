//! HTTP Basic authentication against `firm:Credentials` documents.

use axum::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::json;
use std::sync::Arc;

use super::{AuthRequest, Authenticator, Identity};
use crate::error::{AppError, Result};
use crate::resource::ns;
use crate::store::ResourceStore;

pub struct BasicAuthenticator {
    store: Arc<dyn ResourceStore>,
}

impl BasicAuthenticator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Option<Identity>> {
        let Some(header) = request.header("authorization") else {
            return Ok(None);
        };
        let Some(encoded) = header.strip_prefix("Basic ") else {
            return Ok(None);
        };

        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::AuthenticationError(format!("invalid base64 in Basic credentials: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| AppError::AuthenticationError(format!("invalid utf-8 in Basic credentials: {e}")))?;

        // Split on the last ':' so passwords may themselves contain ':'. The
        // part before the colon is the actor URI itself, not a separate
        // username field.
        let Some(sep) = decoded.rfind(':') else {
            return Err(AppError::AuthenticationError("malformed Basic credentials".into()));
        };
        let (actor_uri, password) = (&decoded[..sep], &decoded[sep + 1..]);

        let Some(credentials) = self
            .store
            .query_one(
                json!({
                    "@prefix": "urn:",
                    "type": ns::CREDENTIALS,
                    "attributedTo": actor_uri,
                })
                .as_object()
                .expect("literal object")
                .clone(),
            )
            .await?
        else {
            return Ok(None);
        };

        let hash = credentials
            .get(ns::PASSWORD)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store(format!("credentials document has no {}", ns::PASSWORD)))?;

        if !bcrypt::verify(password, hash)
            .map_err(|e| AppError::AuthenticationError(format!("bcrypt verification failed: {e}")))?
        {
            return Ok(None);
        }

        let actor = self
            .store
            .get(actor_uri)
            .await?
            .ok_or_else(|| AppError::AuthenticationError(format!("unknown user: {actor_uri}")))?;

        Ok(Some(Identity::new(actor)))
    }
}
