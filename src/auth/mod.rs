//! Authentication: resolving a request to an [`Identity`].
//!
//! Each [`Authenticator`] inspects a request and returns either an
//! identity or `None`; an [`AuthenticatorChain`] tries each in turn and
//! returns the first success. This mirrors the ActivityPub ecosystem's
//! practice of accepting several credential schemes on the same inbox.

pub mod basic;
pub mod bearer;
pub mod signature;

use axum::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::resource::Resource;

/// The authenticated actor behind a request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub actor: Resource,
}

impl Identity {
    pub fn new(actor: Resource) -> Self {
        Self { actor }
    }

    /// The actor's `id`. Panics if the actor document has no string `id`,
    /// which would indicate a store invariant violation rather than a
    /// request-time error.
    pub fn uri(&self) -> &str {
        self.actor
            .get("id")
            .and_then(|v| v.as_str())
            .expect("identity actor document must have a string id")
    }
}

/// A transport-agnostic view of the parts of an HTTP request that
/// authenticators need. Built once per request by the HTTP host layer
/// (`src/http.rs`) so the authentication pipeline never depends on axum.
pub struct AuthRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub headers: &'a http::HeaderMap,
    pub body: &'a [u8],
}

impl<'a> AuthRequest<'a> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Option<Identity>>;
}

/// First authenticator to return an identity wins.
pub struct AuthenticatorChain {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AuthenticatorChain {
    pub fn new(authenticators: Vec<Arc<dyn Authenticator>>) -> Self {
        Self { authenticators }
    }
}

#[async_trait]
impl Authenticator for AuthenticatorChain {
    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Option<Identity>> {
        for authenticator in &self.authenticators {
            if let Some(identity) = authenticator.authenticate(request).await? {
                return Ok(Some(identity));
            }
        }
        Ok(None)
    }
}
