//! Authorization: deciding whether an already-authenticated (or anonymous)
//! principal may read or write a given resource.
//!
//! [`Authorizer`] is the single extension seam; [`CoreAuthorizer`] (in
//! [`engine`]) implements the rule set that ships by default. A chain lets
//! a deployment layer additional rules in front of or behind the core.

pub mod engine;

use axum::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::Result;
use crate::resource::Resource;

/// The outcome of an authorization check. `status_code` lets a denial
/// distinguish "not authenticated" (401) from "authenticated but
/// forbidden" (403, the default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub authorized: bool,
    pub reason: String,
    pub status_code: StatusCode,
}

impl AuthorizationDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            authorized: true,
            reason: reason.into(),
            status_code: StatusCode::OK,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            reason: reason.into(),
            status_code: StatusCode::FORBIDDEN,
        }
    }

    pub fn deny_with_status(reason: impl Into<String>, status_code: StatusCode) -> Self {
        Self {
            authorized: false,
            reason: reason.into(),
            status_code,
        }
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_get_authorized(
        &self,
        principal: Option<&Identity>,
        resource: &Resource,
    ) -> Result<AuthorizationDecision>;

    async fn is_post_authorized(
        &self,
        principal: Option<&Identity>,
        box_type: &str,
        box_uri: &str,
    ) -> Result<AuthorizationDecision>;

    async fn is_activity_authorized(
        &self,
        principal: Option<&Identity>,
        activity: &Resource,
    ) -> Result<AuthorizationDecision>;
}

/// Tries each authorizer in turn, returning the first denial or the last
/// authorizer's decision if all allow.
pub struct AuthorizerChain {
    authorizers: Vec<Arc<dyn Authorizer>>,
}

impl AuthorizerChain {
    pub fn new(authorizers: Vec<Arc<dyn Authorizer>>) -> Self {
        Self { authorizers }
    }
}

#[async_trait]
impl Authorizer for AuthorizerChain {
    async fn is_get_authorized(
        &self,
        principal: Option<&Identity>,
        resource: &Resource,
    ) -> Result<AuthorizationDecision> {
        let mut decision = AuthorizationDecision::deny("no authorizers configured");
        for authorizer in &self.authorizers {
            decision = authorizer.is_get_authorized(principal, resource).await?;
            if !decision.authorized {
                return Ok(decision);
            }
        }
        Ok(decision)
    }

    async fn is_post_authorized(
        &self,
        principal: Option<&Identity>,
        box_type: &str,
        box_uri: &str,
    ) -> Result<AuthorizationDecision> {
        let mut decision = AuthorizationDecision::deny("no authorizers configured");
        for authorizer in &self.authorizers {
            decision = authorizer.is_post_authorized(principal, box_type, box_uri).await?;
            if !decision.authorized {
                return Ok(decision);
            }
        }
        Ok(decision)
    }

    async fn is_activity_authorized(
        &self,
        principal: Option<&Identity>,
        activity: &Resource,
    ) -> Result<AuthorizationDecision> {
        let mut decision = AuthorizationDecision::deny("no authorizers configured");
        for authorizer in &self.authorizers {
            decision = authorizer.is_activity_authorized(principal, activity).await?;
            if !decision.authorized {
                return Ok(decision);
            }
        }
        Ok(decision)
    }
}
