//! The default authorization rule set.
//!
//! Ported rule-for-rule from the reference authorization service: object
//! visibility is derived from addressing fields and box ownership rather
//! than an ACL table, and activities are authorized by type rather than by
//! a generic permission check.

use axum::async_trait;
use std::sync::Arc;

use super::{AuthorizationDecision, Authorizer};
use crate::auth::Identity;
use crate::error::Result;
use crate::metrics::AUTHZ_DECISIONS_TOTAL;
use crate::resource::{
    self, Resource, get_id, has_value, is_actor_collection, is_actor_object, is_public,
    is_recipient, is_type, is_type_any, resource_id,
};
use crate::store::ResourceStore;
use crate::store::prefix::url_prefix;

pub struct CoreAuthorizer {
    server_prefix: String,
    store: Arc<dyn ResourceStore>,
}

impl CoreAuthorizer {
    pub fn new(server_prefix: impl Into<String>, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            server_prefix: server_prefix.into(),
            store,
        }
    }

    async fn is_blocked(&self, request_actor_uri: &str) -> Result<AuthorizationDecision> {
        let blocks = self
            .store
            .query_one(
                serde_json::json!({
                    "@prefix": "urn:",
                    "type": resource::ns::BLOCKS,
                    "attributedTo": self.server_prefix,
                })
                .as_object()
                .expect("literal object")
                .clone(),
            )
            .await?;

        let Some(blocks) = blocks else {
            return Ok(AuthorizationDecision::allow("not blocked"));
        };

        if let Some(domains) = blocks.get(resource::ns::BLOCKED_DOMAIN).and_then(|v| v.as_array()) {
            if let Ok(parsed) = url::Url::parse(request_actor_uri) {
                if let Some(host) = parsed.host_str() {
                    if domains.iter().any(|d| d.as_str() == Some(host)) {
                        return Ok(AuthorizationDecision::deny("inbox post is blocked for domain"));
                    }
                }
            }
        }

        if let Some(actors) = blocks.get(resource::ns::BLOCKED_ACTOR).and_then(|v| v.as_array()) {
            if actors.iter().any(|a| a.as_str() == Some(request_actor_uri)) {
                return Ok(AuthorizationDecision::deny("inbox post is blocked for actor"));
            }
        }

        Ok(AuthorizationDecision::allow("not blocked"))
    }

    /// The `@prefix` routing key for a resource owned by some actor: the
    /// actor's own tenant (or remote) partition, derived from the
    /// resource's own URI the same way the store routes `get`/`put`.
    fn routing_prefix(resource_uri: &str) -> serde_json::Value {
        match url_prefix(resource_uri) {
            Some(prefix) => serde_json::Value::String(prefix),
            None => serde_json::Value::String(resource_uri.to_string()),
        }
    }

    async fn is_outbox(&self, resource_uri: &str) -> Result<bool> {
        Ok(self
            .store
            .query_one(
                serde_json::json!({ "@prefix": Self::routing_prefix(resource_uri), "outbox": resource_uri })
                    .as_object()
                    .expect("literal object")
                    .clone(),
            )
            .await?
            .is_some())
    }

    async fn is_inbox(&self, resource_uri: &str) -> Result<bool> {
        Ok(self
            .store
            .query_one(
                serde_json::json!({ "@prefix": Self::routing_prefix(resource_uri), "inbox": resource_uri })
                    .as_object()
                    .expect("literal object")
                    .clone(),
            )
            .await?
            .is_some())
    }

    async fn box_owner(&self, resource_uri: &str) -> Result<Option<Resource>> {
        let prefix = Self::routing_prefix(resource_uri);
        if let Some(owner) = self
            .store
            .query_one(
                serde_json::json!({ "@prefix": prefix.clone(), "inbox": resource_uri })
                    .as_object()
                    .expect("literal object")
                    .clone(),
            )
            .await?
        {
            return Ok(Some(owner));
        }
        self.store
            .query_one(
                serde_json::json!({ "@prefix": prefix, "outbox": resource_uri })
                    .as_object()
                    .expect("literal object")
                    .clone(),
            )
            .await
    }
}

fn is_attributed_user(principal: &Identity, resource: &Resource) -> bool {
    has_value(resource, "attributedTo", principal.uri())
}

fn is_activity_actor(principal: &Identity, resource: &Resource) -> bool {
    if let Some(actors) = resource.get("actor") {
        match actors {
            serde_json::Value::String(s) => return s == principal.uri(),
            serde_json::Value::Object(o) => {
                return o.get("id").and_then(|v| v.as_str()) == Some(principal.uri());
            }
            serde_json::Value::Array(items) => {
                return items.iter().any(|v| v.as_str() == Some(principal.uri()));
            }
            _ => {}
        }
    }
    get_id(resource.get("attributedTo")).contains(principal.uri())
}

#[async_trait]
impl Authorizer for CoreAuthorizer {
    async fn is_get_authorized(
        &self,
        principal: Option<&Identity>,
        resource: &Resource,
    ) -> Result<AuthorizationDecision> {
        let request_actor_uri = principal.map(Identity::uri);
        let resource_uri = resource_id(resource).unwrap_or_default();

        if let Some(actor_uri) = request_actor_uri {
            let blocked = self.is_blocked(actor_uri).await?;
            if !blocked.authorized {
                record("get", &blocked);
                return Ok(blocked);
            }
        }

        let decision = if is_public(resource) {
            AuthorizationDecision::allow("public object")
        } else if is_actor_object(resource) {
            AuthorizationDecision::allow("allow actor access")
        } else if self.is_outbox(resource_uri).await? {
            AuthorizationDecision::allow("public outbox read is allowed")
        } else if self.is_inbox(resource_uri).await? {
            let owner = self.box_owner(resource_uri).await?;
            let owns = owner
                .as_ref()
                .and_then(|o| o.get("id"))
                .and_then(|v| v.as_str())
                == request_actor_uri;
            if owns {
                AuthorizationDecision::allow("in/outbox access allowed for owner")
            } else if request_actor_uri.is_none() {
                AuthorizationDecision::deny_with_status(
                    "anonymous inbox read not allowed",
                    reqwest::StatusCode::UNAUTHORIZED,
                )
            } else {
                AuthorizationDecision::deny("inbox read allowed only for owner")
            }
        } else if request_actor_uri.is_some_and(|uri| is_recipient(resource, uri)) {
            AuthorizationDecision::allow("object recipient access is allowed")
        } else if let Some(principal) = principal {
            if is_attributed_user(principal, resource) {
                AuthorizationDecision::allow("object attributed to user")
            } else if is_activity_actor(principal, resource) {
                AuthorizationDecision::allow("activity actor is user")
            } else {
                AuthorizationDecision::deny("no authorization")
            }
        } else {
            AuthorizationDecision::deny_with_status(
                "authentication required",
                reqwest::StatusCode::UNAUTHORIZED,
            )
        };

        record("get", &decision);
        Ok(decision)
    }

    async fn is_post_authorized(
        &self,
        principal: Option<&Identity>,
        box_type: &str,
        box_uri: &str,
    ) -> Result<AuthorizationDecision> {
        let decision = match principal {
            Some(principal) if box_type == "inbox" => {
                let blocked = self.is_blocked(principal.uri()).await?;
                if !blocked.authorized {
                    blocked
                } else {
                    AuthorizationDecision::allow("authenticated users can post to inbox")
                }
            }
            Some(principal) if box_type == "outbox" => {
                if principal.actor.get("outbox").and_then(|v| v.as_str()) == Some(box_uri) {
                    AuthorizationDecision::allow("outbox owner can post to it")
                } else {
                    AuthorizationDecision::deny("only outbox owner can post to it")
                }
            }
            Some(_) => AuthorizationDecision::deny("unknown box type"),
            None => AuthorizationDecision::deny_with_status(
                "authentication required",
                reqwest::StatusCode::UNAUTHORIZED,
            ),
        };
        record("post", &decision);
        Ok(decision)
    }

    async fn is_activity_authorized(
        &self,
        principal: Option<&Identity>,
        activity: &Resource,
    ) -> Result<AuthorizationDecision> {
        let decision = if is_type_any(activity, &["Add", "Remove"]) {
            if activity.get("object").is_none() {
                AuthorizationDecision::deny_with_status(
                    "Missing activity object",
                    reqwest::StatusCode::BAD_REQUEST,
                )
            } else if activity.get("target").is_none() {
                AuthorizationDecision::deny_with_status(
                    "Missing activity target",
                    reqwest::StatusCode::BAD_REQUEST,
                )
            } else {
                let target_uri = resource_id(&activity["target"]).unwrap_or_default();
                let target = self.store.get(target_uri).await?;
                match (principal, &target) {
                    (Some(principal), Some(target))
                        if is_public(target)
                            || is_attributed_user(principal, target)
                            || is_actor_collection(
                                &principal.actor,
                                resource_id(&target["id"]).unwrap_or_default(),
                            ) =>
                    {
                        AuthorizationDecision::allow("Public/owned collection changes allowed")
                    }
                    _ => AuthorizationDecision::deny("not authorized"),
                }
            }
        } else if is_type_any(
            activity,
            &["Announce", "Like", "Follow", "Accept", "Reject", "Create", "Block"],
        ) {
            AuthorizationDecision::allow("authorized")
        } else if is_type(activity, "Undo") {
            match activity.get("object") {
                None => AuthorizationDecision::allow("Missing activity"),
                Some(object) => {
                    let undone_uri = resource_id(object).unwrap_or_default();
                    let undone = self.store.get(undone_uri).await?;
                    match undone {
                        Some(undone) if is_type_any(&undone, &["Follow", "Announce", "Like"]) => {
                            match undone.get("actor") {
                                None => AuthorizationDecision::allow("Missing actor"),
                                Some(_) => {
                                    let same_origin = principal.is_some_and(|p| {
                                        get_id(undone.get("actor")).contains(p.uri())
                                    });
                                    if same_origin {
                                        AuthorizationDecision::allow("Same origin/actor")
                                    } else {
                                        AuthorizationDecision::deny("not authorized")
                                    }
                                }
                            }
                        }
                        _ => AuthorizationDecision::deny("not authorized"),
                    }
                }
            }
        } else if is_type_any(activity, &["Update", "Delete"]) {
            match activity.get("object") {
                None => AuthorizationDecision::allow("Missing activity"),
                Some(object) => {
                    let object_uri = resource_id(object).unwrap_or_default();
                    let stored = self.store.get(object_uri).await?;
                    match stored {
                        None => AuthorizationDecision::deny_with_status(
                            "Object not found",
                            reqwest::StatusCode::NOT_FOUND,
                        ),
                        Some(stored) => {
                            if principal.is_some_and(|p| is_attributed_user(p, &stored)) {
                                AuthorizationDecision::allow("Attributed delete allowed")
                            } else {
                                AuthorizationDecision::deny("not authorized")
                            }
                        }
                    }
                }
            }
        } else {
            // No extension authorizer is chained in by default: treat an
            // unrecognized activity as an implicit Create of its payload.
            let synthetic = serde_json::json!({ "type": "Create", "object": activity });
            let implied = self.is_activity_authorized(principal, &synthetic).await?;
            if implied.authorized {
                AuthorizationDecision::allow("Implicit create is allowed")
            } else {
                AuthorizationDecision::deny("not authorized")
            }
        };

        record("activity", &decision);
        Ok(decision)
    }
}

fn record(kind: &str, decision: &AuthorizationDecision) {
    let outcome = if decision.authorized { "allow" } else { "deny" };
    AUTHZ_DECISIONS_TOTAL.with_label_values(&[kind, outcome]).inc();
}
