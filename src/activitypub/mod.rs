//! The ActivityPub dispatch engine: GET/POST request handling for actor,
//! object, and box (inbox/outbox) resources.
//!
//! [`ActivityPubEngine`] is transport-agnostic — it knows nothing of axum
//! or HTTP status codes beyond what [`AppError`] already encodes. The HTTP
//! host layer (`src/http.rs`) adapts requests into calls here.

mod handlers;

use std::sync::Arc;

use crate::auth::Identity;
use crate::authz::Authorizer;
use crate::delivery::DeliveryService;
use crate::error::{AppError, Result};
use crate::resource::{Resource, has_value};
use crate::store::ResourceStore;

pub struct ActivityPubEngine {
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) delivery: Arc<dyn DeliveryService>,
}

/// The outcome of a successful POST, carrying the activity's own URI so
/// the HTTP layer can set a `Location` header.
pub struct PostOutcome {
    pub activity_id: String,
}

impl ActivityPubEngine {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        authorizer: Arc<dyn Authorizer>,
        delivery: Arc<dyn DeliveryService>,
    ) -> Self {
        Self {
            store,
            authorizer,
            delivery,
        }
    }

    pub async fn process_get(&self, principal: Option<&Identity>, uri: &str) -> Result<Resource> {
        let resource = self.store.get(uri).await?.ok_or(AppError::NotFound)?;

        let decision = self.authorizer.is_get_authorized(principal, &resource).await?;
        if !decision.authorized {
            return Err(decision_error(&decision));
        }

        Ok(resource)
    }

    pub async fn process_post(
        &self,
        principal: Option<&Identity>,
        uri: &str,
        body: &[u8],
    ) -> Result<PostOutcome> {
        let principal = principal.ok_or_else(|| AppError::Forbidden("authentication required".into()))?;

        let target = self
            .store
            .get(uri)
            .await?
            .ok_or_else(|| AppError::Validation("Unknown target resource".into()))?;

        if !has_value(&target, "type", "OrderedCollection") {
            return Err(AppError::Validation("Invalid target resource type".into()));
        }

        let box_owner_uri = target
            .get("attributedTo")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Validation("No owner for box".into()))?;
        let box_owner = self
            .store
            .get(box_owner_uri)
            .await?
            .ok_or_else(|| AppError::Validation("Unknown box owner".into()))?;

        let box_type = if box_owner.get("inbox").and_then(|v| v.as_str()) == Some(uri) {
            "inbox"
        } else if box_owner.get("outbox").and_then(|v| v.as_str()) == Some(uri) {
            "outbox"
        } else {
            return Err(AppError::Validation("Unsupported box type".into()));
        };

        let decision = self
            .authorizer
            .is_post_authorized(Some(principal), box_type, uri)
            .await?;
        if !decision.authorized {
            return Err(decision_error(&decision));
        }

        let activity: Resource = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("invalid activity JSON: {e}")))?;

        let decision = self.authorizer.is_activity_authorized(Some(principal), &activity).await?;
        if !decision.authorized {
            return Err(decision_error(&decision));
        }

        if box_type == "inbox" {
            self.handle_inbox(principal, &box_owner, activity).await
        } else {
            self.handle_outbox(&box_owner, activity).await
        }
    }
}

fn decision_error(decision: &crate::authz::AuthorizationDecision) -> AppError {
    if decision.status_code == reqwest::StatusCode::UNAUTHORIZED {
        AppError::Unauthorized
    } else {
        AppError::Forbidden(decision.reason.clone())
    }
}
