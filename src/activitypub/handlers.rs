//! Per-activity-type inbox/outbox handling.

use serde_json::{Map, Value, json};

use super::{ActivityPubEngine, PostOutcome};
use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::metrics::ACTIVITIES_RECEIVED_TOTAL;
use crate::resource::{Resource, has_value, resource_id};

impl ActivityPubEngine {
    fn assert_authorized_actor(&self, principal: &Identity, actor_uri: Option<&str>) -> Result<()> {
        if actor_uri != Some(principal.uri()) {
            return Err(AppError::Forbidden("Not authorized".into()));
        }
        Ok(())
    }

    fn generate_id(&self, subpath: &str, actor: &Resource) -> String {
        let actor_uri = actor.get("id").and_then(|v| v.as_str()).unwrap_or("");
        format!("{actor_uri}/{subpath}/{}", ulid::Ulid::new())
    }

    async fn dereference(&self, uri: &str) -> Result<Option<Resource>> {
        self.store.get(uri).await
    }

    async fn put_collection_item(&self, collection_uri: &str, item_uri: &str) -> Result<()> {
        self.put_collection_item_with(collection_uri, item_uri, true, false).await
    }

    async fn put_collection_item_with(
        &self,
        collection_uri: &str,
        item_uri: &str,
        prepend: bool,
        allow_dups: bool,
    ) -> Result<()> {
        let mut collection = self
            .dereference(collection_uri)
            .await?
            .ok_or_else(|| AppError::Store(format!("unknown collection: {collection_uri}")))?;

        let items_key = if has_value(&collection, "type", "OrderedCollection") {
            "orderedItems"
        } else {
            "items"
        };

        let map = collection
            .as_object_mut()
            .ok_or_else(|| AppError::Store("collection is not an object".into()))?;

        match map.get_mut(items_key) {
            Some(Value::Array(items)) => {
                let already_present = items.iter().any(|v| v.as_str() == Some(item_uri));
                if !allow_dups && already_present {
                    return Ok(());
                }
                if prepend {
                    items.insert(0, json!(item_uri));
                } else {
                    items.push(json!(item_uri));
                }
            }
            _ => {
                map.insert(items_key.to_string(), json!([item_uri]));
            }
        }

        self.store.put(collection).await
    }

    async fn remove_collection_item(&self, collection_uri: &str, item_uri: &str) -> Result<()> {
        let mut collection = self
            .dereference(collection_uri)
            .await?
            .ok_or_else(|| AppError::Store(format!("unknown collection: {collection_uri}")))?;

        let items_key = if has_value(&collection, "type", "OrderedCollection") {
            "orderedItems"
        } else {
            "items"
        };

        if let Some(Value::Array(items)) = collection.get_mut(items_key) {
            items.retain(|v| v.as_str() != Some(item_uri));
        }

        self.store.put(collection).await
    }

    pub(super) async fn handle_inbox(
        &self,
        principal: &Identity,
        box_owner: &Resource,
        activity: Resource,
    ) -> Result<PostOutcome> {
        let activity_type = activity.get("type").and_then(|v| v.as_str()).unwrap_or("?").to_string();
        tracing::info!(box = box_owner.get("id").and_then(|v| v.as_str()), activity_type = %activity_type, "inbox post");
        ACTIVITIES_RECEIVED_TOTAL.with_label_values(&[&activity_type]).inc();

        self.store.put(activity.clone()).await?;
        let activity_id = resource_id(&activity)
            .ok_or_else(|| AppError::Validation("activity has no id".into()))?
            .to_string();
        let inbox_uri = box_owner
            .get("inbox")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("box owner has no inbox".into()))?
            .to_string();
        self.put_collection_item(&inbox_uri, &activity_id).await?;

        if has_value(&activity, "type", "Follow") {
            self.process_inbox_follow(principal, box_owner, activity).await
        } else if has_value(&activity, "type", "Like") {
            self.process_inbox_like(principal, activity).await
        } else if has_value(&activity, "type", "Create") {
            self.process_inbox_create(activity).await
        } else if has_value(&activity, "type", "Undo") {
            self.process_inbox_undo(activity).await
        } else {
            Err(AppError::NotImplemented(format!("unsupported inbox activity type: {activity_type}")))
        }
    }

    async fn process_inbox_follow(
        &self,
        principal: &Identity,
        box_owner: &Resource,
        activity: Resource,
    ) -> Result<PostOutcome> {
        let actor_uri = resource_id(activity.get("actor").ok_or_else(|| {
            AppError::Validation("Follow activity has no actor".into())
        })?)
        .ok_or_else(|| AppError::Validation("Follow activity actor has no id".into()))?
        .to_string();
        self.assert_authorized_actor(principal, Some(&actor_uri))?;

        let object_uri = activity.get("object").and_then(resource_id);
        if object_uri != box_owner.get("id").and_then(|v| v.as_str()) {
            return Err(AppError::Validation("Mismatch between object and box owner".into()));
        }
        if Some(actor_uri.as_str()) == box_owner.get("id").and_then(|v| v.as_str()) {
            return Err(AppError::Validation("Cannot follow self".into()));
        }

        let followers_uri = box_owner
            .get("followers")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::NotImplemented("Following not supported".into()))?
            .to_string();
        self.put_collection_item(&followers_uri, &actor_uri).await?;

        tracing::info!(actor_uri, "sending Accept");
        let accept = json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": self.generate_id("accept", box_owner),
            "type": "Accept",
            "to": actor_uri,
            "actor": box_owner.get("id"),
            "object": activity,
        });
        let outbox_uri = box_owner
            .get("outbox")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("box owner has no outbox".into()))?
            .to_string();
        self.process_outbox_internal(&outbox_uri, box_owner, accept).await?;

        Ok(PostOutcome { activity_id: String::new() })
    }

    async fn process_inbox_like(&self, principal: &Identity, activity: Resource) -> Result<PostOutcome> {
        let actor_uri = activity.get("actor").and_then(resource_id).map(str::to_string);
        self.assert_authorized_actor(principal, actor_uri.as_deref())?;

        let liked_object_uri = activity
            .get("object")
            .and_then(resource_id)
            .ok_or_else(|| AppError::Validation("Like activity has no object".into()))?
            .to_string();

        let Some(liked_object) = self.dereference(&liked_object_uri).await? else {
            return Err(AppError::Validation("Unknown liked object".into()));
        };
        let likes_uri = liked_object
            .get("likes")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("liked object has no likes collection".into()))?
            .to_string();
        self.put_collection_item(&likes_uri, actor_uri.as_deref().unwrap_or_default()).await?;

        Ok(PostOutcome { activity_id: String::new() })
    }

    async fn process_inbox_create(&self, mut activity: Resource) -> Result<PostOutcome> {
        if let Some(object) = activity.get("object").filter(|v| v.is_object()).cloned() {
            let object_id = resource_id(&object).map(str::to_string);
            self.store.put(object).await?;
            if let Some(id) = object_id {
                activity["object"] = json!(id);
            }
            self.store.put(activity).await?;
        }
        Ok(PostOutcome { activity_id: String::new() })
    }

    async fn process_inbox_undo(&self, activity: Resource) -> Result<PostOutcome> {
        let object = activity.get("object");
        let object_type = object.and_then(|o| o.get("type")).and_then(|v| v.as_str());
        match object_type {
            Some("Follow") => self.process_inbox_undo_follow(activity).await,
            Some("Like") => self.process_inbox_undo_like(activity).await,
            _ => Err(AppError::NotImplemented("unsupported Undo object type".into())),
        }
    }

    async fn process_inbox_undo_follow(&self, activity: Resource) -> Result<PostOutcome> {
        let undone_object_uri = activity
            .get("object")
            .and_then(|o| o.get("object"))
            .and_then(resource_id)
            .ok_or_else(|| AppError::Validation("Request has no activity to undo".into()))?
            .to_string();

        let box_owner = self
            .dereference(&undone_object_uri)
            .await?
            .ok_or_else(|| AppError::Validation("Unknown box owner".into()))?;
        let followers_uri = box_owner
            .get("followers")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Validation("No followers collection".into()))?
            .to_string();

        let actor_uri = activity.get("actor").and_then(resource_id).unwrap_or_default();
        self.remove_collection_item(&followers_uri, actor_uri).await?;

        Ok(PostOutcome { activity_id: String::new() })
    }

    async fn process_inbox_undo_like(&self, activity: Resource) -> Result<PostOutcome> {
        let liked_object_uri = activity
            .get("object")
            .and_then(|o| o.get("object"))
            .and_then(resource_id)
            .ok_or_else(|| AppError::Validation("Unable to undo like".into()))?
            .to_string();

        let Some(liked_object) = self.dereference(&liked_object_uri).await? else {
            return Err(AppError::Validation("Unable to undo like".into()));
        };
        let Some(likes_uri) = liked_object.get("likes").and_then(|v| v.as_str()) else {
            return Err(AppError::Validation("Unable to undo like".into()));
        };

        let actor_uri = activity.get("actor").and_then(resource_id).unwrap_or_default();
        self.remove_collection_item(likes_uri, actor_uri).await?;

        Ok(PostOutcome { activity_id: String::new() })
    }

    async fn process_outbox_internal(
        &self,
        outbox_uri: &str,
        actor: &Resource,
        mut activity: Resource,
    ) -> Result<()> {
        if has_value(&activity, "type", "Create") {
            if let Some(object) = activity.get("object").filter(|v| v.is_object()).cloned() {
                let actor_uri = activity.get("actor").and_then(|v| v.as_str()).unwrap_or_default();
                let object_type = object
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("object")
                    .to_lowercase();
                let object_uri = format!("{actor_uri}/{object_type}/{}", ulid::Ulid::new());

                let mut object_map: Map<String, Value> =
                    object.as_object().cloned().unwrap_or_default();
                object_map.insert("id".to_string(), json!(object_uri));
                object_map.insert("attributedTo".to_string(), json!(actor_uri));
                let object = Value::Object(object_map);

                activity["object"] = json!(object_uri);
                self.store.put(object).await?;
            }
        }
        self.store.put(activity.clone()).await?;

        let activity_id = resource_id(&activity)
            .ok_or_else(|| AppError::Validation("activity has no id".into()))?
            .to_string();
        self.put_collection_item(outbox_uri, &activity_id).await?;
        self.delivery.deliver(actor, &activity).await?;
        Ok(())
    }

    pub(super) async fn handle_outbox(&self, box_owner: &Resource, mut activity: Resource) -> Result<PostOutcome> {
        let actor_uri = box_owner
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("box owner has no id".into()))?
            .to_string();

        let activity_type = activity
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Validation("activity has no type".into()))?
            .to_lowercase();
        let activity_id = format!("{actor_uri}/{activity_type}-{}", ulid::Ulid::new());

        let map = activity.as_object_mut().ok_or_else(|| AppError::Validation("activity is not an object".into()))?;
        map.insert("id".to_string(), json!(activity_id));
        map.entry("actor").or_insert_with(|| json!(actor_uri));
        map.entry("@context")
            .or_insert_with(|| json!("https://www.w3.org/ns/activitystreams"));

        tracing::info!(activity_type, "outbox post");

        let outbox_uri = box_owner
            .get("outbox")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("box owner has no outbox".into()))?
            .to_string();
        self.process_outbox_internal(&outbox_uri, box_owner, activity).await?;

        Ok(PostOutcome { activity_id })
    }
}
