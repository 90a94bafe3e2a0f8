//! NodeInfo 2.0 discovery, backed by the resource store for per-tenant
//! custom metadata.

use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::resource::ns;
use crate::store::ResourceStore;

pub fn nodeinfo_index(prefix: &str) -> Value {
    json!({
        "links": [
            {
                "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
                "href": format!("{prefix}/nodeinfo/2.0"),
            }
        ]
    })
}

pub async fn nodeinfo_version(
    store: &Arc<dyn ResourceStore>,
    prefix: &str,
    version: &str,
) -> Result<Value> {
    if version != "2.0" {
        return Err(AppError::NotFound);
    }

    let custom = store
        .query_one(
            json!({
                "@prefix": "urn:",
                "type": ns::NODE_INFO,
                "attributedTo": prefix,
            })
            .as_object()
            .expect("literal object")
            .clone(),
        )
        .await?;

    let metadata = custom
        .as_ref()
        .and_then(|c| c.get("metadata"))
        .cloned()
        .unwrap_or_else(|| {
            json!({
                "nodeName": "firm",
                "nodeDescription": "An ActivityPub federation server",
            })
        });

    Ok(json!({
        "version": "2.0",
        "software": { "name": "firm", "version": env!("CARGO_PKG_VERSION") },
        "protocols": ["activitypub"],
        "services": { "outbound": [], "inbound": [] },
        "usage": { "users": {} },
        "openRegistrations": false,
        "metadata": metadata,
    }))
}
