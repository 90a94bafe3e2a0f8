//! WebFinger (RFC 7033) resource discovery, backed by the resource store.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::store::ResourceStore;

const DEFAULT_AKA_PREDICATES: &[&str] = &["alsoKnownAs"];

#[derive(Debug, Serialize)]
pub struct WebfingerResponse {
    pub subject: String,
    pub links: Vec<WebfingerLink>,
}

#[derive(Debug, Serialize)]
pub struct WebfingerLink {
    pub rel: &'static str,
    #[serde(rename = "type")]
    pub link_type: &'static str,
    pub href: String,
    pub properties: serde_json::Value,
}

/// Rejects resource parameters with no `scheme:identifier` shape, mirroring
/// the source's loose `(?:.*?):[@~]?([^@]+)@?(.*)` validation.
fn validate_resource_format(resource_uri: &str) -> Result<()> {
    let Some((_, rest)) = resource_uri.split_once(':') else {
        return Err(AppError::Validation("Invalid resource_uri format".into()));
    };
    if rest.trim_start_matches(['@', '~']).is_empty() {
        return Err(AppError::Validation("Invalid resource_uri format".into()));
    }
    Ok(())
}

pub async fn webfinger(
    store: &Arc<dyn ResourceStore>,
    prefix: &str,
    resource_uri: &str,
    aka_predicates: Option<&[&str]>,
) -> Result<WebfingerResponse> {
    validate_resource_format(resource_uri)?;

    let resource = match store.get(resource_uri).await? {
        Some(resource) => resource,
        None => {
            let predicates = aka_predicates.unwrap_or(DEFAULT_AKA_PREDICATES);
            let mut found = None;
            for predicate in predicates {
                let mut criteria = serde_json::Map::new();
                criteria.insert("@prefix".to_string(), json!(prefix));
                criteria.insert((*predicate).to_string(), json!(resource_uri));
                if let Some(resource) = store.query_one(criteria).await? {
                    found = Some(resource);
                    break;
                }
            }
            found.ok_or(AppError::NotFound)?
        }
    };

    let id = resource.get("id").and_then(|v| v.as_str()).ok_or(AppError::NotFound)?;
    let resource_type = resource.get("type").and_then(|v| v.as_str()).unwrap_or("Object");

    Ok(WebfingerResponse {
        subject: resource_uri.to_string(),
        links: vec![WebfingerLink {
            rel: "self",
            link_type: "application/activity+json",
            href: id.to_string(),
            properties: json!({
                "https://www.w3.org/ns/activitystreams#type": resource_type,
            }),
        }],
    })
}
