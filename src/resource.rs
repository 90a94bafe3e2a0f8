//! ActivityPub resource predicates and accessors.
//!
//! Resources travel through the system as untyped `serde_json::Value`
//! documents rather than a closed set of Rust structs: the wire format is
//! JSON-LD and unknown fields must round-trip unchanged. This module is the
//! seam between that untyped world and typed call sites — every predicate
//! the dispatch/authorization engines need is implemented once here.

use serde_json::Value;

/// A stored or wire-format ActivityPub document.
pub type Resource = Value;

pub const ACTOR_TYPES: &[&str] = &["Person", "Service", "Group", "Application", "Organization"];

pub const AP_PUBLIC_URIS: &[&str] = &[
    "https://www.w3.org/ns/activitystreams#Public",
    "as:Public",
    "Public",
];

const ADDRESSING_FIELDS: &[&str] = &["to", "cc", "bto", "bcc", "audience"];

/// `resource["id"]`, or the string itself if `resource` already is one.
///
/// Mirrors `resource_id()` in the source: activities frequently embed
/// either a bare URI or a full object where a reference is expected.
pub fn resource_id(resource: &Value) -> Option<&str> {
    match resource {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        _ => None,
    }
}

/// `get_id`, generalized over string / object / list shapes.
///
/// - `None` / anything else unsupported -> `None`
/// - a string -> itself
/// - an object -> its `id` field
/// - a list -> the `id` (or bare string) of each element
pub enum Ids<'a> {
    None,
    One(&'a str),
    Many(Vec<&'a str>),
}

impl<'a> Ids<'a> {
    pub fn contains(&self, uri: &str) -> bool {
        match self {
            Ids::None => false,
            Ids::One(s) => *s == uri,
            Ids::Many(v) => v.iter().any(|s| *s == uri),
        }
    }
}

pub fn get_id(value: Option<&Value>) -> Ids<'_> {
    match value {
        None | Some(Value::Null) => Ids::None,
        Some(Value::String(s)) => Ids::One(s.as_str()),
        Some(Value::Object(map)) => match map.get("id").and_then(Value::as_str) {
            Some(id) => Ids::One(id),
            None => Ids::None,
        },
        Some(Value::Array(items)) => {
            let ids = items.iter().filter_map(resource_id).collect();
            Ids::Many(ids)
        }
        _ => Ids::None,
    }
}

/// True if `resource[key]` equals `value`, either directly or as a member
/// of a list value.
pub fn has_value(resource: &Value, key: &str, value: &str) -> bool {
    match resource.get(key) {
        Some(Value::String(s)) => s == value,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(value)),
        _ => false,
    }
}

/// The ActivityStreams `type` field as a list of type names, whether the
/// document declared a single string or an array of strings.
pub fn types_of(resource: &Value) -> Vec<&str> {
    match resource.get("type") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

pub fn is_type(resource: &Value, t: &str) -> bool {
    types_of(resource).contains(&t)
}

pub fn is_type_any(resource: &Value, types: &[&str]) -> bool {
    let declared = types_of(resource);
    types.iter().any(|t| declared.contains(t))
}

pub fn is_actor_object(resource: &Value) -> bool {
    is_type_any(resource, ACTOR_TYPES)
}

/// True if any addressing field (`to, cc, bto, bcc, audience`) carries one
/// of the well-known ActivityStreams public URIs.
pub fn is_public(resource: &Value) -> bool {
    ADDRESSING_FIELDS.iter().any(|field| {
        resource.get(field).is_some()
            && AP_PUBLIC_URIS.iter().any(|uri| has_value(resource, field, uri))
    })
}

/// True if `principal_uri` appears in any addressing field of `resource`.
pub fn is_recipient(resource: &Value, principal_uri: &str) -> bool {
    ADDRESSING_FIELDS
        .iter()
        .any(|field| has_value(resource, field, principal_uri))
}

/// True if `resource_uri` names one of `actor`'s own collections
/// (`inbox, outbox, followers, following, likes`).
pub fn is_actor_collection(actor: &Value, resource_uri: &str) -> bool {
    const COLLECTION_FIELDS: &[&str] = &["inbox", "outbox", "followers", "following", "likes"];
    COLLECTION_FIELDS
        .iter()
        .any(|field| actor.get(*field).and_then(Value::as_str) == Some(resource_uri))
}

/// `@prefix`-routing namespace used by the private-partition documents
/// (`firm:Credentials`, `firm:Blocks`, `firm:NodeInfo`, …). Mirrors the
/// source's `FIRM_NS` enum.
pub mod ns {
    pub const NODE_INFO: &str = "firm:NodeInfo";
    pub const CREDENTIALS: &str = "firm:Credentials";
    pub const PASSWORD: &str = "firm:password";
    pub const TOKEN: &str = "firm:token";
    pub const BLOCKS: &str = "firm:Blocks";
    pub const BLOCKED_ACTOR: &str = "firm:blockedActor";
    pub const BLOCKED_DOMAIN: &str = "firm:blockedDomain";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_id_handles_strings_and_objects() {
        let s = json!("http://x.test/a");
        assert_eq!(resource_id(&s), Some("http://x.test/a"));
        let o = json!({"id": "http://x.test/b", "type": "Note"});
        assert_eq!(resource_id(&o), Some("http://x.test/b"));
    }

    #[test]
    fn get_id_handles_list_of_actors() {
        let v = json!([{"id": "http://x.test/a"}, "http://x.test/b"]);
        let ids = get_id(Some(&v));
        assert!(ids.contains("http://x.test/a"));
        assert!(ids.contains("http://x.test/b"));
        assert!(!ids.contains("http://x.test/c"));
    }

    #[test]
    fn is_public_checks_all_addressing_fields() {
        let note = json!({"id": "x", "cc": ["https://www.w3.org/ns/activitystreams#Public"]});
        assert!(is_public(&note));
        let private = json!({"id": "x", "to": ["http://x.test/someone"]});
        assert!(!is_public(&private));
    }

    #[test]
    fn is_actor_object_checks_known_types() {
        assert!(is_actor_object(&json!({"type": "Person"})));
        assert!(!is_actor_object(&json!({"type": "Note"})));
    }

    #[test]
    fn is_actor_collection_matches_declared_boxes() {
        let actor = json!({"id": "http://x.test/u", "inbox": "http://x.test/u/inbox", "outbox": "http://x.test/u/outbox"});
        assert!(is_actor_collection(&actor, "http://x.test/u/inbox"));
        assert!(!is_actor_collection(&actor, "http://x.test/u/likes"));
    }
}
