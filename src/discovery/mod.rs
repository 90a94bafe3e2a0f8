//! Store-backed discovery endpoints that sit alongside the ActivityPub
//! dispatch engine: WebFinger resource lookup and NodeInfo metadata.

pub mod nodeinfo;
pub mod webfinger;
