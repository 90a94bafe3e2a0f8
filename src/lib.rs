//! firm - an ActivityPub federation server core
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HTTP host layer (axum)                    │
//! │  - GET/POST dispatch, WebFinger, NodeInfo, health, metrics   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │            auth (who)  →  authz (may they)  →  activitypub   │
//! │  HTTP Signature / Basic / Bearer   rule-based decisions       dispatch
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │               prefix-routed resource store                   │
//! │  tenant partitions · remote partition · private partition     │
//! │  memory / file / sql, with HTTP fetch-fallback                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `activitypub`: the GET/POST dispatch engine and per-activity-type handlers
//! - `auth`: authentication (HTTP Signature, Basic, Bearer)
//! - `authz`: authorization decisions
//! - `store`: the resource store contract and its partitions
//! - `delivery`: outbound activity delivery
//! - `discovery`: WebFinger and NodeInfo
//! - `context`: shared application state
//! - `http`: the axum adapter layer
//! - `config`: configuration management
//! - `error`: error types
//! - `resource`: ActivityPub resource predicates and accessors

pub mod activitypub;
pub mod auth;
pub mod authz;
pub mod config;
pub mod context;
pub mod delivery;
pub mod discovery;
pub mod error;
pub mod http;
pub mod metrics;
pub mod resource;
pub mod store;
