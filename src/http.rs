//! Axum adapter layer: translates HTTP requests into calls against the
//! transport-agnostic [`ActivityPubEngine`], [`webfinger`] and
//! [`nodeinfo`] functions, and back into HTTP responses.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use tower_http::trace::TraceLayer;

use crate::activitypub::ActivityPubEngine;
use crate::auth::AuthRequest;
use crate::context::Context;
use crate::discovery::{nodeinfo, webfinger};
use crate::error::{AppError, Result};

pub fn build_router(ctx: Context) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let engine = ActivityPubEngine::new(ctx.store.clone(), ctx.authorizer.clone(), ctx.delivery.clone());

    Router::new()
        .route("/health", get(health))
        .route("/.well-known/webfinger", get(webfinger_handler))
        .route("/.well-known/nodeinfo", get(nodeinfo_index_handler))
        .route("/nodeinfo/:version", get(nodeinfo_version_handler))
        .route("/*path", get(get_resource).post(post_resource))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any))
        .with_state((ctx, std::sync::Arc::new(engine)))
        .merge(metrics_router())
}

fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics))
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        crate::metrics::render(),
    )
}

/// `scheme://host` + path, the canonical resource URI for an incoming
/// request. Scheme is taken from `X-Forwarded-Proto` (set by the
/// terminating proxy) and defaults to `https`.
fn resource_uri(headers: &HeaderMap, uri: &Uri) -> Result<String> {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing Host header".into()))?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    Ok(format!("{scheme}://{host}{}", uri.path()))
}

async fn authenticate(
    ctx: &Context,
    method: &str,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Option<crate::auth::Identity>> {
    let request = AuthRequest { method, path, headers, body };
    ctx.authenticator.authenticate(&request).await
}

async fn get_resource(
    State((ctx, engine)): State<(Context, std::sync::Arc<ActivityPubEngine>)>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response> {
    let principal = authenticate(&ctx, "GET", uri.path(), &headers, &[]).await?;
    let uri = resource_uri(&headers, &uri)?;
    let resource = engine.process_get(principal.as_ref(), &uri).await?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "application/activity+json")],
        Json(resource),
    )
        .into_response())
}

async fn post_resource(
    State((ctx, engine)): State<(Context, std::sync::Arc<ActivityPubEngine>)>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Response> {
    let principal = authenticate(&ctx, "POST", uri.path(), &headers, &body).await?;
    let resource_uri = resource_uri(&headers, &uri)?;
    let outcome = engine.process_post(principal.as_ref(), &resource_uri, &body).await?;
    if outcome.activity_id.is_empty() {
        Ok((StatusCode::OK, "Processed").into_response())
    } else {
        Ok((
            StatusCode::OK,
            [("Location", outcome.activity_id.as_str())],
            "Processed",
        )
            .into_response())
    }
}

async fn webfinger_handler(
    State((ctx, _)): State<(Context, std::sync::Arc<ActivityPubEngine>)>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let resource = params
        .get("resource")
        .ok_or_else(|| AppError::Validation("Missing resource param".into()))?;
    let prefix = request_prefix(&headers)?;
    let body = webfinger::webfinger(&ctx.store, &prefix, resource, None).await?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "application/jrd+json")],
        Json(body),
    )
        .into_response())
}

async fn nodeinfo_index_handler(
    State((_, _)): State<(Context, std::sync::Arc<ActivityPubEngine>)>,
    headers: HeaderMap,
) -> Result<Response> {
    let prefix = request_prefix(&headers)?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "application/jrd+json")],
        Json(nodeinfo::nodeinfo_index(&prefix)),
    )
        .into_response())
}

async fn nodeinfo_version_handler(
    State((ctx, _)): State<(Context, std::sync::Arc<ActivityPubEngine>)>,
    headers: HeaderMap,
    Path(version): Path<String>,
) -> Result<Response> {
    let prefix = request_prefix(&headers)?;
    let body = nodeinfo::nodeinfo_version(&ctx.store, &prefix, &version).await?;
    Ok((StatusCode::OK, Json(body)).into_response())
}

fn request_prefix(headers: &HeaderMap) -> Result<String> {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing Host header".into()))?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    Ok(format!("{scheme}://{host}"))
}
