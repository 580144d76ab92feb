//! `PURGE` method handling
//!
//! `PURGE <path>` drops the cached body of `<path>`. With the header
//! `X-Cache-Recursive: 1` every key starting with `<path>` is dropped.
//! Other methods pass through untouched.

use super::state::AppState;
use crate::cache::cache_key;
use crate::error::GatewayError;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::info;

pub const PURGE: &str = "PURGE";
pub const RECURSIVE_HEADER: &str = "x-cache-recursive";

fn is_recursive(req: &Request<Body>) -> bool {
    req.headers()
        .get(RECURSIVE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u8>().ok())
        .is_some_and(|v| v != 0)
}

/// Middleware answering `PURGE` requests from the cache
pub async fn purge_cache(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    if req.method().as_str() != PURGE {
        return next.run(req).await;
    }
    if !state.cache.is_enabled() {
        return GatewayError::MethodNotAllowed(
            "Cache is disabled (cache.enabled is set to false)".to_string(),
        )
        .into_response();
    }

    let path = req.uri().path();
    if is_recursive(&req) {
        state.cache.purge(path).await;
    } else {
        let deleted = state.cache.delete(&cache_key(path, None)).await;
        info!("Cache: PURGE {} removed {} key(s)", path, deleted);
    }
    StatusCode::OK.into_response()
}
