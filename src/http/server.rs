//! HTTP server for the gateway API

use super::handler::{
    cache_status, create_in_collection, delete_instance, event_bus_status, get_class_schema,
    get_collection, get_collection_schema, get_context, get_context_schema, get_instance,
    get_root, get_root_schema, get_suggest_schema, healthcheck, list_prefixes,
    method_not_allowed, not_recognized, put_instance, search_collection, status, suggest,
    triplestore_status, version,
};
use super::purge::purge_cache;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    extract::Request,
    middleware,
    routing::{get, post, MethodRouter},
    Router, ServiceExt,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;
use tracing::info;

fn only(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(method_not_allowed)
}

/// The routed API behind trailing-slash normalization
pub type GatewayApp = NormalizePath<Router>;

/// Every route of the API, with the `PURGE` middleware applied.
///
/// `/place/City/` and `/place/City` reach the same handler and share a cache key.
pub fn build_router(state: AppState, cors_enabled: bool) -> GatewayApp {
    let app = Router::new()
        .route("/healthcheck", only(get(healthcheck)))
        .route("/_version", only(get(version)))
        .route("/_prefixes", only(get(list_prefixes)))
        .route("/_status", only(get(status)))
        .route("/_status/cache", only(get(cache_status)))
        .route("/_status/virtuoso", only(get(triplestore_status)))
        .route("/_status/activemq", only(get(event_bus_status)))
        .route("/_schema_list", only(get(get_root_schema)))
        .route("/_suggest", only(post(suggest)))
        .route("/_suggest/_schema_list", only(get(get_suggest_schema)))
        .route("/", only(get(get_root)))
        .route("/:ctx", only(get(get_context)))
        .route("/:ctx/_schema_list", only(get(get_context_schema)))
        .route("/:ctx/:class/_schema", only(get(get_class_schema)))
        .route("/:ctx/:class/_schema_list", only(get(get_collection_schema)))
        .route("/:ctx/:class/_search", only(get(search_collection)))
        .route(
            "/:ctx/:class",
            only(get(get_collection).post(create_in_collection)),
        )
        .route(
            "/:ctx/:class/:id",
            only(get(get_instance).put(put_instance).delete(delete_instance)),
        )
        .fallback(not_recognized)
        .layer(middleware::from_fn_with_state(state.clone(), purge_cache))
        .with_state(state);

    let app = if cors_enabled {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    // Path rewriting has to happen before routing, so it wraps the Router.
    NormalizePath::trim_trailing_slash(app.layer(TraceLayer::new_for_http()))
}

/// HTTP server bound to the configured address
pub struct GatewayServer {
    state: AppState,
    config: ServerConfig,
}

impl GatewayServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Serve until `shutdown_signal` completes
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.address, self.config.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let router = build_router(self.state, self.config.cors_enabled);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Gateway listening on http://{}", addr);

        axum::serve(listener, ServiceExt::<Request>::into_make_service(router))
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}
