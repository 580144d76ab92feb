//! HTTP handlers for the gateway API

use super::extract::{is_valid_segment, unrecognized};
use super::state::AppState;
use crate::cache::{cache_key, CacheEntry};
use crate::envelope::{
    build_schema_url, build_schema_url_for_instance, class_schema_links, collection_schema,
    content_type_profile, context_schema, empty_collection, root_schema, suggest_schema,
    RequestUrl,
};
use crate::error::{GatewayError, GatewayResult};
use crate::events::{clean_up_reserved_attributes, Action, Notification};
use crate::params::{EndpointKind, ParamDict, PathParams};
use crate::resources::{collection, context, instance, root, search, suggest};
use crate::schema::{get_schema, ClassSchema, JSON_SCHEMA_DRAFT};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::debug;
use validator::Validate;

const X_CACHE: &str = "x-cache";

fn check_segments(url: &RequestUrl, segments: &[&str]) -> GatewayResult<()> {
    if segments.iter().all(|s| is_valid_segment(s)) {
        Ok(())
    } else {
        Err(unrecognized(url))
    }
}

fn set_header(response: &mut Response, name: header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}

/// JSON body whose `Content-Type` profile points at `schema_url`
fn json_response(status: StatusCode, body: Value, schema_url: &str) -> Response {
    let mut response = (status, Json(body)).into_response();
    set_header(&mut response, header::CONTENT_TYPE, &content_type_profile(schema_url));
    response
}

/// Memoized body with its `X-Cache` and `Last-Modified` headers
fn cached_response(url: &RequestUrl, entry: CacheEntry, schema_url: &str) -> Response {
    let mut response = json_response(StatusCode::OK, entry.body, schema_url);
    let hit = format!("{} from {}", entry.meta.cache.as_str(), url.host);
    set_header(&mut response, header::HeaderName::from_static(X_CACHE), &hit);
    set_header(&mut response, header::LAST_MODIFIED, &entry.meta.last_modified);
    response
}

fn text(body: impl Into<String>) -> Response {
    (
        [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())],
        body.into(),
    )
        .into_response()
}

fn parse_body(body: &Bytes) -> GatewayResult<Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        _ => Err(GatewayError::BadRequest(
            "No JSON object could be decoded".to_string(),
        )),
    }
}

fn class_missing(ctx: &str, class: &str) -> GatewayError {
    GatewayError::NotFound(format!("Class {} doesn't exist in context {}.", class, ctx))
}

fn schema_missing(ctx: &str, class: &str) -> GatewayError {
    GatewayError::NotFound(format!(
        "Schema for class {} in context {} was not found.",
        class, ctx
    ))
}

fn instance_missing(ctx: &str, class: &str, id: &str) -> GatewayError {
    GatewayError::NotFound(format!(
        "Instance ({}) of class ({}) in graph ({}) was not found.",
        id, class, ctx
    ))
}

async fn class_schema(state: &AppState, params: &ParamDict) -> GatewayResult<Option<ClassSchema>> {
    Ok(get_schema(state.store.as_ref(), params, &state.registry).await?)
}

/// Announce a mutation; `instance_data` is sent with every URI expanded
async fn notify(
    state: &AppState,
    params: &ParamDict,
    instance_uri: &str,
    action: Action,
    instance_data: Option<Value>,
) -> GatewayResult<()> {
    let notification = Notification {
        instance: instance_uri.to_string(),
        klass: params.class_uri.clone().unwrap_or_default(),
        graph: params.graph_uri.clone().unwrap_or_default(),
        action,
        instance_data: instance_data
            .map(|data| clean_up_reserved_attributes(state.registry.expand_all_uris_recursively(&data))),
    };
    state.events.notify(&notification).await?;
    Ok(())
}

pub async fn healthcheck() -> Response {
    text("WORKING")
}

pub async fn version() -> Response {
    text(crate::VERSION)
}

/// `WORKING` unless a backend reports trouble, in which case its lines are returned
pub fn overall_status(triplestore: &str, event_bus: &str) -> String {
    let mut problems = Vec::new();
    if !triplestore.contains("SUCCEED") {
        problems.push(triplestore);
    }
    if event_bus.contains("FAILED") {
        problems.push(event_bus);
    }
    if problems.is_empty() {
        "WORKING".to_string()
    } else {
        problems.join("\n")
    }
}

pub async fn status(State(state): State<AppState>) -> Response {
    let (triplestore, event_bus) =
        futures::future::join(state.store.status(), state.events.status()).await;
    text(overall_status(&triplestore, &event_bus))
}

pub async fn cache_status(State(state): State<AppState>) -> Response {
    text(state.cache.status().await)
}

pub async fn triplestore_status(State(state): State<AppState>) -> Response {
    text(state.store.status().await)
}

pub async fn event_bus_status(State(state): State<AppState>) -> Response {
    text(state.events.status().await)
}

pub async fn list_prefixes(State(state): State<AppState>, url: RequestUrl) -> GatewayResult<Response> {
    state.params(&url, EndpointKind::Prefixes, PathParams::root())?;
    let context: Map<String, Value> = state
        .registry
        .prefixes()
        .into_iter()
        .map(|ns| (ns.prefix, Value::String(ns.iri)))
        .collect();
    Ok(Json(json!({
        "@context": context,
        "root_context": state.registry.expand("base"),
    }))
    .into_response())
}

pub async fn get_root(State(state): State<AppState>, url: RequestUrl) -> GatewayResult<Response> {
    let params = state.params(&url, EndpointKind::Root, PathParams::root())?;
    let key = cache_key(&url.path, url.query.as_deref());
    let entry = state
        .cache
        .memoize(&key, params.flag("purge"), || {
            root::list_all_contexts(state.store.as_ref(), &state.registry, &params, &url)
        })
        .await?;
    Ok(cached_response(&url, entry, &build_schema_url(&url, &params)))
}

pub async fn get_root_schema(State(state): State<AppState>, url: RequestUrl) -> GatewayResult<Response> {
    let params = state.params(&url, EndpointKind::SchemaList, PathParams::root())?;
    let key = cache_key(&url.path, url.query.as_deref());
    let entry = state
        .cache
        .memoize(&key, params.flag("purge"), || async {
            Ok::<_, GatewayError>(root_schema())
        })
        .await?;
    Ok(cached_response(&url, entry, JSON_SCHEMA_DRAFT))
}

pub async fn get_context(
    State(state): State<AppState>,
    Path(ctx): Path<String>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx])?;
    let params = state.params(&url, EndpointKind::Context, PathParams::context(&ctx))?;
    match context::list_classes(state.store.as_ref(), &params, &url).await? {
        Some(body) => Ok(json_response(StatusCode::OK, body, &build_schema_url(&url, &params))),
        None => Err(GatewayError::NotFound(format!("Context {} not found", ctx))),
    }
}

pub async fn get_context_schema(
    State(state): State<AppState>,
    Path(ctx): Path<String>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx])?;
    state.params(&url, EndpointKind::SchemaList, PathParams::context(&ctx))?;
    Ok(json_response(StatusCode::OK, context_schema(&ctx), JSON_SCHEMA_DRAFT))
}

async fn class_schema_document(state: &AppState, params: &ParamDict, ctx: &str, class: &str) -> GatewayResult<Value> {
    match class_schema(state, params).await? {
        Some(schema) => Ok(schema.to_document(class_schema_links(params))),
        None => Err(schema_missing(ctx, class)),
    }
}

pub async fn get_class_schema(
    State(state): State<AppState>,
    Path((ctx, class)): Path<(String, String)>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class])?;
    let params = state.params(&url, EndpointKind::ClassSchema, PathParams::class(&ctx, &class))?;
    let key = cache_key(&url.path, url.query.as_deref());
    let entry = state
        .cache
        .memoize(&key, params.flag("purge"), || {
            class_schema_document(&state, &params, &ctx, &class)
        })
        .await?;
    Ok(cached_response(&url, entry, JSON_SCHEMA_DRAFT))
}

pub async fn get_collection_schema(
    State(state): State<AppState>,
    Path((ctx, class)): Path<(String, String)>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class])?;
    let params = state.params(&url, EndpointKind::SchemaList, PathParams::class(&ctx, &class))?;
    let schema = class_schema(&state, &params)
        .await?
        .ok_or_else(|| schema_missing(&ctx, &class))?;
    Ok(json_response(
        StatusCode::OK,
        collection_schema(&params, &schema.title),
        JSON_SCHEMA_DRAFT,
    ))
}

pub async fn search_collection(
    State(state): State<AppState>,
    Path((ctx, class)): Path<(String, String)>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class])?;
    let params = state.params(&url, EndpointKind::Search, PathParams::class(&ctx, &class))?;
    let body = search::do_search(
        state.store.as_ref(),
        state.search.as_ref(),
        &state.registry,
        &state.search_config,
        &params,
        &url,
    )
    .await?;
    Ok(json_response(StatusCode::OK, body, &build_schema_url(&url, &params)))
}

pub async fn get_collection(
    State(state): State<AppState>,
    Path((ctx, class)): Path<(String, String)>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class])?;
    let params = state.params(&url, EndpointKind::Collection, PathParams::class(&ctx, &class))?;
    let body = collection::filter_instances(state.store.as_ref(), &state.registry, &params, &url)
        .await?
        .unwrap_or_else(|| empty_collection(&params));
    Ok(json_response(StatusCode::OK, body, &build_schema_url(&url, &params)))
}

pub async fn create_in_collection(
    State(state): State<AppState>,
    Path((ctx, class)): Path<(String, String)>,
    url: RequestUrl,
    body: Bytes,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class])?;
    let params = state.params(&url, EndpointKind::CollectionCreate, PathParams::class(&ctx, &class))?;
    let schema = class_schema(&state, &params)
        .await?
        .ok_or_else(|| class_missing(&ctx, &class))?;
    let data = parse_body(&body)?;

    let (instance_uri, instance_id) = collection::create_instance(
        state.store.as_ref(),
        &state.registry,
        &params,
        &schema,
        &data,
        None,
    )
    .await?;

    let mut params = params.with_instance(&instance_uri, &instance_id);
    params.set_flag("expand_object_properties", true);
    let stored = instance::get_instance(state.store.as_ref(), &state.registry, &params, &url).await?;
    notify(&state, &params, &instance_uri, Action::Post, stored).await?;

    let mut response = StatusCode::CREATED.into_response();
    set_header(&mut response, header::LOCATION, &url.resource_url(&instance_id));
    Ok(response)
}

pub async fn get_instance(
    State(state): State<AppState>,
    Path((ctx, class, id)): Path<(String, String, String)>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class, &id])?;
    let params = state.params(&url, EndpointKind::Instance, PathParams::instance(&ctx, &class, &id))?;
    match instance::get_instance(state.store.as_ref(), &state.registry, &params, &url).await? {
        Some(body) => Ok(json_response(
            StatusCode::OK,
            body,
            &build_schema_url_for_instance(&url, &params),
        )),
        None => Err(instance_missing(&ctx, &class, &id)),
    }
}

pub async fn put_instance(
    State(state): State<AppState>,
    Path((ctx, class, id)): Path<(String, String, String)>,
    url: RequestUrl,
    body: Bytes,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class, &id])?;
    let mut params = state.params(&url, EndpointKind::Instance, PathParams::instance(&ctx, &class, &id))?;
    let data = parse_body(&body)?;
    let instance_uri = params.instance_uri.clone().unwrap_or_default();
    let schema = class_schema(&state, &params)
        .await?
        .ok_or_else(|| class_missing(&ctx, &class))?;

    let created = !instance::instance_exists(state.store.as_ref(), &params).await?;
    if created {
        collection::create_instance(
            state.store.as_ref(),
            &state.registry,
            &params,
            &schema,
            &data,
            Some(instance_uri.clone()),
        )
        .await?;
    } else {
        let data = instance::expand_instance_data(&state.registry, &data)?;
        instance::edit_instance(state.store.as_ref(), &params, &schema, &data).await?;
    }
    debug!("PUT {} created={}", instance_uri, created);

    params.set_flag("expand_object_properties", true);
    let stored = instance::get_instance(state.store.as_ref(), &state.registry, &params, &url).await?;
    if stored.is_some() {
        notify(&state, &params, &instance_uri, Action::Put, stored).await?;
    }

    if created {
        let mut response = StatusCode::CREATED.into_response();
        set_header(&mut response, header::LOCATION, &url.full_url());
        Ok(response)
    } else {
        Ok(StatusCode::OK.into_response())
    }
}

pub async fn delete_instance(
    State(state): State<AppState>,
    Path((ctx, class, id)): Path<(String, String, String)>,
    url: RequestUrl,
) -> GatewayResult<Response> {
    check_segments(&url, &[&ctx, &class, &id])?;
    let params = state.params(&url, EndpointKind::Instance, PathParams::instance(&ctx, &class, &id))?;
    if !instance::delete_instance(state.store.as_ref(), &params).await? {
        return Err(instance_missing(&ctx, &class, &id));
    }
    let instance_uri = params.instance_uri.clone().unwrap_or_default();
    notify(&state, &params, &instance_uri, Action::Delete, None).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn invalid_suggest(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::BadRequest(format!("Invalid json parameter passed to suggest.\n {}", err))
}

pub async fn suggest(State(state): State<AppState>, url: RequestUrl, body: Bytes) -> GatewayResult<Response> {
    let params = state.params(&url, EndpointKind::Suggest, PathParams::root())?;

    let raw: Value = serde_json::from_slice(&body).map_err(invalid_suggest)?;
    let mut expanded = state.registry.expand_all_uris_recursively(&raw);
    if let Value::Object(map) = &mut expanded {
        map.remove("@context");
    }
    let request: suggest::SuggestBody = serde_json::from_value(expanded).map_err(invalid_suggest)?;
    request.validate().map_err(invalid_suggest)?;

    let response = suggest::do_suggest(
        state.store.as_ref(),
        state.search.as_ref(),
        &state.registry,
        &state.search_config,
        &params,
        &url,
        &request,
    )
    .await?
    .ok_or_else(|| GatewayError::NotFound("There were no search results.".to_string()))?;
    Ok(json_response(StatusCode::OK, response, &build_schema_url(&url, &params)))
}

pub async fn get_suggest_schema() -> Response {
    json_response(StatusCode::OK, suggest_schema(), JSON_SCHEMA_DRAFT)
}

/// Fallback for paths no route serves
pub async fn not_recognized(url: RequestUrl) -> GatewayError {
    unrecognized(&url)
}

/// Fallback for methods a route does not serve
pub async fn method_not_allowed(url: RequestUrl) -> GatewayError {
    GatewayError::MethodNotAllowed(format!("Method not allowed at {}", url.path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status_working() {
        assert_eq!(
            overall_status("Virtuoso connection authenticated | SUCCEED", "ActiveMQ | SUCCEED"),
            "WORKING"
        );
    }

    #[test]
    fn test_overall_status_reports_failures() {
        let status = overall_status("Virtuoso | FAILED", "ActiveMQ | FAILED");
        assert_eq!(status, "Virtuoso | FAILED\nActiveMQ | FAILED");
    }

    #[test]
    fn test_parse_body_rejects_non_objects() {
        assert!(parse_body(&Bytes::from_static(b"{\"a\": 1}")).is_ok());
        let err = parse_body(&Bytes::from_static(b"[1, 2]")).unwrap_err();
        assert_eq!(err.to_string(), "No JSON object could be decoded");
        assert!(parse_body(&Bytes::from_static(b"not json")).is_err());
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(
            instance_missing("place", "City", "rio").to_string(),
            "Instance (rio) of class (City) in graph (place) was not found."
        );
        assert_eq!(
            class_missing("place", "City").to_string(),
            "Class City doesn't exist in context place."
        );
    }
}
