//! Gateway resources
//!
//! Each submodule turns validated [`ParamDict`]s into triplestore (and
//! search engine) requests and assembles the JSON body of one resource
//! kind. HTTP concerns (status codes, headers, caching) stay in
//! [`crate::http`].

pub mod collection;
pub mod context;
pub mod instance;
pub mod root;
pub mod search;
pub mod suggest;

use crate::envelope::{pagination_links, resource_links, RequestUrl, ResourceKind};
use crate::error::{GatewayError, GatewayResult};
use crate::params::ParamDict;
use crate::rdf::PrefixRegistry;
use crate::sparql::{GraphStore, SparqlResult};
use serde_json::{Map, Value};

pub(crate) const PREFIXES: &str = "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
";

/// Derived parameter that the endpoint guarantees; absence is a routing bug
pub(crate) fn require<'a>(value: &'a Option<String>, name: &str) -> GatewayResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| GatewayError::Internal(format!("{} was not derived for this request", name)))
}

/// Split a URI into its namespace and local name at the last `/` or `#`
pub fn split_resource_id(uri: &str) -> (&str, &str) {
    match uri.trim_end_matches('/').rfind(['/', '#']) {
        Some(pos) => (&uri[..=pos], uri[pos + 1..].trim_end_matches('/')),
        None => ("", uri),
    }
}

/// Context name for a graph: its registered slug, or its path under the
/// deployment's base namespace. `None` for foreign graphs.
pub fn context_name_for_graph(registry: &PrefixRegistry, graph_uri: &str) -> Option<String> {
    let slug = registry.prefix_to_slug(graph_uri);
    if slug != graph_uri {
        return Some(slug);
    }
    let base = registry.expand("base");
    if base == "base" {
        return None;
    }
    graph_uri
        .strip_prefix(base.as_str())
        .map(|rest| rest.trim_end_matches('/'))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .map(str::to_string)
}

/// Run a `COUNT` query binding `?total`
pub(crate) async fn count(store: &dyn GraphStore, query: &str) -> SparqlResult<u64> {
    let rows = store.select(query).await?;
    Ok(rows
        .first()
        .and_then(|row| row.value("total"))
        .and_then(|total| total.parse().ok())
        .unwrap_or(0))
}

/// Wrap listed items with `_base_url`, links and the optional count
pub(crate) fn list_envelope(
    kind: ResourceKind,
    items: Vec<Value>,
    url: &RequestUrl,
    params: &ParamDict,
    item_count: Option<u64>,
) -> Map<String, Value> {
    let mut links = resource_links(kind, url, params);
    links.extend(pagination_links(
        &url.base_url(),
        &url.pairs,
        params.page,
        params.per_page,
        item_count,
        items.len(),
    ));

    let mut body = Map::new();
    body.insert("items".to_string(), Value::Array(items));
    body.insert("_base_url".to_string(), Value::String(url.base_url()));
    body.insert("links".to_string(), Value::Array(links));
    if let Some(count) = item_count {
        body.insert("item_count".to_string(), Value::from(count));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_resource_id() {
        assert_eq!(
            split_resource_id("http://ex.org/place/City/rio"),
            ("http://ex.org/place/City/", "rio")
        );
        assert_eq!(
            split_resource_id("http://ex.org/onto#Person"),
            ("http://ex.org/onto#", "Person")
        );
        assert_eq!(split_resource_id("http://ex.org/place/"), ("http://ex.org/", "place"));
        assert_eq!(split_resource_id("rio"), ("", "rio"));
    }

    #[test]
    fn test_context_name_for_graph() {
        let mut registry = PrefixRegistry::with_base("http://semgate.example/");
        registry.add_prefix("place", "http://ex.org/place/");

        assert_eq!(
            context_name_for_graph(&registry, "http://ex.org/place/").as_deref(),
            Some("place")
        );
        assert_eq!(
            context_name_for_graph(&registry, "http://semgate.example/sports/").as_deref(),
            Some("sports")
        );
        assert_eq!(context_name_for_graph(&registry, "http://other.org/g"), None);
    }
}
