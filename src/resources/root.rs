//! Root resource: the contexts (named graphs) served by the gateway

use super::{context_name_for_graph, count, list_envelope, PREFIXES};
use crate::envelope::{RequestUrl, ResourceKind};
use crate::error::GatewayResult;
use crate::params::ParamDict;
use crate::rdf::PrefixRegistry;
use crate::sparql::{escape_literal, GraphStore};
use serde_json::{json, Value};

/// Graphs maintained by the triplestore itself
const IGNORED_GRAPH_PREFIXES: &[&str] = &[
    "http://www.openlinksw.com/",
    "http://localhost:8890/",
    "http://www.w3.org/",
];

fn graph_filter() -> String {
    IGNORED_GRAPH_PREFIXES
        .iter()
        .map(|prefix| format!("FILTER(!STRSTARTS(STR(?graph), \"{}\"))", escape_literal(prefix)))
        .collect::<Vec<_>>()
        .join("\n    ")
}

fn list_query(params: &ParamDict) -> String {
    format!(
        "{PREFIXES}SELECT DISTINCT ?graph
WHERE {{
    GRAPH ?graph {{ ?s a ?type . }}
    {filter}
}}
ORDER BY ?graph
LIMIT {limit}
OFFSET {offset}",
        filter = graph_filter(),
        limit = params.per_page,
        offset = params.offset,
    )
}

fn count_query() -> String {
    format!(
        "{PREFIXES}SELECT (COUNT(DISTINCT ?graph) AS ?total)
WHERE {{
    GRAPH ?graph {{ ?s a ?type . }}
    {filter}
}}",
        filter = graph_filter(),
    )
}

/// One page of contexts; graphs with no context name are left out
pub async fn list_all_contexts(
    store: &dyn GraphStore,
    registry: &PrefixRegistry,
    params: &ParamDict,
    url: &RequestUrl,
) -> GatewayResult<Value> {
    let rows = store.select(&list_query(params)).await?;
    let items: Vec<Value> = rows
        .iter()
        .filter_map(|row| row.value("graph"))
        .filter_map(|graph| {
            context_name_for_graph(registry, graph).map(|name| {
                json!({
                    "@id": graph,
                    "title": name,
                    "resource_id": name,
                })
            })
        })
        .collect();

    let item_count = if params.flag("do_item_count") {
        Some(count(store, &count_query()).await?)
    } else {
        None
    };

    Ok(Value::Object(list_envelope(
        ResourceKind::Root,
        items,
        url,
        params,
        item_count,
    )))
}
