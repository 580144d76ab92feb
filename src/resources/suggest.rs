//! Suggest: search the possible values of an object property

use super::search::FUZZINESS;
use super::{context_name_for_graph, list_envelope, PREFIXES};
use crate::config::SearchConfig;
use crate::envelope::{RequestUrl, ResourceKind};
use crate::error::GatewayResult;
use crate::params::ParamDict;
use crate::rdf::{is_valid_iri, PrefixRegistry, RDFS};
use crate::search_engine::{hits, source_text, total_hits, SearchEngine};
use crate::sparql::{iri, GraphStore};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;
use validator::{Validate, ValidationError};

/// `POST /_suggest` body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SuggestBody {
    #[validate(nested)]
    pub search: SuggestSearch,
}

/// What to look for and where
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SuggestSearch {
    #[validate(length(min = 1))]
    pub pattern: String,
    /// Object property whose range classes are searched
    #[validate(custom(function = "validate_iri"))]
    pub target: String,
    /// Restrict to these graphs
    #[serde(default)]
    #[validate(custom(function = "validate_iris"))]
    pub graphs: Vec<String>,
    /// Restrict to these range classes
    #[serde(default)]
    #[validate(custom(function = "validate_iris"))]
    pub classes: Vec<String>,
    /// Extra fields matched besides the label
    #[serde(default)]
    pub fields: Vec<String>,
}

fn validate_iri(value: &str) -> Result<(), ValidationError> {
    if is_valid_iri(value) {
        Ok(())
    } else {
        Err(ValidationError::new("iri"))
    }
}

fn validate_iris(values: &[String]) -> Result<(), ValidationError> {
    values.iter().try_for_each(|value| validate_iri(value))
}

/// A class the target property may point at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeClass {
    pub class_uri: String,
    pub graph_uri: String,
    pub title: Option<String>,
}

fn in_filter(var: &str, values: &[String]) -> String {
    if values.is_empty() {
        return String::new();
    }
    let values: Vec<String> = values.iter().map(|v| iri(v)).collect();
    format!("FILTER(?{} IN ({}))", var, values.join(", "))
}

/// Range classes (and their subclasses) of the target predicate
pub async fn range_classes(
    store: &dyn GraphStore,
    search: &SuggestSearch,
    lang: Option<&str>,
) -> GatewayResult<Vec<RangeClass>> {
    let query = format!(
        "{PREFIXES}SELECT DISTINCT ?range ?range_graph ?range_label
WHERE {{
    {target} rdfs:range ?root_range .
    GRAPH ?range_graph {{ ?range rdfs:subClassOf* ?root_range . }}
    OPTIONAL {{
        ?range rdfs:label ?range_label .
        {lang_filter}
    }}
    {graphs}
    {classes}
}}",
        target = iri(&search.target),
        lang_filter = crate::sparql::lang_filter("range_label", lang),
        graphs = in_filter("range_graph", &search.graphs),
        classes = in_filter("range", &search.classes),
    );
    let rows = store.select(&query).await?;

    let mut ranges: Vec<RangeClass> = Vec::new();
    for row in &rows {
        let (Some(class_uri), Some(graph_uri)) = (row.value("range"), row.value("range_graph"))
        else {
            continue;
        };
        if ranges.iter().any(|r| r.class_uri == class_uri) {
            continue;
        }
        ranges.push(RangeClass {
            class_uri: class_uri.to_string(),
            graph_uri: graph_uri.to_string(),
            title: row.value("range_label").map(str::to_string),
        });
    }
    Ok(ranges)
}

/// Indexes of the graphs holding the range classes
pub fn suggest_indexes(
    config: &SearchConfig,
    registry: &PrefixRegistry,
    ranges: &[RangeClass],
) -> Vec<String> {
    let mut indexes: Vec<String> = ranges
        .iter()
        .filter_map(|range| context_name_for_graph(registry, &range.graph_uri))
        .map(|context| format!("{}{}", config.index_prefix, context))
        .collect();
    indexes.sort();
    indexes.dedup();
    indexes
}

pub fn suggest_query(
    search: &SuggestSearch,
    ranges: &[RangeClass],
    analyzer: &str,
    params: &ParamDict,
) -> Value {
    let mut fields = vec![format!("{}label", RDFS)];
    fields.extend(search.fields.iter().cloned());
    let types: Vec<Value> = ranges
        .iter()
        .map(|range| json!({"type": {"value": range.class_uri}}))
        .collect();

    json!({
        "filter": {"bool": {"should": types}},
        "query": {
            "multi_match": {
                "fields": fields,
                "query": search.pattern,
                "analyzer": analyzer,
                "fuzziness": FUZZINESS,
            }
        },
        "from": params.offset,
        "size": params.per_page,
    })
}

/// Suggestions for `body`; `None` when nothing matched
pub async fn do_suggest(
    store: &dyn GraphStore,
    search: &dyn SearchEngine,
    registry: &PrefixRegistry,
    config: &SearchConfig,
    params: &ParamDict,
    url: &RequestUrl,
    body: &SuggestBody,
) -> GatewayResult<Option<Value>> {
    let ranges = range_classes(store, &body.search, params.lang.as_deref()).await?;
    if ranges.is_empty() {
        debug!("Predicate {} has no range classes", body.search.target);
        return Ok(None);
    }

    let query = suggest_query(&body.search, &ranges, &config.analyzer, params);
    let indexes = suggest_indexes(config, registry, &ranges);
    let response = search.search(&query, &indexes).await?;
    let found = hits(&response);
    if found.is_empty() {
        return Ok(None);
    }

    let titles: BTreeMap<&str, &str> = ranges
        .iter()
        .filter_map(|r| Some((r.class_uri.as_str(), r.title.as_deref()?)))
        .collect();
    let label = format!("{}label", RDFS);
    let items: Vec<Value> = found
        .iter()
        .map(|hit| {
            let class_uri = hit["_type"].as_str().unwrap_or_default();
            let mut item = json!({
                "@id": hit["_id"],
                "title": source_text(hit, &label).unwrap_or_default(),
                "@type": class_uri,
            });
            if let Some(title) = titles.get(class_uri) {
                item["type_title"] = Value::String(title.to_string());
            }
            item
        })
        .collect();

    let item_count = params.flag("do_item_count").then(|| total_hits(&response));
    let envelope = list_envelope(ResourceKind::Suggest, items, url, params, item_count);
    Ok(Some(Value::Object(envelope)))
}
