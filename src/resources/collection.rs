//! Collection resource: filtered listings of a class and instance creation

use super::instance::{expand_instance_data, instance_triples};
use super::{count, list_envelope, require, split_resource_id, PREFIXES};
use crate::envelope::{RequestUrl, ResourceKind};
use crate::error::GatewayResult;
use crate::params::{is_variable, ParamDict, ParamError, PoFilter};
use crate::rdf::{is_valid_iri, PrefixRegistry, RDFS};
use crate::schema::ClassSchema;
use crate::sparql::{escape_literal, iri, is_variable_name, GraphStore};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Where clause and projected variables of a listing
#[derive(Debug, Default)]
struct ListingQuery {
    patterns: Vec<String>,
    variables: Vec<String>,
    order_by: String,
}

fn predicate_term(filter: &PoFilter) -> GatewayResult<String> {
    if is_variable(&filter.predicate) {
        if is_variable_name(&filter.predicate) {
            return Ok(filter.predicate.clone());
        }
    } else if is_valid_iri(&filter.predicate) {
        return Ok(iri(&filter.predicate));
    }
    Err(ParamError::InvalidParamValue {
        key: format!("p{}", filter.index),
        value: filter.predicate.clone(),
        reason: "expected a variable or an absolute URI".to_string(),
    }
    .into())
}

/// Object term plus the extra filter a literal needs
fn object_term(filter: &PoFilter) -> GatewayResult<(String, Option<String>)> {
    if is_variable(&filter.object) {
        if is_variable_name(&filter.object) {
            return Ok((filter.object.clone(), None));
        }
        return Err(ParamError::InvalidParamValue {
            key: format!("o{}", filter.index),
            value: filter.object.clone(),
            reason: "expected a variable, an absolute URI or a literal".to_string(),
        }
        .into());
    }
    if is_valid_iri(&filter.object) {
        return Ok((iri(&filter.object), None));
    }
    let var = format!("?literal{}", filter.index);
    let condition = format!(
        "FILTER(STR({}) = \"{}\")",
        var,
        escape_literal(&filter.object)
    );
    Ok((var, Some(condition)))
}

fn build_listing(
    class_uri: &str,
    params: &ParamDict,
    registry: &PrefixRegistry,
) -> GatewayResult<ListingQuery> {
    let mut query = ListingQuery::default();

    if params.flag("direct_instances_only") {
        query.patterns.push(format!("?subject a {} .", iri(class_uri)));
    } else {
        query.patterns.push(format!(
            "?subject a ?type .\n    ?type rdfs:subClassOf* {} .",
            iri(class_uri)
        ));
    }
    query.patterns.push("?subject rdfs:label ?title .".to_string());
    let lang_filter = params.lang_filter("title");
    if !lang_filter.is_empty() {
        query.patterns.push(lang_filter);
    }

    for filter in &params.po_filters {
        let predicate = predicate_term(filter)?;
        let (object, condition) = object_term(filter)?;
        query
            .patterns
            .push(format!("?subject {} {} .", predicate, object));
        query.patterns.extend(condition);
        for term in [&predicate, &object] {
            if is_variable(term) && !term.starts_with("?literal") && !query.variables.contains(term) {
                query.variables.push(term.clone());
            }
        }
    }

    let sort_order = match params.get("sort_order").unwrap_or("ASC").to_uppercase().as_str() {
        "ASC" => "ASC",
        "DESC" => "DESC",
        other => {
            return Err(ParamError::InvalidParamValue {
                key: "sort_order".to_string(),
                value: other.to_string(),
                reason: "expected ASC or DESC".to_string(),
            }
            .into())
        }
    };
    let sort_by = registry.expand_uri(params.get("sort_by").unwrap_or_default());
    query.order_by = if sort_by.is_empty() || sort_by == format!("{}label", RDFS) {
        format!("{}(?title)", sort_order)
    } else {
        if !is_valid_iri(&sort_by) {
            return Err(ParamError::InvalidParamValue {
                key: "sort_by".to_string(),
                value: sort_by,
                reason: "expected an absolute URI or a known prefix".to_string(),
            }
            .into());
        }
        let pattern = format!("?subject {} ?sort_object .", iri(&sort_by));
        if params.flag("sort_include_empty") {
            query.patterns.push(format!("OPTIONAL {{ {} }}", pattern));
        } else {
            query.patterns.push(pattern);
        }
        format!("{}(?sort_object)", sort_order)
    };
    Ok(query)
}

/// One page of a class's instances; `None` when nothing matched
pub async fn filter_instances(
    store: &dyn GraphStore,
    registry: &PrefixRegistry,
    params: &ParamDict,
    url: &RequestUrl,
) -> GatewayResult<Option<Value>> {
    let graph_uri = require(&params.graph_uri, "graph_uri")?;
    let class_uri = require(&params.class_uri, "class_uri")?;
    let listing = build_listing(class_uri, params, registry)?;
    let where_clause = format!(
        "FROM {}\nWHERE {{\n    {}\n}}",
        iri(graph_uri),
        listing.patterns.join("\n    ")
    );

    let query = format!(
        "{PREFIXES}SELECT DISTINCT ?subject ?title {vars}
{where_clause}
ORDER BY {order_by}
LIMIT {limit}
OFFSET {offset}",
        vars = listing.variables.join(" "),
        order_by = listing.order_by,
        limit = params.per_page,
        offset = params.offset,
    );
    let rows = store.select(&query).await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let class_prefix = params.class_prefix.clone().unwrap_or_default();
    let items: Vec<Value> = rows
        .iter()
        .filter_map(|row| Some((row, row.value("subject")?, row.value("title")?)))
        .map(|(row, subject, title)| {
            let (instance_prefix, resource_id) = split_resource_id(subject);
            let mut item = json!({
                "@id": subject,
                "title": title,
                "resource_id": resource_id,
                "instance_prefix": instance_prefix,
                "class_prefix": class_prefix,
            });
            for var in &listing.variables {
                let name = &var[1..];
                if let Some(value) = row.value(name) {
                    item[name] = Value::String(value.to_string());
                }
            }
            item
        })
        .collect();

    let item_count = if params.flag("do_item_count") {
        let count_query = format!(
            "{PREFIXES}SELECT (COUNT(DISTINCT ?subject) AS ?total)\n{}",
            where_clause
        );
        Some(count(store, &count_query).await?)
    } else {
        None
    };

    let mut body = list_envelope(ResourceKind::Collection, items, url, params, item_count);
    body.insert("@id".to_string(), Value::String(class_uri.to_string()));
    body.insert("_class_prefix".to_string(), Value::String(class_prefix));
    Ok(Some(Value::Object(body)))
}

/// Store a new instance of the class described by `schema`.
///
/// `body` may use compact URIs; they are expanded before validation. When
/// `instance_uri` is `None` a fresh id is minted under the instance prefix.
/// Returns the instance URI and id.
pub async fn create_instance(
    store: &dyn GraphStore,
    registry: &PrefixRegistry,
    params: &ParamDict,
    schema: &ClassSchema,
    body: &Value,
    instance_uri: Option<String>,
) -> GatewayResult<(String, String)> {
    let graph_uri = require(&params.graph_uri, "graph_uri")?;
    let data = expand_instance_data(registry, body)?;

    let (instance_uri, instance_id) = match instance_uri {
        Some(uri) => {
            let id = split_resource_id(&uri).1.to_string();
            (uri, id)
        }
        None => {
            let id = Uuid::new_v4().simple().to_string();
            let prefix = require(&params.instance_prefix, "instance_prefix")?;
            (format!("{}{}", prefix, id), id)
        }
    };

    let triples = instance_triples(&instance_uri, schema, &data)?;
    let update = format!(
        "INSERT DATA {{ GRAPH {} {{\n    {}\n}} }}",
        iri(graph_uri),
        triples.join("\n    ")
    );
    store.update(&update).await?;
    info!("Created instance {} of {}", instance_uri, schema.class_uri);
    Ok((instance_uri, instance_id))
}
