//! Instance resource: read, replace and delete one resource of a class

use super::{require, PREFIXES};
use crate::envelope::{build_schema_url_for_instance, resource_links, RequestUrl, ResourceKind};
use crate::error::{GatewayError, GatewayResult};
use crate::events::clean_up_reserved_attributes;
use crate::params::ParamDict;
use crate::rdf::{is_valid_iri, MemorizeContext, PrefixRegistry, RDF, RDFS, XSD};
use crate::schema::ClassSchema;
use crate::sparql::{escape_literal, iri, lang_filter, literal, BoundTerm, GraphStore};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

fn rdf_type() -> String {
    format!("{}type", RDF)
}

fn rdfs_label() -> String {
    format!("{}label", RDFS)
}

/// Keep IRIs and literals in the requested language (or untagged)
fn object_lang_filter(var: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "FILTER(isIRI(?{0}) OR langMatches(lang(?{0}), \"{1}\") OR lang(?{0}) = \"\")",
            var,
            escape_literal(lang)
        ),
        None => String::new(),
    }
}

/// JSON value of a bound literal or IRI
pub fn term_to_json(term: &BoundTerm) -> Value {
    let Some(datatype) = term.datatype.as_deref().and_then(|dt| dt.strip_prefix(XSD)) else {
        return Value::String(term.value.clone());
    };
    let converted = match datatype {
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedInt"
        | "unsignedLong" => term.value.parse::<i64>().ok().map(Value::from),
        "decimal" | "float" | "double" => term.value.parse::<f64>().ok().map(Value::from),
        "boolean" => match term.value.as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    converted.unwrap_or_else(|| Value::String(term.value.clone()))
}

fn push_value(doc: &mut Map<String, Value>, key: String, value: Value) {
    match doc.get_mut(&key) {
        None => {
            doc.insert(key, value);
        }
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

async fn object_titles(
    store: &dyn GraphStore,
    objects: &[&str],
    lang: Option<&str>,
) -> GatewayResult<BTreeMap<String, String>> {
    if objects.is_empty() {
        return Ok(BTreeMap::new());
    }
    let values: Vec<String> = objects.iter().map(|o| iri(o)).collect();
    let query = format!(
        "{PREFIXES}SELECT DISTINCT ?object ?label
WHERE {{
    VALUES ?object {{ {values} }}
    ?object rdfs:label ?label .
    {lang_filter}
}}",
        values = values.join(" "),
        lang_filter = lang_filter("label", lang),
    );
    let rows = store.select(&query).await?;
    let mut titles = BTreeMap::new();
    for row in &rows {
        if let (Some(object), Some(label)) = (row.value("object"), row.value("label")) {
            titles
                .entry(object.to_string())
                .or_insert_with(|| label.to_string());
        }
    }
    Ok(titles)
}

/// Instance document; `None` when the instance has no triples in its graph
pub async fn get_instance(
    store: &dyn GraphStore,
    registry: &PrefixRegistry,
    params: &ParamDict,
    url: &RequestUrl,
) -> GatewayResult<Option<Value>> {
    let graph_uri = require(&params.graph_uri, "graph_uri")?;
    let instance_uri = require(&params.instance_uri, "instance_uri")?;
    let class_uri = require(&params.class_uri, "class_uri")?;
    let lang = params.lang.as_deref();

    let query = format!(
        "{PREFIXES}SELECT DISTINCT ?predicate ?object
WHERE {{
    GRAPH {graph} {{ {instance} ?predicate ?object . }}
    {lang_filter}
}}",
        graph = iri(graph_uri),
        instance = iri(instance_uri),
        lang_filter = object_lang_filter("object", lang),
    );
    let rows = store.select(&query).await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let expand = params.flag("expand_object_properties");
    let titles = if expand {
        let objects: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("object"))
            .filter(|term| term.is_uri())
            .map(|term| term.value.as_str())
            .collect();
        object_titles(store, &objects, lang).await?
    } else {
        BTreeMap::new()
    };

    let rdf_type = rdf_type();
    let label = rdfs_label();
    let mut ctx = MemorizeContext::new(registry);
    let mut doc = Map::new();
    let mut title = None;

    for row in &rows {
        let (Some(predicate), Some(object)) = (row.value("predicate"), row.get("object")) else {
            continue;
        };
        if predicate == rdf_type {
            continue;
        }
        if predicate == label && title.is_none() {
            title = Some(object.value.clone());
        }
        let value = if object.is_uri() && expand {
            let object_title = titles
                .get(&object.value)
                .cloned()
                .unwrap_or_else(|| object.value.clone());
            json!({"@id": object.value, "title": object_title})
        } else {
            term_to_json(object)
        };
        push_value(&mut doc, ctx.shorten(predicate), value);
    }
    debug!("Instance {} has {} predicates", instance_uri, doc.len());

    let mut context = Map::new();
    if let Some(lang) = lang {
        context.insert("@language".to_string(), Value::String(lang.to_string()));
    }
    let short_type = ctx.shorten(class_uri);
    context.extend(ctx.context());

    doc.insert("@id".to_string(), Value::String(instance_uri.to_string()));
    doc.insert("@type".to_string(), Value::String(short_type));
    doc.insert(
        "title".to_string(),
        Value::String(title.unwrap_or_default()),
    );
    doc.insert("_base_url".to_string(), Value::String(url.base_url()));
    doc.insert(
        "_resource_id".to_string(),
        Value::String(params.instance_id.clone().unwrap_or_default()),
    );
    doc.insert(
        "_instance_prefix".to_string(),
        Value::String(params.instance_prefix.clone().unwrap_or_default()),
    );
    doc.insert(
        "_class_prefix".to_string(),
        Value::String(params.class_prefix.clone().unwrap_or_default()),
    );
    doc.insert("@context".to_string(), Value::Object(context));
    doc.insert(
        "$schema".to_string(),
        Value::String(build_schema_url_for_instance(url, params)),
    );
    doc.insert(
        "links".to_string(),
        Value::Array(resource_links(ResourceKind::Instance, url, params)),
    );
    Ok(Some(Value::Object(doc)))
}

/// Whether the instance has any triple in its graph
pub async fn instance_exists(store: &dyn GraphStore, params: &ParamDict) -> GatewayResult<bool> {
    let query = format!(
        "ASK {{ GRAPH {} {{ {} ?p ?o . }} }}",
        iri(require(&params.graph_uri, "graph_uri")?),
        iri(require(&params.instance_uri, "instance_uri")?),
    );
    Ok(store.ask(&query).await?)
}

fn datatype_of(shape_range: Option<&str>) -> Option<&str> {
    shape_range
        .filter(|range| range.starts_with(XSD))
        .filter(|range| *range != format!("{}string", XSD))
}

fn object_term(key: &str, value: &Value) -> GatewayResult<String> {
    let target = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("@id").and_then(Value::as_str),
        _ => None,
    };
    match target {
        Some(target) if is_valid_iri(target) => Ok(iri(target)),
        _ => Err(GatewayError::BadRequest(format!(
            "Property {} expects a resource URI, got {}",
            key, value
        ))),
    }
}

fn literal_term(key: &str, value: &Value, datatype: Option<&str>) -> GatewayResult<String> {
    let (lexical, inferred) = match value {
        Value::String(s) => (s.clone(), None),
        Value::Bool(b) => (b.to_string(), Some(format!("{}boolean", XSD))),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            (n.to_string(), Some(format!("{}integer", XSD)))
        }
        Value::Number(n) => (n.to_string(), Some(format!("{}double", XSD))),
        other => {
            return Err(GatewayError::BadRequest(format!(
                "Property {} has an unsupported value {}",
                key, other
            )))
        }
    };
    match datatype.map(str::to_string).or(inferred) {
        Some(datatype) => Ok(format!("{}^^{}", literal(&lexical, None), iri(&datatype))),
        None => Ok(literal(&lexical, None)),
    }
}

/// Instance body with compact URIs expanded and reserved attributes dropped
pub(crate) fn expand_instance_data(
    registry: &PrefixRegistry,
    body: &Value,
) -> GatewayResult<Map<String, Value>> {
    match clean_up_reserved_attributes(registry.expand_all_uris_recursively(body)) {
        Value::Object(data) => Ok(data),
        _ => Err(GatewayError::BadRequest(
            "Instance data must be a JSON object".to_string(),
        )),
    }
}

/// Triples describing `subject` from an expanded instance document.
///
/// Every key must be a property of the class (or `rdfs:label`) and every
/// required property must be present.
pub(crate) fn instance_triples(
    subject: &str,
    schema: &ClassSchema,
    data: &Map<String, Value>,
) -> GatewayResult<Vec<String>> {
    let rdf_type = rdf_type();
    let label = rdfs_label();

    for required in schema.required_uris() {
        if !data.contains_key(required) {
            return Err(GatewayError::BadRequest(format!(
                "Required property ({}) was not given.",
                required
            )));
        }
    }

    let mut triples = vec![format!("{} a {} .", iri(subject), iri(&schema.class_uri))];
    for (key, value) in data {
        if *key == rdf_type {
            continue;
        }
        let shape = schema.property(key);
        if shape.is_none() && *key != label {
            return Err(GatewayError::BadRequest(format!(
                "Property ({}) is not defined in the schema of class ({}).",
                key, schema.class_uri
            )));
        }
        let values = match value {
            Value::Array(values) => values.iter().collect::<Vec<_>>(),
            Value::Null => continue,
            single => vec![single],
        };
        for value in values {
            let term = match shape {
                Some(shape) if shape.is_object() => object_term(key, value)?,
                Some(shape) => {
                    literal_term(key, value, datatype_of(shape.range_uris.first().map(String::as_str)))?
                }
                None => literal_term(key, value, None)?,
            };
            triples.push(format!("{} {} {} .", iri(subject), iri(key), term));
        }
    }
    Ok(triples)
}

/// Replace every triple of the instance with those built from `data`
pub async fn edit_instance(
    store: &dyn GraphStore,
    params: &ParamDict,
    schema: &ClassSchema,
    data: &Map<String, Value>,
) -> GatewayResult<()> {
    let graph = iri(require(&params.graph_uri, "graph_uri")?);
    let instance_uri = require(&params.instance_uri, "instance_uri")?;
    let triples = instance_triples(instance_uri, schema, data)?;

    let update = format!(
        "DELETE WHERE {{ GRAPH {graph} {{ {instance} ?p ?o . }} }} ;
INSERT DATA {{ GRAPH {graph} {{
    {triples}
}} }}",
        instance = iri(instance_uri),
        triples = triples.join("\n    "),
    );
    store.update(&update).await?;
    Ok(())
}

/// Remove the instance; `false` when it did not exist
pub async fn delete_instance(store: &dyn GraphStore, params: &ParamDict) -> GatewayResult<bool> {
    if !instance_exists(store, params).await? {
        return Ok(false);
    }
    let update = format!(
        "DELETE WHERE {{ GRAPH {} {{ {} ?p ?o . }} }}",
        iri(require(&params.graph_uri, "graph_uri")?),
        iri(require(&params.instance_uri, "instance_uri")?),
    );
    store.update(&update).await?;
    Ok(true)
}
