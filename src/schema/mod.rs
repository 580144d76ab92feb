//! Class schema aggregation
//!
//! A class schema is built from three triplestore queries: the class itself
//! (label and comment), the predicates whose domain is the class, and the
//! cardinality restrictions declared on it. Predicate rows arrive one per
//! (predicate, range) combination and are folded into one
//! [`PredicateShape`] per predicate by [`convert_bindings`].

mod aggregate;
pub mod queries;

pub use aggregate::{
    apply_cardinalities, assemble_predicate, convert_bindings, extract_cardinalities,
    get_common_key, join_predicates, merge_ranges, normalize_predicate_range, ConvertedPredicates,
};

use crate::params::ParamDict;
use crate::rdf::{MemorizeContext, PrefixRegistry, OWL, RDFS, XSD};
use crate::sparql::{GraphStore, SparqlResult};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-04/schema#";

/// Whether a predicate points at resources or at literal values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PropertyKind {
    #[default]
    Datatype,
    Object,
}

impl PropertyKind {
    /// Kind from the declared `rdf:type`, falling back to the range
    pub fn classify(type_uri: Option<&str>, range_uri: &str) -> Self {
        match type_uri.and_then(|t| t.strip_prefix(OWL)) {
            Some("ObjectProperty") => PropertyKind::Object,
            Some("DatatypeProperty") => PropertyKind::Datatype,
            _ if range_uri.starts_with(XSD) || range_uri == format!("{}Literal", RDFS) => {
                PropertyKind::Datatype
            }
            _ => PropertyKind::Object,
        }
    }
}

/// One entry of a predicate's `range`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeShape {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Single range, or the ordered list of every range seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RangeSpec {
    One(RangeShape),
    Many(Vec<RangeShape>),
}

impl RangeSpec {
    pub fn is_many(&self) -> bool {
        matches!(self, RangeSpec::Many(_))
    }

    pub fn into_vec(self) -> Vec<RangeShape> {
        match self {
            RangeSpec::One(range) => vec![range],
            RangeSpec::Many(ranges) => ranges,
        }
    }
}

/// `items` of an array-valued predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemShape {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// JSON-schema property describing one predicate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredicateShape {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub graph: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemShape>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip)]
    pub property_kind: PropertyKind,
    #[serde(skip)]
    pub predicate_uri: String,
    /// Full range URIs in first-seen order
    #[serde(skip)]
    pub range_uris: Vec<String>,
}

impl PredicateShape {
    /// The shape's range, or one built from its own type and format
    pub fn explicit_range(&self) -> RangeSpec {
        match &self.range {
            Some(range) => range.clone(),
            None => RangeSpec::One(RangeShape {
                id: None,
                graph: None,
                title: None,
                kind: self.kind.clone(),
                format: self.format.clone(),
            }),
        }
    }

    /// Whether values are resource references
    pub fn is_object(&self) -> bool {
        self.property_kind == PropertyKind::Object
    }

    /// Whether more than one value is allowed
    pub fn is_array(&self) -> bool {
        self.kind == "array"
    }
}

/// Cardinality facets of one (predicate, range) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cardinality {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

/// predicate URI → range URI → facets
pub type Cardinalities = BTreeMap<String, BTreeMap<String, Cardinality>>;

/// Aggregated schema of one class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSchema {
    pub class_uri: String,
    pub title: String,
    pub description: Option<String>,
    pub properties: IndexMap<String, PredicateShape>,
    pub required: Vec<String>,
    /// Prefixes used while shortening, for `@context`
    pub context: Map<String, Value>,
    /// Short object property → short range
    pub object_properties: BTreeMap<String, String>,
    pub lang: Option<String>,
}

impl ClassSchema {
    /// Property declared for a full predicate URI
    pub fn property(&self, predicate_uri: &str) -> Option<&PredicateShape> {
        self.properties
            .values()
            .find(|shape| shape.predicate_uri == predicate_uri)
    }

    /// Full predicate URIs of the required properties
    pub fn required_uris(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter_map(|name| self.properties.get(name))
            .map(|shape| shape.predicate_uri.as_str())
            .collect()
    }

    /// JSON-LD `@context` including the response language
    pub fn json_ld_context(&self) -> Value {
        let mut context = Map::new();
        if let Some(lang) = &self.lang {
            context.insert("@language".to_string(), Value::String(lang.clone()));
        }
        context.extend(self.context.clone());
        Value::Object(context)
    }

    /// Schema document with the given hypermedia links
    pub fn to_document(&self, links: Vec<Value>) -> Value {
        let mut doc = json!({
            "$schema": JSON_SCHEMA_DRAFT,
            "@context": self.json_ld_context(),
            "@id": self.class_uri,
            "title": self.title,
            "type": "object",
            "properties": self.properties,
            "links": links,
        });
        if let Some(description) = &self.description {
            doc["description"] = Value::String(description.clone());
        }
        if !self.required.is_empty() {
            doc["required"] = json!(self.required);
        }
        doc
    }
}

/// Run a lang-filtered query, retrying unfiltered when it finds nothing
async fn select_with_lang_fallback(
    store: &dyn GraphStore,
    lang: Option<&str>,
    build: impl Fn(Option<&str>) -> String,
) -> SparqlResult<Vec<crate::sparql::QuerySolution>> {
    let rows = store.select(&build(lang)).await?;
    if rows.is_empty() && lang.is_some() {
        debug!("No rows in language {:?}, querying without language filter", lang);
        return store.select(&build(None)).await;
    }
    Ok(rows)
}

/// Aggregate the schema of the class named by `params`.
///
/// Returns `Ok(None)` when the class is not declared in the triplestore.
pub async fn get_schema(
    store: &dyn GraphStore,
    params: &ParamDict,
    registry: &PrefixRegistry,
) -> SparqlResult<Option<ClassSchema>> {
    let Some(class_uri) = params.class_uri.as_deref() else {
        return Ok(None);
    };
    let lang = params.lang.as_deref();

    let class_rows =
        select_with_lang_fallback(store, lang, |lang| queries::class_schema(class_uri, lang))
            .await?;
    let Some(class_row) = class_rows.first() else {
        return Ok(None);
    };

    let predicate_rows =
        select_with_lang_fallback(store, lang, |lang| queries::predicates(class_uri, lang))
            .await?;
    let cardinality_rows = store.select(&queries::cardinalities(class_uri)).await?;
    let cardinalities = extract_cardinalities(&cardinality_rows);

    let mut ctx = MemorizeContext::new(registry);
    let converted = convert_bindings(&predicate_rows, &cardinalities, &mut ctx);

    Ok(Some(ClassSchema {
        class_uri: class_uri.to_string(),
        title: class_row.value("title").unwrap_or_default().to_string(),
        description: class_row.value("comment").map(str::to_string),
        properties: converted.properties,
        required: converted.required,
        context: ctx.context(),
        object_properties: ctx.object_properties().clone(),
        lang: params.lang.clone(),
    }))
}
