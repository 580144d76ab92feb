//! Response envelopes: hypermedia links, schema URLs, list wrappers
//!
//! Every JSON body the gateway returns is described by a JSON schema that
//! lives next to it (`_schema_list` for lists, `_schema` for instances); the
//! helpers here build those URLs, the `Content-Type` profile pointing at
//! them and the `links` arrays of list responses.

pub mod json_schema;

pub use json_schema::{
    class_schema_links, collection_schema, context_schema, merge_schemas, pagination_schema,
    root_schema, search_param_schema, suggest_schema,
};

use crate::params::ParamDict;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};

/// Characters left readable in generated query strings
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':')
    .remove(b'/');

/// Query-string keys rewritten by pagination links
const PAGING_KEYS: &[&str] = &["page", "per_page"];

/// Percent-encode one query-string component
pub fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Join `key=value` pairs into a query string
pub fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode_query_value(k), encode_query_value(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// The URL a request was made to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    /// Decoded query-string pairs, in request order
    pub pairs: Vec<(String, String)>,
}

impl RequestUrl {
    pub fn new(scheme: &str, host: &str, path: &str, query: Option<&str>) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
            pairs: Vec::new(),
        }
    }

    pub fn with_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.pairs = pairs;
        self
    }

    /// `scheme://host`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Path without a trailing slash (the root stays empty)
    pub fn trimmed_path(&self) -> &str {
        self.path.trim_end_matches('/')
    }

    /// `scheme://host/path`, without the query string
    pub fn base_url(&self) -> String {
        format!("{}{}", self.origin(), self.path)
    }

    /// URL exactly as requested
    pub fn full_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.base_url(), query),
            None => self.base_url(),
        }
    }

    /// URL of a child resource created under this one, keeping the query
    pub fn resource_url(&self, resource_id: &str) -> String {
        let mut url = format!("{}{}/{}", self.origin(), self.trimmed_path(), resource_id);
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// `Content-Type` of a response described by `schema_url`
pub fn content_type_profile(schema_url: &str) -> String {
    format!("application/json; profile={}", schema_url)
}

fn class_prefix_query(params: &ParamDict) -> String {
    match params.get("class_prefix") {
        Some(prefix) if !prefix.is_empty() => {
            format!("?class_prefix={}", encode_query_value(prefix))
        }
        _ => String::new(),
    }
}

/// Schema of the list served at the request path
pub fn build_schema_url(url: &RequestUrl, params: &ParamDict) -> String {
    format!(
        "{}{}/_schema_list{}",
        url.origin(),
        url.trimmed_path(),
        class_prefix_query(params)
    )
}

/// Schema of the instance named by `params`
pub fn build_schema_url_for_instance(url: &RequestUrl, params: &ParamDict) -> String {
    format!(
        "{}/{}/{}/_schema{}",
        url.origin(),
        params.context_name.as_deref().unwrap_or_default(),
        params.class_name.as_deref().unwrap_or_default(),
        class_prefix_query(params)
    )
}

pub fn link(href: impl Into<String>, method: &str, rel: &str) -> Value {
    json!({"href": href.into(), "method": method, "rel": rel})
}

/// `first`/`previous`/`next`/`last` links for one page of a listing.
///
/// `next` is offered when the count says more items exist, or, without a
/// count, when this page came back full. `last` needs the count.
pub fn pagination_links(
    base: &str,
    pairs: &[(String, String)],
    page: u64,
    per_page: u64,
    item_count: Option<u64>,
    page_len: usize,
) -> Vec<Value> {
    let kept: Vec<(String, String)> = pairs
        .iter()
        .filter(|(k, _)| !PAGING_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    let href = |page: u64| {
        let mut query = kept.clone();
        query.push(("page".to_string(), page.to_string()));
        query.push(("per_page".to_string(), per_page.to_string()));
        format!("{}?{}", base, encode_query(&query))
    };

    let mut links = vec![link(href(1), "GET", "first")];
    if page > 1 {
        links.push(link(href(page - 1), "GET", "previous"));
    }
    let has_next = match item_count {
        Some(count) => page.checked_mul(per_page).is_some_and(|seen| seen < count),
        None => page_len as u64 >= per_page,
    };
    if let Some(next) = page.checked_add(1).filter(|_| has_next) {
        links.push(link(href(next), "GET", "next"));
    }
    if let Some(count) = item_count {
        let last = count.div_ceil(per_page).max(1);
        links.push(link(href(last), "GET", "last"));
    }
    links
}

/// Resource shapes that carry a `links` array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Root,
    Context,
    Collection,
    Instance,
    Search,
    Suggest,
}

/// Concrete links of a resource: `self`, its schema, and the actions it offers
pub fn resource_links(kind: ResourceKind, url: &RequestUrl, params: &ParamDict) -> Vec<Value> {
    let mut links = vec![link(url.full_url(), "GET", "self")];
    let class_path = format!(
        "/{}/{}",
        params.context_name.as_deref().unwrap_or_default(),
        params.class_name.as_deref().unwrap_or_default()
    );
    let class_prefix = class_prefix_query(params);

    match kind {
        ResourceKind::Instance => {
            links.push(link(
                build_schema_url_for_instance(url, params),
                "GET",
                "describedBy",
            ));
            links.push(link(url.full_url(), "PUT", "edit"));
            links.push(link(url.full_url(), "DELETE", "delete"));
            links.push(link(format!("{}{}", class_path, class_prefix), "GET", "collection"));
        }
        ResourceKind::Collection => {
            links.push(link(build_schema_url(url, params), "GET", "describedBy"));
            let mut add = link(format!("{}{}", class_path, class_prefix), "POST", "add");
            add["schema"] = json!({"$ref": format!("{}/_schema{}", class_path, class_prefix)});
            links.push(add);
            let mut search = link(
                format!(
                    "{}/_search?graph_uri={}&class_uri={}&pattern={{pattern}}",
                    class_path,
                    encode_query_value(params.graph_uri.as_deref().unwrap_or_default()),
                    encode_query_value(params.class_uri.as_deref().unwrap_or_default()),
                ),
                "GET",
                "search",
            );
            search["schema"] = search_param_schema();
            links.push(search);
        }
        ResourceKind::Root | ResourceKind::Context | ResourceKind::Search | ResourceKind::Suggest => {
            links.push(link(build_schema_url(url, params), "GET", "describedBy"));
        }
    }
    links
}

/// Body of a collection listing that matched nothing
pub fn empty_collection(params: &ParamDict) -> Value {
    let mut filter_message = String::new();
    for filter in &params.po_filters {
        if !filter.predicate.starts_with('?') {
            filter_message.push_str(&format!(" with p{}=({})", filter.index, filter.predicate));
        }
        if !filter.object.starts_with('?') {
            filter_message.push_str(&format!(" with o{}=({})", filter.index, filter.object));
        }
    }
    json!({
        "warning": format!(
            "Instances of class ({}) in graph ({}){} and in language=({}) were not found.",
            params.class_uri.as_deref().unwrap_or_default(),
            params.graph_uri.as_deref().unwrap_or_default(),
            filter_message,
            params.lang_label()
        ),
        "items": []
    })
}
