//! Per-endpoint parameter declarations

use super::is_po_filter_key;
use std::collections::{BTreeMap, BTreeSet};

/// Keys every endpoint accepts
pub const SYSTEM_KEYS: &[&str] = &[
    "context_name",
    "class_name",
    "instance_id",
    "graph_uri",
    "class_uri",
    "instance_uri",
    "lang",
    "page",
    "per_page",
];

/// Declared parameters of one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSpec {
    optional: BTreeSet<String>,
    required: BTreeSet<String>,
    defaults: BTreeMap<String, String>,
    po_filters: bool,
}

impl ParameterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optional(mut self, names: &[&str]) -> Self {
        self.optional.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn required(mut self, names: &[&str]) -> Self {
        self.required.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn default_value(mut self, name: &str, value: &str) -> Self {
        self.defaults.insert(name.to_string(), value.to_string());
        self
    }

    /// Accept `p`, `o`, `pN`, `oN` filter keys
    pub fn with_po_filters(mut self) -> Self {
        self.po_filters = true;
        self
    }

    /// Union of two declarations; `other` wins on conflicting defaults
    pub fn merge(mut self, other: ParameterSpec) -> Self {
        self.optional.extend(other.optional);
        self.required.extend(other.required);
        self.defaults.extend(other.defaults);
        self.po_filters |= other.po_filters;
        self
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.optional.contains(key)
            || self.required.contains(key)
            || self.defaults.contains_key(key)
            || SYSTEM_KEYS.contains(&key)
            || (self.po_filters && is_po_filter_key(key))
    }

    /// Sorted list of accepted names, used in error messages
    pub fn supported(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .optional
            .iter()
            .chain(self.required.iter())
            .chain(self.defaults.keys())
            .cloned()
            .collect();
        names.extend(SYSTEM_KEYS.iter().map(|k| k.to_string()));
        if self.po_filters {
            names.insert("p".to_string());
            names.insert("o".to_string());
        }
        names.into_iter().collect()
    }

    pub fn required_names(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub(super) fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    pub fn allows_po_filters(&self) -> bool {
        self.po_filters
    }

    pub fn cache() -> Self {
        Self::new().default_value("purge", "0")
    }

    pub fn paging() -> Self {
        Self::new()
            .default_value("page", "1")
            .default_value("do_item_count", "0")
    }

    pub fn list() -> Self {
        Self::paging()
            .default_value("sort_by", "")
            .default_value("sort_order", "ASC")
            .default_value("sort_include_empty", "1")
    }

    pub fn graph() -> Self {
        Self::new().optional(&["graph_uri"])
    }

    pub fn class() -> Self {
        Self::graph().optional(&["class_prefix", "class_uri"])
    }

    pub fn instance() -> Self {
        Self::class()
            .optional(&["instance_prefix", "instance_uri"])
            .default_value("expand_object_properties", "0")
    }
}

/// Closed set of endpoint shapes served by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Root,
    SchemaList,
    Context,
    ClassSchema,
    Collection,
    CollectionCreate,
    Instance,
    Search,
    Suggest,
    Prefixes,
}

impl EndpointKind {
    pub fn spec(self) -> ParameterSpec {
        match self {
            EndpointKind::Root => ParameterSpec::paging().merge(ParameterSpec::cache()),
            EndpointKind::SchemaList => ParameterSpec::class().merge(ParameterSpec::cache()),
            EndpointKind::Context => ParameterSpec::list().merge(ParameterSpec::graph()),
            EndpointKind::ClassSchema => ParameterSpec::class().merge(ParameterSpec::cache()),
            EndpointKind::Collection => ParameterSpec::list()
                .merge(ParameterSpec::class())
                .default_value("direct_instances_only", "0")
                .with_po_filters(),
            EndpointKind::CollectionCreate => ParameterSpec::class(),
            EndpointKind::Instance => ParameterSpec::instance(),
            EndpointKind::Search => ParameterSpec::paging()
                .merge(ParameterSpec::class())
                .required(&["pattern"]),
            EndpointKind::Suggest => ParameterSpec::paging(),
            EndpointKind::Prefixes => ParameterSpec::list(),
        }
    }
}
