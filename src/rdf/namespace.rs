//! RDF namespace and prefix management
//!
//! This module handles namespace prefixes for compact IRI notation. The
//! [`PrefixRegistry`] is built once at startup and shared read-only; the
//! [`MemorizeContext`] is created per request and records which slugs were
//! used so the response can carry a JSON-LD `@context` holding exactly those.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Prefix errors
#[derive(Error, Debug)]
pub enum PrefixError {
    /// Slug already bound to a different IRI
    #[error("Prefix {slug} is already bound to {existing}")]
    Conflict { slug: String, existing: String },

    /// Invalid IRI
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Namespace (prefix → IRI mapping)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Prefix
    pub prefix: String,
    /// IRI
    pub iri: String,
}

impl Namespace {
    /// Create a new namespace
    pub fn new(prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            iri: iri.into(),
        }
    }
}

/// Bidirectional slug ↔ namespace table.
///
/// Shortening always picks the longest registered namespace that is a
/// literal prefix of the URI, so overlapping namespaces such as
/// `http://a/` and `http://a/b/` resolve the same way on every call.
#[derive(Debug, Clone)]
pub struct PrefixRegistry {
    /// Slug → IRI mappings
    slugs: BTreeMap<String, String>,
    /// IRI → slug; when two slugs share an IRI the alphabetically first wins
    iris: HashMap<String, String>,
    /// IRIs ordered by length, longest first
    by_length: Vec<String>,
}

impl PrefixRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            slugs: BTreeMap::new(),
            iris: HashMap::new(),
            by_length: Vec::new(),
        }
    }

    /// Create a registry with the common vocabularies plus `base` bound to
    /// the gateway's own namespace root
    pub fn with_base(uri_prefix: &str) -> Self {
        let mut registry = Self::default();
        registry.add_prefix("base", uri_prefix);
        registry
    }

    /// Add a prefix, replacing any previous binding of the same slug
    pub fn add_prefix(&mut self, slug: impl Into<String>, iri: impl Into<String>) {
        self.slugs.insert(slug.into(), iri.into());
        self.reindex();
    }

    /// Add a prefix, failing when the slug is bound to another IRI
    pub fn try_add_prefix(&mut self, slug: &str, iri: &str) -> PrefixResult<()> {
        if oxiri::Iri::parse(iri).is_err() {
            return Err(PrefixError::InvalidIri(iri.to_string()));
        }
        match self.slugs.get(slug) {
            Some(existing) if existing != iri => Err(PrefixError::Conflict {
                slug: slug.to_string(),
                existing: existing.clone(),
            }),
            _ => {
                self.add_prefix(slug, iri);
                Ok(())
            }
        }
    }

    fn reindex(&mut self) {
        self.iris.clear();
        // BTreeMap iteration is sorted, so the first slug seen for an IRI is
        // the alphabetically smallest one.
        for (slug, iri) in &self.slugs {
            self.iris.entry(iri.clone()).or_insert_with(|| slug.clone());
        }
        self.by_length = self.iris.keys().cloned().collect();
        self.by_length
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    }

    /// Longest registered namespace that `uri` starts with
    pub fn extract_prefix<'a>(&'a self, uri: &str) -> Option<&'a str> {
        self.by_length
            .iter()
            .find(|iri| uri.starts_with(iri.as_str()))
            .map(|s| s.as_str())
    }

    /// Compact an IRI to `slug:local`; unknown namespaces pass through.
    ///
    /// A local part starting with `//` stays in full form, since `slug://...`
    /// would read back as a full IRI in [`expand_uri`](Self::expand_uri).
    pub fn shorten(&self, uri: &str) -> String {
        match self.extract_prefix(uri) {
            Some(iri) if !uri[iri.len()..].starts_with("//") => {
                let slug = &self.iris[iri];
                format!("{}:{}", slug, &uri[iri.len()..])
            }
            _ => uri.to_string(),
        }
    }

    /// Slug for a full namespace IRI, or the input unchanged
    pub fn prefix_to_slug(&self, prefix: &str) -> String {
        self.iris
            .get(prefix)
            .cloned()
            .unwrap_or_else(|| prefix.to_string())
    }

    /// Namespace IRI for a slug, or the input unchanged
    pub fn expand(&self, slug_or_prefix: &str) -> String {
        self.slugs
            .get(slug_or_prefix)
            .cloned()
            .unwrap_or_else(|| slug_or_prefix.to_string())
    }

    /// Slug of the namespace `uri` belongs to, or the input unchanged
    pub fn uri_to_slug(&self, uri: &str) -> String {
        match self.extract_prefix(uri) {
            Some(iri) => self.iris[iri].clone(),
            None => uri.to_string(),
        }
    }

    /// Whether the slug is registered
    pub fn has_slug(&self, slug: &str) -> bool {
        self.slugs.contains_key(slug)
    }

    /// Expand a compact IRI (`slug:local`) to a full IRI.
    ///
    /// Anything that is not a compact IRI with a registered slug, including
    /// full IRIs such as `http://...`, is returned unchanged.
    pub fn expand_uri(&self, short_uri: &str) -> String {
        if let Some((slug, local)) = short_uri.split_once(':') {
            if local.starts_with("//") {
                return short_uri.to_string();
            }
            if let Some(iri) = self.slugs.get(slug) {
                return format!("{}{}", iri, local);
            }
        }
        short_uri.to_string()
    }

    /// Expand every compact IRI found in keys and string values of a JSON tree
    pub fn expand_all_uris_recursively(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.expand_uri(s)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.expand_all_uris_recursively(v))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut expanded = Map::new();
                for (k, v) in map {
                    expanded.insert(self.expand_uri(k), self.expand_all_uris_recursively(v));
                }
                Value::Object(expanded)
            }
            other => other.clone(),
        }
    }

    /// Get all registered prefixes, sorted by slug
    pub fn prefixes(&self) -> Vec<Namespace> {
        self.slugs
            .iter()
            .map(|(prefix, iri)| Namespace::new(prefix.clone(), iri.clone()))
            .collect()
    }
}

impl Default for PrefixRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.add_prefix("rdf", RDF);
        registry.add_prefix("rdfs", RDFS);
        registry.add_prefix("owl", OWL);
        registry.add_prefix("xsd", XSD);
        registry.add_prefix("dc", "http://purl.org/dc/elements/1.1/");
        registry.add_prefix("dct", "http://purl.org/dc/terms/");
        registry.add_prefix("foaf", "http://xmlns.com/foaf/0.1/");
        registry.add_prefix("geo", "http://www.w3.org/2003/01/geo/wgs84_pos#");
        registry.add_prefix("schema", "http://schema.org/");
        registry.add_prefix("dbpedia", "http://dbpedia.org/ontology/");
        registry.add_prefix("time", "http://www.w3.org/2006/time#");
        registry.add_prefix("event", "http://purl.org/NET/c4dm/event.owl#");
        registry.add_prefix("skos", "http://www.w3.org/2004/02/skos/core#");

        registry
    }
}

/// Per-request shortening log.
///
/// Wraps [`PrefixRegistry::shorten`] and [`PrefixRegistry::prefix_to_slug`],
/// remembering every substitution so the caller can emit a JSON-LD
/// `@context` with exactly the prefixes used in one response.
#[derive(Debug)]
pub struct MemorizeContext<'a> {
    registry: &'a PrefixRegistry,
    context: BTreeMap<String, String>,
    object_properties: BTreeMap<String, String>,
}

impl<'a> MemorizeContext<'a> {
    pub fn new(registry: &'a PrefixRegistry) -> Self {
        Self {
            registry,
            context: BTreeMap::new(),
            object_properties: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &'a PrefixRegistry {
        self.registry
    }

    /// Shorten a URI, recording the slug when a namespace matched
    pub fn shorten(&mut self, uri: &str) -> String {
        let short = self.registry.shorten(uri);
        if short != uri {
            if let Some(iri) = self.registry.extract_prefix(uri) {
                self.context
                    .insert(self.registry.prefix_to_slug(iri), iri.to_string());
            }
        }
        short
    }

    /// Map a namespace IRI to its slug, recording it when known
    pub fn prefix_to_slug(&mut self, prefix: &str) -> String {
        let slug = self.registry.prefix_to_slug(prefix);
        if slug != prefix {
            self.context.insert(slug.clone(), prefix.to_string());
        }
        slug
    }

    /// Record that `predicate` is an object property pointing at `range`
    pub fn add_object_property(&mut self, predicate: &str, range: &str) {
        let predicate = self.shorten(predicate);
        let range = self.shorten(range);
        self.object_properties.insert(predicate, range);
    }

    pub fn object_properties(&self) -> &BTreeMap<String, String> {
        &self.object_properties
    }

    pub fn used_prefixes(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// JSON-LD `@context` block for the prefixes used so far
    pub fn context(&self) -> Map<String, Value> {
        self.context
            .iter()
            .map(|(slug, iri)| (slug.clone(), Value::String(iri.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_registry() -> PrefixRegistry {
        let mut registry = PrefixRegistry::default();
        registry.add_prefix("test", "http://test/person/");
        registry
    }

    #[test]
    fn test_common_prefixes() {
        let registry = PrefixRegistry::default();

        assert_eq!(registry.expand("rdf"), RDF);
        assert_eq!(registry.expand("rdfs"), RDFS);
        assert_eq!(registry.expand("xsd"), XSD);
        assert_eq!(registry.expand("unknown"), "unknown");
    }

    #[test]
    fn test_shorten() {
        let registry = PrefixRegistry::default();

        assert_eq!(registry.shorten("http://xmlns.com/foaf/0.1/name"), "foaf:name");
        assert_eq!(
            registry.shorten("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
            "rdf:type"
        );
        assert_eq!(
            registry.shorten("http://unknown.org/thing"),
            "http://unknown.org/thing"
        );
    }

    #[test]
    fn test_shorten_expand_roundtrip() {
        let registry = test_registry();
        for uri in [
            "http://test/person/Gender",
            "http://www.w3.org/2001/XMLSchema#dateTime",
            "http://schema.org/Person",
        ] {
            assert_eq!(registry.expand_uri(&registry.shorten(uri)), uri);
        }
    }

    #[test]
    fn test_roundtrip_with_double_slash_local_part() {
        let mut registry = PrefixRegistry::empty();
        registry.add_prefix("a", "http://a/");

        assert_eq!(registry.shorten("http://a///x"), "http://a///x");
        assert_eq!(registry.expand_uri(&registry.shorten("http://a///x")), "http://a///x");
        assert_eq!(registry.shorten("http://a/x//y"), "a:x//y");
        assert_eq!(registry.expand_uri("a:x//y"), "http://a/x//y");

        let mut ctx = MemorizeContext::new(&registry);
        assert_eq!(ctx.shorten("http://a///x"), "http://a///x");
        assert!(ctx.context().is_empty());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut registry = PrefixRegistry::empty();
        registry.add_prefix("a", "http://a/");
        registry.add_prefix("ab", "http://a/b/");

        assert_eq!(registry.shorten("http://a/b/C"), "ab:C");
        assert_eq!(registry.shorten("http://a/C"), "a:C");
    }

    #[test]
    fn test_expand_uri_ignores_full_iris() {
        let mut registry = PrefixRegistry::default();
        registry.add_prefix("http", "http://never/");

        assert_eq!(registry.expand_uri("http://x.org/a"), "http://x.org/a");
        assert_eq!(registry.expand_uri("nope:thing"), "nope:thing");
        assert_eq!(registry.expand_uri("plain"), "plain");
    }

    #[test]
    fn test_try_add_prefix_conflict() {
        let mut registry = PrefixRegistry::default();
        assert!(registry.try_add_prefix("ex", "http://example.org/").is_ok());
        assert!(registry.try_add_prefix("ex", "http://example.org/").is_ok());
        assert!(matches!(
            registry.try_add_prefix("ex", "http://other.org/"),
            Err(PrefixError::Conflict { .. })
        ));
        assert!(matches!(
            registry.try_add_prefix("bad", "not an iri"),
            Err(PrefixError::InvalidIri(_))
        ));
    }

    #[test]
    fn test_expand_all_uris_recursively() {
        let registry = test_registry();
        let data = json!({
            "test:name": "Maria",
            "test:gender": ["test:Female"],
            "nested": {"rdfs:label": "x"},
            "count": 3
        });

        let expanded = registry.expand_all_uris_recursively(&data);
        assert_eq!(
            expanded,
            json!({
                "http://test/person/name": "Maria",
                "http://test/person/gender": ["http://test/person/Female"],
                "nested": {"http://www.w3.org/2000/01/rdf-schema#label": "x"},
                "count": 3
            })
        );
    }

    #[test]
    fn test_memorize_context_records_used_slugs() {
        let registry = test_registry();
        let mut ctx = MemorizeContext::new(&registry);

        assert_eq!(ctx.shorten("http://test/person/gender"), "test:gender");
        assert_eq!(ctx.shorten("http://nowhere/x"), "http://nowhere/x");
        assert_eq!(ctx.prefix_to_slug(XSD), "xsd");
        assert_eq!(ctx.prefix_to_slug("http://test/person"), "http://test/person");

        let used = ctx.used_prefixes();
        assert_eq!(used.len(), 2);
        assert_eq!(used["test"], "http://test/person/");
        assert_eq!(used["xsd"], XSD);
    }

    #[test]
    fn test_object_properties_are_shortened() {
        let registry = test_registry();
        let mut ctx = MemorizeContext::new(&registry);

        ctx.add_object_property("http://test/person/gender", "http://test/person/Gender");
        assert_eq!(ctx.object_properties()["test:gender"], "test:Gender");
        assert_eq!(ctx.context()["test"], json!("http://test/person/"));
    }
}
