//! Request parameter contract
//!
//! Every endpoint declares a [`ParameterSpec`] (optional names, required
//! names, defaults). Incoming query-string pairs are checked against it once,
//! producing an immutable [`ParamDict`] with the derived values the resources
//! need (graph/class/instance URIs, pagination offset, language).

mod spec;

pub use spec::{EndpointKind, ParameterSpec, SYSTEM_KEYS};

use crate::rdf::{is_valid_iri, PrefixRegistry};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameter contract errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// Key not declared by the endpoint
    #[error("Argument {key} is not supported. The supported querystring arguments are: {}.", .supported.join(", "))]
    InvalidParam { key: String, supported: Vec<String> },

    /// Required key absent after defaults were applied
    #[error("Required parameter ({0}) was not given.")]
    RequiredParamMissing(String),

    /// Declared key carrying an unusable value
    #[error("Argument {key} has an invalid value ({value}): {reason}")]
    InvalidParamValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ParamResult<T> = Result<T, ParamError>;

/// Values taken from the request path
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    pub context_name: Option<String>,
    pub class_name: Option<String>,
    pub instance_id: Option<String>,
}

impl PathParams {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn context(context_name: &str) -> Self {
        Self {
            context_name: Some(context_name.to_string()),
            ..Self::default()
        }
    }

    pub fn class(context_name: &str, class_name: &str) -> Self {
        Self {
            context_name: Some(context_name.to_string()),
            class_name: Some(class_name.to_string()),
            instance_id: None,
        }
    }

    pub fn instance(context_name: &str, class_name: &str, instance_id: &str) -> Self {
        Self {
            context_name: Some(context_name.to_string()),
            class_name: Some(class_name.to_string()),
            instance_id: Some(instance_id.to_string()),
        }
    }
}

/// Deployment-wide values used when deriving parameters
#[derive(Debug, Clone)]
pub struct ParamDefaults {
    /// Namespace root for graphs built from a context name
    pub uri_prefix: String,
    /// Language used when the request has no `lang`
    pub default_lang: String,
    /// Page size used when the request has no `per_page`
    pub default_per_page: u64,
}

impl Default for ParamDefaults {
    fn default() -> Self {
        Self {
            uri_prefix: "http://semgate.example/".to_string(),
            default_lang: "en".to_string(),
            default_per_page: 10,
        }
    }
}

/// One predicate/object filter of a collection listing (`p`, `o`, `p1`, `o1`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoFilter {
    /// Suffix shared by the pair, empty for the bare `p`/`o`
    pub index: String,
    pub predicate: String,
    pub object: String,
}

impl PoFilter {
    fn sort_key(&self) -> u64 {
        self.index.parse().unwrap_or(0)
    }
}

/// Whether `key` names a predicate/object filter
pub fn is_po_filter_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some('p') | Some('o')) && chars.all(|c| c.is_ascii_digit())
}

/// Whether a filter term is a SPARQL variable rather than a bound value
pub fn is_variable(term: &str) -> bool {
    term.starts_with('?')
}

/// Validated request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDict {
    values: BTreeMap<String, String>,
    pub context_name: Option<String>,
    pub class_name: Option<String>,
    pub instance_id: Option<String>,
    pub graph_uri: Option<String>,
    pub class_prefix: Option<String>,
    pub class_uri: Option<String>,
    pub instance_prefix: Option<String>,
    pub instance_uri: Option<String>,
    /// `None` disables language filtering
    pub lang: Option<String>,
    pub page: u64,
    pub per_page: u64,
    pub offset: u64,
    pub po_filters: Vec<PoFilter>,
}

impl ParamDict {
    /// Validate `raw` against `spec` and derive the computed fields.
    pub fn new(
        raw: &[(String, String)],
        spec: &ParameterSpec,
        path: &PathParams,
        defaults: &ParamDefaults,
        registry: &PrefixRegistry,
    ) -> ParamResult<Self> {
        for (key, _) in raw {
            if !spec.accepts(key) {
                return Err(ParamError::InvalidParam {
                    key: key.clone(),
                    supported: spec.supported(),
                });
            }
        }

        let mut values = spec.defaults().clone();
        for (key, value) in raw {
            values.insert(key.clone(), value.clone());
        }
        for (key, value) in [
            ("context_name", &path.context_name),
            ("class_name", &path.class_name),
            ("instance_id", &path.instance_id),
        ] {
            if let Some(value) = value {
                values.insert(key.to_string(), value.clone());
            }
        }

        for name in spec.required_names() {
            if !values.contains_key(name) {
                return Err(ParamError::RequiredParamMissing(name.clone()));
            }
        }

        let uri_param = |key: &str| -> ParamResult<Option<String>> {
            match values.get(key) {
                Some(value) if !value.is_empty() => {
                    let expanded = registry.expand_uri(&registry.expand(value));
                    if !is_valid_iri(&expanded) {
                        return Err(ParamError::InvalidParamValue {
                            key: key.to_string(),
                            value: value.clone(),
                            reason: "expected an absolute URI or a known prefix".to_string(),
                        });
                    }
                    Ok(Some(expanded))
                }
                _ => Ok(None),
            }
        };

        let graph_uri = match uri_param("graph_uri")? {
            Some(uri) => Some(uri),
            None => path.context_name.as_ref().map(|name| {
                if registry.has_slug(name) {
                    registry.expand(name)
                } else {
                    format!("{}{}/", defaults.uri_prefix, name)
                }
            }),
        };

        let class_prefix = uri_param("class_prefix")?.or_else(|| graph_uri.clone());
        let class_uri = match uri_param("class_uri")? {
            Some(uri) => Some(uri),
            None => match (&class_prefix, &path.class_name) {
                (Some(prefix), Some(name)) => Some(format!("{}{}", prefix, name)),
                _ => None,
            },
        };

        let instance_prefix = uri_param("instance_prefix")?
            .or_else(|| class_uri.as_ref().map(|uri| format!("{}/", uri)));
        let instance_uri = match uri_param("instance_uri")? {
            Some(uri) => Some(uri),
            None => match (&instance_prefix, &path.instance_id) {
                (Some(prefix), Some(id)) => Some(format!("{}{}", prefix, id)),
                _ => None,
            },
        };

        let lang = match values.get("lang").map(|s| s.as_str()) {
            None => Some(defaults.default_lang.clone()),
            Some("") | Some("undefined") => None,
            Some(lang) if is_language_tag(lang) => Some(lang.to_string()),
            Some(lang) => {
                return Err(ParamError::InvalidParamValue {
                    key: "lang".to_string(),
                    value: lang.to_string(),
                    reason: "expected a language tag such as en or pt-BR".to_string(),
                })
            }
        };

        let page = positive_number(&values, "page", 1)?;
        let per_page = positive_number(&values, "per_page", defaults.default_per_page)?;
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| ParamError::InvalidParamValue {
            key: "page".to_string(),
            value: page.to_string(),
            reason: format!("page {} with per_page {} is out of range", page, per_page),
        })?;

        let po_filters = if spec.allows_po_filters() {
            collect_po_filters(&values, registry)
        } else {
            Vec::new()
        };

        Ok(Self {
            context_name: path.context_name.clone(),
            class_name: path.class_name.clone(),
            instance_id: path.instance_id.clone(),
            values,
            graph_uri,
            class_prefix,
            class_uri,
            instance_prefix,
            instance_uri,
            lang,
            page,
            per_page,
            offset,
            po_filters,
        })
    }

    /// Raw validated value (after defaults)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Whether a `0`/`1` switch is on
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }

    /// Language label used in messages, empty when unfiltered
    pub fn lang_label(&self) -> &str {
        self.lang.as_deref().unwrap_or("")
    }

    /// Point the parameters at a concrete instance (after a create/upsert)
    pub fn with_instance(mut self, instance_uri: &str, instance_id: &str) -> Self {
        self.instance_uri = Some(instance_uri.to_string());
        self.instance_id = Some(instance_id.to_string());
        self.values
            .insert("instance_id".to_string(), instance_id.to_string());
        self
    }

    /// Force a `0`/`1` switch
    pub fn set_flag(&mut self, key: &str, on: bool) {
        self.values
            .insert(key.to_string(), if on { "1" } else { "0" }.to_string());
    }

    /// SPARQL `FILTER` restricting `?var` to the requested language
    pub fn lang_filter(&self, var: &str) -> String {
        crate::sparql::lang_filter(var, self.lang.as_deref())
    }
}

/// BCP 47 shaped tag: alphabetic primary subtag, alphanumeric subtags
fn is_language_tag(tag: &str) -> bool {
    tag.split('-').enumerate().all(|(i, part)| {
        (1..=8).contains(&part.len())
            && part
                .chars()
                .all(|c| if i == 0 { c.is_ascii_alphabetic() } else { c.is_ascii_alphanumeric() })
    })
}

fn positive_number(values: &BTreeMap<String, String>, key: &str, default: u64) -> ParamResult<u64> {
    match values.get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ParamError::InvalidParamValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: "expected a positive integer".to_string(),
            }),
        },
    }
}

fn collect_po_filters(values: &BTreeMap<String, String>, registry: &PrefixRegistry) -> Vec<PoFilter> {
    let mut indexes: Vec<String> = values
        .keys()
        .filter(|k| is_po_filter_key(k))
        .map(|k| k[1..].to_string())
        .collect();
    indexes.sort();
    indexes.dedup();

    let mut filters: Vec<PoFilter> = indexes
        .into_iter()
        .map(|index| {
            let term = |kind: &str, fallback: &str| match values.get(&format!("{}{}", kind, index)) {
                Some(value) if is_variable(value) => value.clone(),
                Some(value) => registry.expand_uri(value),
                None => format!("?{}{}", fallback, index),
            };
            PoFilter {
                predicate: term("p", "predicate"),
                object: term("o", "object"),
                index,
            }
        })
        .collect();
    filters.sort_by_key(|f| f.sort_key());
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(raw: &[(&str, &str)], spec: &ParameterSpec, path: &PathParams) -> ParamResult<ParamDict> {
        ParamDict::new(
            &pairs(raw),
            spec,
            path,
            &ParamDefaults::default(),
            &PrefixRegistry::default(),
        )
    }

    #[test]
    fn test_unknown_key_fails() {
        let spec = ParameterSpec::new().optional(&["sort_by"]);
        let err = build(&[("bogus", "1")], &spec, &PathParams::root()).unwrap_err();
        match err {
            ParamError::InvalidParam { key, supported } => {
                assert_eq!(key, "bogus");
                assert!(supported.contains(&"sort_by".to_string()));
                assert!(supported.contains(&"lang".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_param_message_lists_supported_keys() {
        let spec = ParameterSpec::new().default_value("purge", "0");
        let err = build(&[("x", "1")], &spec, &PathParams::root()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Argument x is not supported."));
        assert!(msg.contains("purge"));
        assert!(msg.ends_with('.'));
    }

    #[test]
    fn test_missing_required_fails() {
        let spec = ParameterSpec::new().required(&["pattern"]);
        let err = build(&[], &spec, &PathParams::root()).unwrap_err();
        assert_eq!(err, ParamError::RequiredParamMissing("pattern".to_string()));
        assert_eq!(err.to_string(), "Required parameter (pattern) was not given.");
    }

    #[test]
    fn test_declared_keys_succeed() {
        let spec = ParameterSpec::new()
            .required(&["pattern"])
            .optional(&["sort_by"])
            .default_value("purge", "0");
        let params = build(
            &[("pattern", "bra"), ("sort_by", "rdfs:label"), ("purge", "1")],
            &spec,
            &PathParams::root(),
        )
        .unwrap();
        assert_eq!(params.get("pattern"), Some("bra"));
        assert!(params.flag("purge"));
    }

    #[test]
    fn test_defaults_are_merged() {
        let params = build(&[], &ParameterSpec::cache(), &PathParams::root()).unwrap();
        assert_eq!(params.get("purge"), Some("0"));
        assert!(!params.flag("purge"));
    }

    #[test]
    fn test_derived_uris_from_path() {
        let params = build(
            &[],
            &EndpointKind::Instance.spec(),
            &PathParams::instance("place", "City", "rio"),
        )
        .unwrap();
        assert_eq!(params.graph_uri.as_deref(), Some("http://semgate.example/place/"));
        assert_eq!(params.class_uri.as_deref(), Some("http://semgate.example/place/City"));
        assert_eq!(
            params.instance_uri.as_deref(),
            Some("http://semgate.example/place/City/rio")
        );
    }

    #[test]
    fn test_context_slug_resolves_graph() {
        let params = build(&[], &ParameterSpec::class(), &PathParams::class("dbpedia", "Place")).unwrap();
        assert_eq!(params.graph_uri.as_deref(), Some("http://dbpedia.org/ontology/"));
        assert_eq!(params.class_uri.as_deref(), Some("http://dbpedia.org/ontology/Place"));
    }

    #[test]
    fn test_explicit_uris_are_expanded() {
        let params = build(
            &[("class_uri", "schema:Person"), ("graph_uri", "http://g/")],
            &ParameterSpec::class(),
            &PathParams::class("ctx", "Person"),
        )
        .unwrap();
        assert_eq!(params.class_uri.as_deref(), Some("http://schema.org/Person"));
        assert_eq!(params.graph_uri.as_deref(), Some("http://g/"));
    }

    #[test]
    fn test_invalid_uri_value() {
        let err = build(
            &[("graph_uri", "not a uri")],
            &ParameterSpec::graph(),
            &PathParams::context("ctx"),
        )
        .unwrap_err();
        assert!(matches!(err, ParamError::InvalidParamValue { ref key, .. } if key == "graph_uri"));
    }

    #[test]
    fn test_offset_arithmetic() {
        let params = build(
            &[("page", "3"), ("per_page", "20")],
            &ParameterSpec::paging(),
            &PathParams::root(),
        )
        .unwrap();
        assert_eq!(params.offset, 40);

        let params = build(&[], &ParameterSpec::paging(), &PathParams::root()).unwrap();
        assert_eq!((params.page, params.per_page, params.offset), (1, 10, 0));
    }

    #[test]
    fn test_page_must_be_positive() {
        for bad in ["0", "-1", "abc"] {
            let err = build(&[("page", bad)], &ParameterSpec::paging(), &PathParams::root()).unwrap_err();
            assert!(matches!(err, ParamError::InvalidParamValue { .. }));
        }
    }

    #[test]
    fn test_page_overflow_is_rejected() {
        let huge = u64::MAX.to_string();
        let err = build(
            &[("page", huge.as_str()), ("per_page", "2")],
            &EndpointKind::Root.spec(),
            &PathParams::root(),
        )
        .unwrap_err();
        assert!(matches!(err, ParamError::InvalidParamValue { ref key, .. } if key == "page"));

        let params = build(
            &[("page", huge.as_str()), ("per_page", "1")],
            &EndpointKind::Root.spec(),
            &PathParams::root(),
        )
        .unwrap();
        assert_eq!(params.offset, u64::MAX - 1);
    }

    #[test]
    fn test_lang_normalization() {
        let spec = ParameterSpec::new();
        let params = build(&[], &spec, &PathParams::root()).unwrap();
        assert_eq!(params.lang.as_deref(), Some("en"));
        assert!(params.lang_filter("label").contains("langMatches(lang(?label), \"en\")"));

        let params = build(&[("lang", "undefined")], &spec, &PathParams::root()).unwrap();
        assert_eq!(params.lang, None);
        assert_eq!(params.lang_filter("label"), "");

        let params = build(&[("lang", "pt")], &spec, &PathParams::root()).unwrap();
        assert_eq!(params.lang_label(), "pt");
    }

    #[test]
    fn test_lang_must_be_a_tag() {
        let spec = ParameterSpec::new();
        assert!(build(&[("lang", "pt-BR")], &spec, &PathParams::root()).is_ok());
        for bad in ["en\")", "1en", "toolongsubtag"] {
            let err = build(&[("lang", bad)], &spec, &PathParams::root()).unwrap_err();
            assert!(matches!(err, ParamError::InvalidParamValue { ref key, .. } if key == "lang"));
        }
    }

    #[test]
    fn test_po_filters_only_when_allowed() {
        let err = build(&[("p", "rdfs:label")], &ParameterSpec::list(), &PathParams::root()).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParam { .. }));

        let params = build(
            &[("p1", "dbpedia:country"), ("o", "http://x/Brazil"), ("o1", "?c")],
            &EndpointKind::Collection.spec(),
            &PathParams::class("place", "City"),
        )
        .unwrap();
        assert_eq!(
            params.po_filters,
            vec![
                PoFilter {
                    index: String::new(),
                    predicate: "?predicate".to_string(),
                    object: "http://x/Brazil".to_string(),
                },
                PoFilter {
                    index: "1".to_string(),
                    predicate: "http://dbpedia.org/ontology/country".to_string(),
                    object: "?c".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_is_po_filter_key() {
        assert!(is_po_filter_key("p"));
        assert!(is_po_filter_key("o12"));
        assert!(!is_po_filter_key("page"));
        assert!(!is_po_filter_key("per_page"));
    }

    #[test]
    fn test_with_instance() {
        let params = build(&[], &ParameterSpec::class(), &PathParams::class("c", "K"))
            .unwrap()
            .with_instance("http://x/K/1", "1");
        assert_eq!(params.instance_uri.as_deref(), Some("http://x/K/1"));
        assert_eq!(params.instance_id.as_deref(), Some("1"));
    }
}
