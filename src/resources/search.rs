//! Full-text search over the instances of one class

use super::{context_name_for_graph, list_envelope, require, PREFIXES};
use crate::config::SearchConfig;
use crate::envelope::{RequestUrl, ResourceKind};
use crate::error::GatewayResult;
use crate::params::ParamDict;
use crate::rdf::{PrefixRegistry, RDFS};
use crate::search_engine::{hits, source_text, total_hits, SearchEngine};
use crate::sparql::{iri, GraphStore};
use serde_json::{json, Value};

/// Fuzziness of every `multi_match` query
pub const FUZZINESS: f64 = 0.7;

fn label_field() -> String {
    format!("{}label", RDFS)
}

/// Datatype predicates of the class (or its super classes), label first
pub async fn search_fields(store: &dyn GraphStore, class_uri: &str) -> GatewayResult<Vec<String>> {
    let query = format!(
        "{PREFIXES}SELECT DISTINCT ?field
WHERE {{
    {class} rdfs:subClassOf* ?domain_class .
    ?field rdfs:domain ?domain_class ;
        a owl:DatatypeProperty .
}}",
        class = iri(class_uri),
    );
    let rows = store.select(&query).await?;

    let mut fields = vec![label_field()];
    for field in rows.iter().filter_map(|row| row.value("field")) {
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    Ok(fields)
}

/// Search engine index holding the graph's documents
pub fn index_name(config: &SearchConfig, registry: &PrefixRegistry, params: &ParamDict) -> String {
    let context = params
        .graph_uri
        .as_deref()
        .and_then(|graph| context_name_for_graph(registry, graph))
        .or_else(|| params.context_name.clone())
        .unwrap_or_default();
    format!("{}{}", config.index_prefix, context)
}

/// `multi_match` query restricted to documents of `class_uri`
pub fn search_body(
    class_uri: &str,
    pattern: &str,
    fields: &[String],
    analyzer: &str,
    params: &ParamDict,
) -> Value {
    json!({
        "filter": {"type": {"value": class_uri}},
        "query": {
            "multi_match": {
                "fields": fields,
                "query": pattern,
                "analyzer": analyzer,
                "fuzziness": FUZZINESS,
            }
        },
        "from": params.offset,
        "size": params.per_page,
    })
}

/// One page of search results for `pattern`
pub async fn do_search(
    store: &dyn GraphStore,
    search: &dyn SearchEngine,
    registry: &PrefixRegistry,
    config: &SearchConfig,
    params: &ParamDict,
    url: &RequestUrl,
) -> GatewayResult<Value> {
    let class_uri = require(&params.class_uri, "class_uri")?;
    let pattern = params.get("pattern").unwrap_or_default();

    let fields = search_fields(store, class_uri).await?;
    let body = search_body(class_uri, pattern, &fields, &config.analyzer, params);
    let index = index_name(config, registry, params);
    let response = search.search(&body, &[index]).await?;

    let label = label_field();
    let items: Vec<Value> = hits(&response)
        .iter()
        .map(|hit| {
            json!({
                "id": hit["_id"],
                "title": source_text(hit, &label).unwrap_or_default(),
            })
        })
        .collect();

    let mut envelope = list_envelope(
        ResourceKind::Search,
        items,
        url,
        params,
        Some(total_hits(&response)),
    );
    envelope.insert("pattern".to_string(), Value::String(pattern.to_string()));
    Ok(Value::Object(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EndpointKind, ParamDefaults, PathParams};
    use crate::search_engine::SearchResult;
    use crate::sparql::{BoundTerm, QuerySolution, SparqlResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Fields;

    #[async_trait]
    impl GraphStore for Fields {
        async fn select(&self, _query: &str) -> SparqlResult<Vec<QuerySolution>> {
            Ok(vec![
                QuerySolution::new().with("field", BoundTerm::uri(label_field())),
                QuerySolution::new().with("field", BoundTerm::uri("http://schema.org/alternateName")),
            ])
        }
        async fn ask(&self, _query: &str) -> SparqlResult<bool> {
            Ok(false)
        }
        async fn update(&self, _update: &str) -> SparqlResult<()> {
            Ok(())
        }
        async fn status(&self) -> String {
            String::new()
        }
    }

    #[derive(Default)]
    struct Engine {
        requests: Mutex<Vec<(Value, Vec<String>)>>,
    }

    #[async_trait]
    impl SearchEngine for Engine {
        async fn search(&self, body: &Value, indexes: &[String]) -> SearchResult<Value> {
            self.requests
                .lock()
                .unwrap()
                .push((body.clone(), indexes.to_vec()));
            Ok(json!({
                "hits": {
                    "total": 12,
                    "hits": [
                        {"_id": "http://semgate.example/place/City/rio",
                         "_source": {"http://www.w3.org/2000/01/rdf-schema#label": "Rio"}}
                    ]
                }
            }))
        }
    }

    fn params() -> ParamDict {
        let raw = vec![("pattern".to_string(), "rio".to_string())];
        ParamDict::new(
            &raw,
            &EndpointKind::Search.spec(),
            &PathParams::class("place", "City"),
            &ParamDefaults::default(),
            &PrefixRegistry::with_base("http://semgate.example/"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_fields_label_first() {
        let fields = search_fields(&Fields, "http://semgate.example/place/City").await.unwrap();
        assert_eq!(fields, vec![label_field(), "http://schema.org/alternateName".to_string()]);
    }

    #[tokio::test]
    async fn test_do_search() {
        let engine = Engine::default();
        let registry = PrefixRegistry::with_base("http://semgate.example/");
        let url = RequestUrl::new("http", "h", "/place/City/_search", Some("pattern=rio"));

        let body = do_search(&Fields, &engine, &registry, &SearchConfig::default(), &params(), &url)
            .await
            .unwrap();
        assert_eq!(body["pattern"], "rio");
        assert_eq!(body["item_count"], 12);
        assert_eq!(
            body["items"],
            json!([{"id": "http://semgate.example/place/City/rio", "title": "Rio"}])
        );

        let requests = engine.requests.lock().unwrap();
        let (query, indexes) = &requests[0];
        assert_eq!(indexes, &vec!["semantica.place".to_string()]);
        assert_eq!(query["filter"]["type"]["value"], "http://semgate.example/place/City");
        assert_eq!(query["query"]["multi_match"]["fuzziness"], 0.7);
        assert_eq!(query["query"]["multi_match"]["query"], "rio");
        assert_eq!(query["size"], 10);
    }
}
