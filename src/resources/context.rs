//! Context resource: the classes declared in one named graph

use super::{count, list_envelope, require, split_resource_id, PREFIXES};
use crate::envelope::{RequestUrl, ResourceKind};
use crate::error::GatewayResult;
use crate::params::ParamDict;
use crate::sparql::{iri, GraphStore};
use serde_json::{json, Value};

fn where_clause(graph_uri: &str, params: &ParamDict) -> String {
    format!(
        "FROM {graph}
WHERE {{
    ?class a owl:Class ;
        rdfs:label ?label .
    {lang_filter}
}}",
        graph = iri(graph_uri),
        lang_filter = params.lang_filter("label"),
    )
}

/// One page of the context's classes; `None` when the graph declares none
pub async fn list_classes(
    store: &dyn GraphStore,
    params: &ParamDict,
    url: &RequestUrl,
) -> GatewayResult<Option<Value>> {
    let graph_uri = require(&params.graph_uri, "graph_uri")?;
    let query = format!(
        "{PREFIXES}SELECT DISTINCT ?class ?label
{body}
ORDER BY ?label
LIMIT {limit}
OFFSET {offset}",
        body = where_clause(graph_uri, params),
        limit = params.per_page,
        offset = params.offset,
    );

    let rows = store.select(&query).await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let items: Vec<Value> = rows
        .iter()
        .filter_map(|row| Some((row.value("class")?, row.value("label")?)))
        .map(|(class, label)| {
            let (class_prefix, resource_id) = split_resource_id(class);
            json!({
                "@id": class,
                "title": label,
                "resource_id": resource_id,
                "class_prefix": class_prefix,
            })
        })
        .collect();

    let item_count = if params.flag("do_item_count") {
        let count_query = format!(
            "{PREFIXES}SELECT (COUNT(DISTINCT ?class) AS ?total)\n{}",
            where_clause(graph_uri, params)
        );
        Some(count(store, &count_query).await?)
    } else {
        None
    };

    let mut body = list_envelope(ResourceKind::Context, items, url, params, item_count);
    body.insert("@id".to_string(), Value::String(graph_uri.to_string()));
    body.insert(
        "resource_id".to_string(),
        Value::String(params.context_name.clone().unwrap_or_default()),
    );
    Ok(Some(Value::Object(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EndpointKind, ParamDefaults, PathParams};
    use crate::rdf::PrefixRegistry;
    use crate::sparql::{BoundTerm, QuerySolution, SparqlResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Classes {
        rows: Vec<QuerySolution>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GraphStore for Classes {
        async fn select(&self, query: &str) -> SparqlResult<Vec<QuerySolution>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.rows.clone())
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

    fn params() -> ParamDict {
        ParamDict::new(
            &[],
            &EndpointKind::Context.spec(),
            &PathParams::context("place"),
            &ParamDefaults::default(),
            &PrefixRegistry::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_classes() {
        let store = Classes {
            rows: vec![QuerySolution::new()
                .with("class", BoundTerm::uri("http://semgate.example/place/City"))
                .with("label", BoundTerm::literal("City").with_lang("en"))],
            ..Classes::default()
        };
        let url = RequestUrl::new("http", "h", "/place", None);

        let body = list_classes(&store, &params(), &url).await.unwrap().unwrap();
        assert_eq!(body["@id"], "http://semgate.example/place/");
        assert_eq!(body["resource_id"], "place");
        assert_eq!(body["items"][0]["resource_id"], "City");
        assert_eq!(body["items"][0]["class_prefix"], "http://semgate.example/place/");
        assert!(body.get("item_count").is_none());

        let queries = store.queries.lock().unwrap();
        assert!(queries[0].contains("FROM <http://semgate.example/place/>"));
        assert!(queries[0].contains("langMatches(lang(?label), \"en\")"));
    }

    #[tokio::test]
    async fn test_empty_context_is_none() {
        let url = RequestUrl::new("http", "h", "/place", None);
        let body = list_classes(&Classes::default(), &params(), &url).await.unwrap();
        assert!(body.is_none());
    }
}
