//! SPARQL 1.1 Protocol client

use super::{GraphStore, QuerySolution, SparqlError, SparqlResult, SparqlResults};
use crate::cache::password_digest;
use crate::config::TriplestoreConfig;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use std::time::Instant;
use tracing::debug;

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Triplestore reached over HTTP
pub struct SparqlHttpClient {
    client: Client,
    endpoint: String,
    update_endpoint: String,
    user: Option<String>,
    password: Option<String>,
}

impl SparqlHttpClient {
    pub fn new(config: &TriplestoreConfig) -> SparqlResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SparqlError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            update_endpoint: config
                .update_endpoint
                .clone()
                .unwrap_or_else(|| config.endpoint.clone()),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    async fn post_form(&self, url: &str, field: &str, text: &str) -> SparqlResult<String> {
        let started = Instant::now();
        let request = self
            .client
            .post(url)
            .header(header::ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[(field, text)]);

        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SparqlError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SparqlError::Network(e.to_string()))?;
        debug!(
            "SPARQL - {} - {} [{:?}] - {}",
            url,
            status.as_u16(),
            started.elapsed(),
            text
        );

        if !status.is_success() {
            return Err(SparqlError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn query(&self, query: &str) -> SparqlResult<SparqlResults> {
        let body = self.post_form(&self.endpoint, "query", query).await?;
        serde_json::from_str(&body).map_err(|e| SparqlError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl GraphStore for SparqlHttpClient {
    async fn select(&self, query: &str) -> SparqlResult<Vec<QuerySolution>> {
        Ok(self.query(query).await?.into_solutions())
    }

    async fn ask(&self, query: &str) -> SparqlResult<bool> {
        self.query(query)
            .await?
            .boolean
            .ok_or_else(|| SparqlError::Serialization("ASK response without boolean".to_string()))
    }

    async fn update(&self, update: &str) -> SparqlResult<()> {
        self.post_form(&self.update_endpoint, "update", update)
            .await
            .map(|_| ())
    }

    async fn status(&self) -> String {
        let credentials = format!(
            "{}:{}",
            self.user.as_deref().unwrap_or(""),
            password_digest(self.password.as_deref().unwrap_or(""))
        );
        match self.ask("ASK { ?s ?p ?o }").await {
            Ok(_) => format!(
                "Triplestore connection authenticated [{}] | SUCCEED | {}",
                credentials, self.endpoint
            ),
            Err(e) => format!(
                "Triplestore connection authenticated [{}] | FAILED | {} | {}",
                credentials, self.endpoint, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Form, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/sparql", addr)
    }

    fn client_for(endpoint: String) -> SparqlHttpClient {
        SparqlHttpClient::new(&TriplestoreConfig {
            endpoint,
            ..TriplestoreConfig::default()
        })
        .unwrap()
    }

    async fn answer(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
        if let Some(query) = form.get("query") {
            if query.starts_with("ASK") {
                return Json(json!({"head": {}, "boolean": true}));
            }
            return Json(json!({
                "head": {"vars": ["s"]},
                "results": {"bindings": [{"s": {"type": "uri", "value": "http://x/a"}}]}
            }));
        }
        Json(json!({"updated": form.contains_key("update")}))
    }

    #[tokio::test]
    async fn test_select_ask_update() {
        let endpoint = serve(Router::new().route("/sparql", post(answer))).await;
        let client = client_for(endpoint);

        let rows = client.select("SELECT ?s WHERE { ?s ?p ?o }").await.unwrap();
        assert_eq!(rows[0].value("s"), Some("http://x/a"));
        assert!(client.ask("ASK { ?s ?p ?o }").await.unwrap());
        client.update("INSERT DATA { <a> <b> <c> }").await.unwrap();
        assert!(client.status().await.contains("| SUCCEED |"));
    }

    #[tokio::test]
    async fn test_endpoint_error_status() {
        let app = Router::new().route(
            "/sparql",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "SQ200: boom") }),
        );
        let client = client_for(serve(app).await);

        match client.select("SELECT * {}").await {
            Err(SparqlError::Endpoint { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "SQ200: boom");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(client.status().await.contains("| FAILED |"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}/sparql", addr));
        assert!(matches!(
            client.select("SELECT * {}").await,
            Err(SparqlError::Network(_))
        ));
    }
}
