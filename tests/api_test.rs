use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use semgate::events::NotificationFailure;
use semgate::params::ParamDefaults;
use semgate::search_engine::SearchResult;
use semgate::sparql::{BoundTerm, QuerySolution, SparqlResult};
use semgate::{
    build_router, AppState, GatewayApp, Cache, EventBus, GraphStore, MemoryBackend, Notification,
    PrefixRegistry, SearchEngine,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const BASE: &str = "http://semgate.example/";
const CITY: &str = "http://semgate.example/place/City";
const COUNTRY: &str = "http://semgate.example/place/Country";
const HAS_COUNTRY: &str = "http://semgate.example/place/country";
const BRAZIL: &str = "http://semgate.example/place/Country/brazil";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// Triplestore knowing the `place:City` class and keeping inserted triples
#[derive(Default)]
struct Triplestore {
    triples: Mutex<Vec<(String, String, BoundTerm)>>,
    updates: Mutex<Vec<String>>,
}

fn unbracket(term: &str) -> &str {
    term.trim_start_matches('<').trim_end_matches('>')
}

fn parse_triple(line: &str) -> Option<(String, String, BoundTerm)> {
    let line = line.trim().strip_suffix(" .")?;
    let (subject, rest) = line.split_once(' ')?;
    let (predicate, object) = rest.split_once(' ')?;
    let predicate = if predicate == "a" {
        RDF_TYPE
    } else {
        unbracket(predicate)
    };
    let object = if object.starts_with('"') {
        let end = object.rfind('"')?;
        BoundTerm::literal(&object[1..end])
    } else {
        BoundTerm::uri(unbracket(object))
    };
    Some((unbracket(subject).to_string(), predicate.to_string(), object))
}

impl Triplestore {
    fn class_rows() -> Vec<QuerySolution> {
        vec![QuerySolution::new()
            .with("title", BoundTerm::literal("City"))
            .with("comment", BoundTerm::literal("A large town"))]
    }

    fn predicate_rows() -> Vec<QuerySolution> {
        vec![
            QuerySolution::new()
                .with("predicate", BoundTerm::uri(RDFS_LABEL))
                .with("predicate_graph", BoundTerm::uri(BASE))
                .with("type", BoundTerm::uri("http://www.w3.org/2002/07/owl#DatatypeProperty"))
                .with("range", BoundTerm::uri("http://www.w3.org/2001/XMLSchema#string"))
                .with("title", BoundTerm::literal("Name")),
            QuerySolution::new()
                .with("predicate", BoundTerm::uri(HAS_COUNTRY))
                .with("predicate_graph", BoundTerm::uri("http://semgate.example/place/"))
                .with("type", BoundTerm::uri("http://www.w3.org/2002/07/owl#ObjectProperty"))
                .with("range", BoundTerm::uri(COUNTRY))
                .with("title", BoundTerm::literal("Country"))
                .with("range_graph", BoundTerm::uri("http://semgate.example/place/"))
                .with("range_label", BoundTerm::literal("Country")),
        ]
    }

    fn instance_rows(&self, query: &str) -> Vec<QuerySolution> {
        self.triples
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| query.contains(&format!("<{}> ?predicate ?object", s)))
            .map(|(_, p, o)| {
                QuerySolution::new()
                    .with("predicate", BoundTerm::uri(p.as_str()))
                    .with("object", o.clone())
            })
            .collect()
    }

    fn has_subject(&self, text: &str) -> bool {
        self.triples
            .lock()
            .unwrap()
            .iter()
            .any(|(s, _, _)| text.contains(&format!("<{}> ?p ?o", s)))
    }
}

#[async_trait]
impl GraphStore for Triplestore {
    async fn select(&self, query: &str) -> SparqlResult<Vec<QuerySolution>> {
        if query.contains(&format!("<{}> a owl:Class", CITY)) {
            return Ok(Self::class_rows());
        }
        if query.contains("?predicate ?predicate_graph") && query.contains(CITY) {
            return Ok(Self::predicate_rows());
        }
        if query.contains("SELECT DISTINCT ?predicate ?object") {
            return Ok(self.instance_rows(query));
        }
        if query.contains("VALUES ?object") && query.contains(BRAZIL) {
            return Ok(vec![QuerySolution::new()
                .with("object", BoundTerm::uri(BRAZIL))
                .with("label", BoundTerm::literal("Brasil"))]);
        }
        if query.contains("SELECT DISTINCT ?graph") {
            return Ok(vec![QuerySolution::new()
                .with("graph", BoundTerm::uri("http://semgate.example/place/"))]);
        }
        Ok(Vec::new())
    }

    async fn ask(&self, query: &str) -> SparqlResult<bool> {
        Ok(self.has_subject(query))
    }

    async fn update(&self, update: &str) -> SparqlResult<()> {
        self.updates.lock().unwrap().push(update.to_string());
        if update.contains("DELETE WHERE") {
            self.triples
                .lock()
                .unwrap()
                .retain(|(s, _, _)| !update.contains(&format!("<{}> ?p ?o", s)));
        }
        if let Some((_, data)) = update.split_once("INSERT DATA") {
            let mut triples = self.triples.lock().unwrap();
            triples.extend(data.lines().filter_map(parse_triple));
        }
        Ok(())
    }

    async fn status(&self) -> String {
        "Triplestore connection authenticated [test] | SUCCEED | memory".to_string()
    }
}

struct NoSearch;

#[async_trait]
impl SearchEngine for NoSearch {
    async fn search(&self, _body: &Value, _indexes: &[String]) -> SearchResult<Value> {
        Ok(json!({"hits": {"total": 0, "hits": []}}))
    }
}

#[derive(Default)]
struct RecordingBus {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl EventBus for RecordingBus {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationFailure> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn status(&self) -> String {
        "Event bus connection authenticated [test] | SUCCEED | memory".to_string()
    }
}

struct TestApp {
    router: GatewayApp,
    store: Arc<Triplestore>,
    bus: Arc<RecordingBus>,
}

fn app(cache_enabled: bool) -> TestApp {
    let store = Arc::new(Triplestore::default());
    let bus = Arc::new(RecordingBus::default());
    let state = AppState {
        registry: Arc::new(PrefixRegistry::with_base(BASE)),
        defaults: Arc::new(ParamDefaults::default()),
        store: store.clone(),
        cache: Cache::new(Arc::new(MemoryBackend::new(100)), cache_enabled),
        search: Arc::new(NoSearch),
        events: bus.clone(),
        search_config: Arc::new(Default::default()),
    };
    TestApp {
        router: build_router(state, true),
        store,
        bus,
    }
}

async fn send(router: &GatewayApp, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "gateway.test")
        .body(Body::empty())
        .unwrap()
}

fn with_body(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "gateway.test")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn test_healthcheck_and_status() {
    let app = app(false);

    let (status, _, body) = send(&app.router, get("/healthcheck")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"WORKING");

    let (status, _, body) = send(&app.router, get("/_status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"WORKING");

    let (_, _, body) = send(&app.router, get("/_version")).await;
    assert_eq!(String::from_utf8(body).unwrap(), semgate::VERSION);
}

#[tokio::test]
async fn test_trailing_slash_reaches_the_same_route() {
    let app = app(true);

    let (status, _, body) = send(&app.router, get("/healthcheck/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"WORKING");

    let (status, _, body) = send(&app.router, get("/place/City/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["items"], json!([]));

    let (status, headers, _) = send(&app.router, get("/place/City/_schema")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS from gateway.test");

    let (status, headers, _) = send(&app.router, get("/place/City/_schema/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "HIT from gateway.test");

    let (status, _, _) = send(&app.router, get("/_prefixes/")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_prefixes_listing() {
    let app = app(false);
    let (status, _, body) = send(&app.router, get("/_prefixes")).await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["@context"]["rdfs"], "http://www.w3.org/2000/01/rdf-schema#");
    assert_eq!(body["root_context"], BASE);
}

#[tokio::test]
async fn test_post_then_get_with_expanded_objects() {
    let app = app(false);

    let payload = json!({
        "rdfs:label": "Rio de Janeiro",
        "base:place/country": "base:place/Country/brazil",
    });
    let (status, headers, body) = send(&app.router, with_body("POST", "/place/City", payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.is_empty());

    let location = headers["location"].to_str().unwrap().to_string();
    let prefix = "http://gateway.test/place/City/";
    assert!(location.starts_with(prefix), "{}", location);
    let id = &location[prefix.len()..];

    let (status, headers, body) = send(
        &app.router,
        get(&format!("/place/City/{}?expand_object_properties=1", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["content-type"],
        "application/json; profile=http://gateway.test/place/City/_schema"
    );
    let doc = json_body(&body);
    assert_eq!(doc["@id"], format!("{}/{}", CITY, id));
    assert_eq!(doc["title"], "Rio de Janeiro");
    assert_eq!(doc["base:place/country"], json!({"@id": BRAZIL, "title": "Brasil"}));

    let sent = app.bus.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let data = sent[0].instance_data.as_ref().unwrap();
    assert_eq!(data[HAS_COUNTRY]["@id"], BRAZIL);
    assert_eq!(data[RDFS_LABEL], "Rio de Janeiro");
    assert!(data.get("@context").is_none());
    assert!(data.get("links").is_none());
}

#[tokio::test]
async fn test_post_rejects_bad_json_and_unknown_class() {
    let app = app(false);

    let request = Request::builder()
        .method("POST")
        .uri("/place/City")
        .header("host", "gateway.test")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(&body)["errors"][0],
        "HTTP error: 400\nNo JSON object could be decoded"
    );

    let (status, _, body) =
        send(&app.router, with_body("POST", "/place/Street", json!({"rdfs:label": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(&body)["errors"][0],
        "HTTP error: 404\nClass Street doesn't exist in context place."
    );
}

#[tokio::test]
async fn test_put_creates_then_edits() {
    let app = app(false);

    let (status, headers, _) = send(
        &app.router,
        with_body("PUT", "/place/City/rio", json!({"rdfs:label": "Rio"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers["location"], "http://gateway.test/place/City/rio");

    let (status, _, _) = send(
        &app.router,
        with_body("PUT", "/place/City/rio", json!({"rdfs:label": "Rio de Janeiro"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(&app.router, get("/place/City/rio")).await;
    assert_eq!(json_body(&body)["rdfs:label"], "Rio de Janeiro");
    assert_eq!(app.bus.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_instance() {
    let app = app(false);
    send(&app.router, with_body("PUT", "/place/City/rio", json!({"rdfs:label": "Rio"}))).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/place/City/rio")
        .header("host", "gateway.test")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.store.triples.lock().unwrap().is_empty());

    let (status, _, body) = send(&app.router, get("/place/City/rio")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(&body)["errors"][0],
        "HTTP error: 404\nInstance (rio) of class (City) in graph (place) was not found."
    );
}

#[tokio::test]
async fn test_empty_collection_warning() {
    let app = app(false);
    let (status, _, body) = send(&app.router, get("/place/City")).await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["items"], json!([]));
    assert_eq!(
        body["warning"],
        "Instances of class (http://semgate.example/place/City) in graph (http://semgate.example/place/) and in language=(en) were not found."
    );
}

#[tokio::test]
async fn test_invalid_param_is_bad_request() {
    let app = app(false);
    let (status, _, body) = send(&app.router, get("/place/City?page=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["errors"][0]
        .as_str()
        .unwrap()
        .starts_with("HTTP error: 400\n"));

    let (status, _, _) = send(&app.router, get("/place/City?unknown=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_class_schema_document() {
    let app = app(false);
    let (status, _, body) = send(&app.router, get("/place/City/_schema")).await;
    assert_eq!(status, StatusCode::OK);
    let schema = json_body(&body);
    assert_eq!(schema["title"], "City");
    assert!(schema["properties"].get("base:place/country").is_some()
        || schema["properties"].get(HAS_COUNTRY).is_some());

    let (status, _, body) = send(&app.router, get("/place/Street/_schema")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(&body)["errors"][0],
        "HTTP error: 404\nSchema for class Street in context place was not found."
    );
}

#[tokio::test]
async fn test_root_is_memoized_and_purged() {
    let app = app(true);

    let (status, headers, body) = send(&app.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS from gateway.test");
    assert!(headers.contains_key("last-modified"));
    assert_eq!(json_body(&body)["items"][0]["resource_id"], "place");

    let (_, headers, _) = send(&app.router, get("/")).await;
    assert_eq!(headers["x-cache"], "HIT from gateway.test");

    let purge = Request::builder()
        .method("PURGE")
        .uri("/")
        .header("host", "gateway.test")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, purge).await;
    assert_eq!(status, StatusCode::OK);

    let (_, headers, _) = send(&app.router, get("/")).await;
    assert_eq!(headers["x-cache"], "MISS from gateway.test");

    let (_, headers, _) = send(&app.router, get("/?purge=1")).await;
    assert_eq!(headers["x-cache"], "MISS from gateway.test");
}

#[tokio::test]
async fn test_purge_with_cache_disabled() {
    let app = app(false);
    let purge = Request::builder()
        .method("PURGE")
        .uri("/place/City/_schema")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, purge).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unrecognized_url_and_method() {
    let app = app(false);

    let (status, _, body) = send(&app.router, get("/a/b/c/d")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(&body)["errors"][0],
        "HTTP error: 404\nThe URL (http://gateway.test/a/b/c/d) is not recognized."
    );

    let (status, _, _) = send(&app.router, get("/place/Ci.ty")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app.router, with_body("DELETE", "/place/City", json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_suggest_validation() {
    let app = app(false);

    let (status, _, body) =
        send(&app.router, with_body("POST", "/_suggest", json!({"search": {"pattern": ""}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["errors"][0]
        .as_str()
        .unwrap()
        .contains("Invalid json parameter passed to suggest."));

    let payload = json!({"search": {"pattern": "rio", "target": "base:place/country"}});
    let (status, _, body) = send(&app.router, with_body("POST", "/_suggest", payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(&body)["errors"][0],
        "HTTP error: 404\nThere were no search results."
    );
}
