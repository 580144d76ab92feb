//! semgate
//!
//! A REST gateway over a SPARQL triplestore. Named graphs are exposed as
//! contexts, OWL classes as collections and their members as instances;
//! class definitions are served as JSON-Schema documents aggregated from the
//! ontology.
//!
//! # Architecture
//!
//! - [`rdf`]: prefix registry, compact/expanded URI conversion
//! - [`params`]: query-string contract of every endpoint
//! - [`cache`]: read-through response cache (Redis or in-process)
//! - [`sparql`]: triplestore client
//! - [`schema`]: class schema aggregation
//! - [`envelope`]: hypermedia links and list wrappers
//! - [`resources`]: the operations behind each route
//! - [`search_engine`] and [`events`]: full-text search and mutation notices
//! - [`http`]: axum routes and handlers
//!
//! ## Example Usage
//!
//! ```rust
//! use semgate::rdf::PrefixRegistry;
//!
//! let registry = PrefixRegistry::with_base("http://semantica.globo.com/");
//! let uri = registry.expand_uri("rdfs:label");
//! assert_eq!(uri, "http://www.w3.org/2000/01/rdf-schema#label");
//! assert_eq!(registry.shorten(&uri), "rdfs:label");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod http;
pub mod params;
pub mod rdf;
pub mod resources;
pub mod schema;
pub mod search_engine;
pub mod sparql;

// Re-export main types for convenience
pub use cache::{Cache, CacheBackend, CacheEntry, CacheStatus, MemoryBackend, RedisBackend};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use events::{DisabledEventBus, EventBus, HttpEventBus, Notification};
pub use http::{build_router, AppState, GatewayApp, GatewayServer};
pub use params::{EndpointKind, ParamDict};
pub use rdf::PrefixRegistry;
pub use search_engine::{ElasticsearchClient, SearchEngine};
pub use sparql::{GraphStore, SparqlHttpClient};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
