//! Gateway configuration
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional YAML file, `SEMGATE_*` environment variables and command-line
//! flags (applied by the binary).

use crate::params::ParamDefaults;
use crate::rdf::{is_valid_iri, PrefixRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,
    /// Port
    pub port: u16,
    /// Send permissive CORS headers
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5100,
            cors_enabled: true,
        }
    }
}

/// SPARQL endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriplestoreConfig {
    /// Query endpoint
    pub endpoint: String,
    /// Update endpoint, the query endpoint when unset
    pub update_endpoint: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TriplestoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8890/sparql-auth".to_string(),
            update_endpoint: None,
            user: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl TriplestoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which key-value store backs the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackendKind,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Redis logical database
    pub db: u32,
    pub timeout_secs: u64,
    /// Entry limit of the in-process backend
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: CacheBackendKind::Redis,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            timeout_secs: 5,
            memory_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Search engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub endpoint: String,
    /// Prepended to the graph slug to form the index name
    pub index_prefix: String,
    pub analyzer: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
            index_prefix: "semantica.".to_string(),
            analyzer: "default".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Mutation notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    pub enabled: bool,
    /// Message endpoint (REST bridge of the broker)
    pub endpoint: String,
    pub queue: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:8161/api/message".to_string(),
            queue: "semgate.instances".to_string(),
            user: None,
            password: None,
            timeout_secs: 5,
        }
    }
}

impl EventBusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vocabulary and request defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Root of graphs derived from a context name, bound to the `base` slug
    pub uri_prefix: String,
    pub default_lang: String,
    pub default_per_page: u64,
    /// Extra slug → namespace bindings
    pub prefixes: BTreeMap<String, String>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        let defaults = ParamDefaults::default();
        Self {
            uri_prefix: defaults.uri_prefix,
            default_lang: defaults.default_lang,
            default_per_page: defaults.default_per_page,
            prefixes: BTreeMap::new(),
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub triplestore: TriplestoreConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub event_bus: EventBusConfig,
    pub namespace: NamespaceConfig,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            triplestore: TriplestoreConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            event_bus: EventBusConfig::default(),
            namespace: NamespaceConfig::default(),
            log_level: "semgate=info,tower_http=info".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Defaults, overlaid with the YAML file when given, then the environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from `SEMGATE_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Override fields from a variable lookup; unparsable numbers are ignored
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flag = |v: String| matches!(v.as_str(), "1" | "true" | "yes" | "on");

        if let Some(v) = lookup("SEMGATE_ADDRESS") {
            self.server.address = v;
        }
        if let Some(port) = lookup("SEMGATE_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = lookup("SEMGATE_TRIPLESTORE_ENDPOINT") {
            self.triplestore.endpoint = v;
        }
        if let Some(v) = lookup("SEMGATE_TRIPLESTORE_USER") {
            self.triplestore.user = Some(v);
        }
        if let Some(v) = lookup("SEMGATE_TRIPLESTORE_PASSWORD") {
            self.triplestore.password = Some(v);
        }
        if let Some(v) = lookup("SEMGATE_CACHE_ENABLED") {
            self.cache.enabled = flag(v);
        }
        if let Some(v) = lookup("SEMGATE_REDIS_HOST") {
            self.cache.host = v;
        }
        if let Some(port) = lookup("SEMGATE_REDIS_PORT").and_then(|v| v.parse().ok()) {
            self.cache.port = port;
        }
        if let Some(v) = lookup("SEMGATE_REDIS_PASSWORD") {
            self.cache.password = Some(v);
        }
        if let Some(v) = lookup("SEMGATE_SEARCH_ENDPOINT") {
            self.search.endpoint = v;
        }
        if let Some(v) = lookup("SEMGATE_EVENT_BUS_ENABLED") {
            self.event_bus.enabled = flag(v);
        }
        if let Some(v) = lookup("SEMGATE_EVENT_BUS_ENDPOINT") {
            self.event_bus.endpoint = v;
        }
        if let Some(v) = lookup("SEMGATE_URI_PREFIX") {
            self.namespace.uri_prefix = v;
        }
        if let Some(v) = lookup("SEMGATE_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    /// Check the values that would otherwise fail at request time
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".to_string()));
        }
        if self.namespace.default_per_page == 0 {
            return Err(ConfigError::Invalid(
                "namespace.default_per_page must be positive".to_string(),
            ));
        }
        let uri_prefix = &self.namespace.uri_prefix;
        if !is_valid_iri(uri_prefix) || !(uri_prefix.ends_with('/') || uri_prefix.ends_with('#')) {
            return Err(ConfigError::Invalid(format!(
                "namespace.uri_prefix must be an absolute IRI ending in '/' or '#': {}",
                uri_prefix
            )));
        }

        let mut endpoints = vec![
            ("triplestore.endpoint", &self.triplestore.endpoint),
            ("search.endpoint", &self.search.endpoint),
        ];
        if let Some(update) = &self.triplestore.update_endpoint {
            endpoints.push(("triplestore.update_endpoint", update));
        }
        if self.event_bus.enabled {
            endpoints.push(("event_bus.endpoint", &self.event_bus.endpoint));
        }
        for (name, url) in endpoints {
            reqwest::Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("{} ({}): {}", name, url, e)))?;
        }

        self.registry().map(|_| ())
    }

    /// Prefix table: standard vocabularies, `base`, then configured extras
    pub fn registry(&self) -> ConfigResult<PrefixRegistry> {
        let mut registry = PrefixRegistry::with_base(&self.namespace.uri_prefix);
        for (slug, iri) in &self.namespace.prefixes {
            registry
                .try_add_prefix(slug, iri)
                .map_err(|e| ConfigError::Invalid(format!("namespace.prefixes.{}: {}", slug, e)))?;
        }
        Ok(registry)
    }

    pub fn param_defaults(&self) -> ParamDefaults {
        ParamDefaults {
            uri_prefix: self.namespace.uri_prefix.clone(),
            default_lang: self.namespace.default_lang.clone(),
            default_per_page: self.namespace.default_per_page,
        }
    }
}
