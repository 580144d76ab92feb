//! Shared application state

use crate::cache::Cache;
use crate::config::SearchConfig;
use crate::envelope::RequestUrl;
use crate::error::GatewayResult;
use crate::events::EventBus;
use crate::params::{EndpointKind, ParamDefaults, ParamDict, PathParams};
use crate::rdf::PrefixRegistry;
use crate::search_engine::SearchEngine;
use crate::sparql::GraphStore;
use std::sync::Arc;

/// Everything a handler needs, cloned into each request
#[derive(Clone)]
pub struct AppState {
    /// Read-only prefix table
    pub registry: Arc<PrefixRegistry>,
    pub defaults: Arc<ParamDefaults>,
    pub store: Arc<dyn GraphStore>,
    pub cache: Cache,
    pub search: Arc<dyn SearchEngine>,
    pub events: Arc<dyn EventBus>,
    pub search_config: Arc<SearchConfig>,
}

impl AppState {
    /// Validate the request's query string for one endpoint
    pub fn params(&self, url: &RequestUrl, kind: EndpointKind, path: PathParams) -> GatewayResult<ParamDict> {
        Ok(ParamDict::new(
            &url.pairs,
            &kind.spec(),
            &path,
            &self.defaults,
            &self.registry,
        )?)
    }
}
