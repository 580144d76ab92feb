//! SPARQL triplestore access
//!
//! The gateway talks to its triplestore only through [`GraphStore`]; the
//! HTTP implementation lives in [`client`]. Query text is assembled by the
//! callers, so this module also provides the escaping helpers they need.

pub mod client;
mod results;

pub use client::SparqlHttpClient;
pub use results::{BoundTerm, QuerySolution, ResultBindings, ResultHead, SparqlResults, TermKind};

use async_trait::async_trait;
use thiserror::Error;

/// SPARQL errors
#[derive(Error, Debug)]
pub enum SparqlError {
    /// Endpoint unreachable or connection dropped
    #[error("Access to backend service failed. {0}")]
    Network(String),

    /// Endpoint answered with a non-success status
    #[error("Access to backend service failed. HTTP {status}\nResponse:\n{body}")]
    Endpoint { status: u16, body: String },

    /// Response body was not a SPARQL results document
    #[error("Invalid triplestore response: {0}")]
    Serialization(String),

    /// Client could not be built
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SparqlResult<T> = Result<T, SparqlError>;

/// Read/write access to the triplestore
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a SELECT query
    async fn select(&self, query: &str) -> SparqlResult<Vec<QuerySolution>>;

    /// Run an ASK query
    async fn ask(&self, query: &str) -> SparqlResult<bool>;

    /// Run a SPARQL Update request
    async fn update(&self, update: &str) -> SparqlResult<()>;

    /// One-line health report; contains `SUCCEED` when the store answers
    async fn status(&self) -> String;
}

/// Escape a string for use inside a double-quoted SPARQL literal
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Quoted SPARQL literal, with an optional language tag
pub fn literal(value: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) if !lang.is_empty() => format!("\"{}\"@{}", escape_literal(value), lang),
        _ => format!("\"{}\"", escape_literal(value)),
    }
}

/// `FILTER` restricting `?var` to `lang` (or untagged literals); empty
/// when no language is requested
pub fn lang_filter(var: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) if !lang.is_empty() => format!(
            "FILTER(langMatches(lang(?{0}), \"{1}\") OR lang(?{0}) = \"\")",
            var,
            escape_literal(lang)
        ),
        _ => String::new(),
    }
}

/// `<iri>` reference; callers pass IRIs that were validated upstream
pub fn iri(value: &str) -> String {
    format!("<{}>", value)
}

/// Whether `term` is a well-formed SPARQL variable (`?name`)
pub fn is_variable_name(term: &str) -> bool {
    match term.strip_prefix('?') {
        Some(name) => {
            let mut chars = name.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
