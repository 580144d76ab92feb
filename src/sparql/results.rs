//! SPARQL query results (`application/sparql-results+json`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of a bound RDF term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
    Uri,
    Literal,
    /// Emitted by older endpoints for datatyped literals
    TypedLiteral,
    Bnode,
}

/// One bound value of a solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundTerm {
    #[serde(rename = "type")]
    pub kind: TermKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl BoundTerm {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Uri,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            kind: TermKind::TypedLiteral,
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn is_uri(&self) -> bool {
        self.kind == TermKind::Uri
    }
}

/// Query solution (variable bindings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySolution {
    /// Variable name → RDF term bindings
    pub bindings: BTreeMap<String, BoundTerm>,
}

impl QuerySolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variable: &str) -> Option<&BoundTerm> {
        self.bindings.get(variable)
    }

    /// Lexical value of a variable
    pub fn value(&self, variable: &str) -> Option<&str> {
        self.bindings.get(variable).map(|t| t.value.as_str())
    }

    pub fn bind(&mut self, variable: impl Into<String>, term: BoundTerm) {
        self.bindings.insert(variable.into(), term);
    }

    /// Builder form of [`QuerySolution::bind`]
    pub fn with(mut self, variable: impl Into<String>, term: BoundTerm) -> Self {
        self.bind(variable, term);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultHead {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultBindings {
    #[serde(default)]
    pub bindings: Vec<QuerySolution>,
}

/// SPARQL JSON results document, for both SELECT and ASK
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: ResultHead,
    #[serde(default)]
    pub results: Option<ResultBindings>,
    #[serde(default)]
    pub boolean: Option<bool>,
}

impl SparqlResults {
    pub fn into_solutions(self) -> Vec<QuerySolution> {
        self.results.map(|r| r.bindings).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_document() {
        let raw = r#"{
            "head": {"vars": ["predicate", "title"]},
            "results": {"bindings": [
                {"predicate": {"type": "uri", "value": "http://test/person/gender"},
                 "title": {"type": "literal", "xml:lang": "pt", "value": "Sexo"},
                 "min": {"type": "typed-literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer", "value": "1"}}
            ]}
        }"#;
        let results: SparqlResults = serde_json::from_str(raw).unwrap();
        assert_eq!(results.head.vars, vec!["predicate", "title"]);

        let solutions = results.into_solutions();
        assert_eq!(solutions.len(), 1);
        let row = &solutions[0];
        assert!(row.get("predicate").unwrap().is_uri());
        assert_eq!(row.get("title").unwrap().lang.as_deref(), Some("pt"));
        assert_eq!(row.get("min").unwrap().kind, TermKind::TypedLiteral);
        assert_eq!(row.value("missing"), None);
    }

    #[test]
    fn test_parse_ask_document() {
        let results: SparqlResults = serde_json::from_str(r#"{"head": {}, "boolean": true}"#).unwrap();
        assert_eq!(results.boolean, Some(true));
        assert!(results.into_solutions().is_empty());
    }

    #[test]
    fn test_solution_builder() {
        let row = QuerySolution::new()
            .with("s", BoundTerm::uri("http://x/a"))
            .with("label", BoundTerm::literal("A").with_lang("en"));
        assert_eq!(row.value("s"), Some("http://x/a"));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["label"]["xml:lang"], "en");
    }
}
