//! SPARQL text for class schema retrieval

use crate::sparql::{iri, lang_filter};

const PREFIXES: &str = "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
";

/// Label and comment of a class
pub fn class_schema(class_uri: &str, lang: Option<&str>) -> String {
    let class = iri(class_uri);
    format!(
        "{PREFIXES}SELECT DISTINCT ?title ?comment
WHERE {{
    {class} a owl:Class ;
        rdfs:label ?title .
    {title_filter}
    OPTIONAL {{
        {class} rdfs:comment ?comment .
        {comment_filter}
    }}
}}",
        title_filter = lang_filter("title", lang),
        comment_filter = lang_filter("comment", lang),
    )
}

/// Predicates whose domain is the class or one of its superclasses
pub fn predicates(class_uri: &str, lang: Option<&str>) -> String {
    let class = iri(class_uri);
    format!(
        "{PREFIXES}SELECT DISTINCT ?predicate ?predicate_graph ?predicate_comment ?type ?range ?title ?range_graph ?range_label
WHERE {{
    {class} rdfs:subClassOf* ?domain_class .
    GRAPH ?predicate_graph {{ ?predicate rdfs:domain ?domain_class . }}
    {{
        ?predicate rdfs:range ?range .
    }} UNION {{
        ?predicate rdfs:subPropertyOf ?super_property .
        ?super_property rdfs:range ?range .
    }}
    ?predicate rdfs:label ?title ;
        rdf:type ?type .
    FILTER(?type IN (owl:ObjectProperty, owl:DatatypeProperty))
    {title_filter}
    OPTIONAL {{
        ?predicate rdfs:comment ?predicate_comment .
        {comment_filter}
    }}
    OPTIONAL {{
        GRAPH ?range_graph {{ ?range rdfs:label ?range_label . }}
        {range_filter}
    }}
}}",
        title_filter = lang_filter("title", lang),
        comment_filter = lang_filter("predicate_comment", lang),
        range_filter = lang_filter("range_label", lang),
    )
}

/// Qualified cardinality restrictions declared on the class
pub fn cardinalities(class_uri: &str) -> String {
    format!(
        "{PREFIXES}SELECT DISTINCT ?predicate ?range ?min ?max
WHERE {{
    {class} rdfs:subClassOf ?restriction .
    ?restriction owl:onProperty ?predicate .
    OPTIONAL {{ ?restriction owl:minQualifiedCardinality ?min . }}
    OPTIONAL {{ ?restriction owl:maxQualifiedCardinality ?max . }}
    {{
        ?restriction owl:onClass ?range .
    }} UNION {{
        ?restriction owl:onDataRange ?range .
    }}
}}",
        class = iri(class_uri),
    )
}
