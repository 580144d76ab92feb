//! RDF vocabulary support for the gateway
//!
//! Namespace prefixes, compact IRIs and the per-response JSON-LD context.
//!
//! # Example
//!
//! ```rust
//! use semgate::rdf::{MemorizeContext, PrefixRegistry};
//!
//! let mut registry = PrefixRegistry::default();
//! registry.add_prefix("ex", "http://example.org/");
//!
//! let mut ctx = MemorizeContext::new(&registry);
//! assert_eq!(ctx.shorten("http://example.org/alice"), "ex:alice");
//! assert_eq!(registry.expand_uri("ex:alice"), "http://example.org/alice");
//! assert_eq!(ctx.used_prefixes().len(), 1);
//! ```

mod namespace;

pub use namespace::{
    MemorizeContext, Namespace, PrefixError, PrefixRegistry, PrefixResult, OWL, RDF, RDFS, XSD,
};

/// Whether the string parses as an absolute IRI
pub fn is_valid_iri(candidate: &str) -> bool {
    oxiri::Iri::parse(candidate).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rdf_module_exports() {
        let registry = PrefixRegistry::with_base("http://semgate.example/");
        assert_eq!(registry.expand("base"), "http://semgate.example/");
        let _ctx = MemorizeContext::new(&registry);
    }

    #[test]
    fn test_is_valid_iri() {
        assert!(is_valid_iri("http://example.org/a"));
        assert!(!is_valid_iri("not an iri"));
    }
}
