//! Folding predicate bindings into JSON-schema property shapes

use super::{Cardinalities, Cardinality, ItemShape, PredicateShape, PropertyKind, RangeShape, RangeSpec};
use crate::rdf::{MemorizeContext, XSD};
use crate::sparql::QuerySolution;
use indexmap::IndexMap;

/// Aggregated properties of one class, keyed by short predicate name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedPredicates {
    pub properties: IndexMap<String, PredicateShape>,
    pub required: Vec<String>,
}

fn facet(row: &QuerySolution, var: &str) -> Option<u64> {
    row.value(var).and_then(|v| v.trim().parse::<u64>().ok())
}

/// Index cardinality restrictions by predicate, then by range.
///
/// Rows without a range, or without any facet, contribute nothing.
pub fn extract_cardinalities(rows: &[QuerySolution]) -> Cardinalities {
    let mut cardinalities = Cardinalities::new();
    for row in rows {
        let (Some(predicate), Some(range)) = (row.value("predicate"), row.value("range")) else {
            continue;
        };
        let min = facet(row, "min");
        let max = facet(row, "max");
        if min.is_none() && max.is_none() {
            continue;
        }

        let entry = cardinalities
            .entry(predicate.to_string())
            .or_default()
            .entry(range.to_string())
            .or_insert_with(Cardinality::default);
        if let Some(min) = min {
            entry.min_items = Some(min);
            entry.required = min >= 1;
        }
        if let Some(max) = max {
            entry.max_items = Some(max);
        }
    }
    cardinalities
}

/// JSON type and format for an XSD (or other) datatype range
fn datatype_format(range_uri: &str, ctx: &mut MemorizeContext<'_>) -> (String, Option<String>) {
    let (kind, format) = match range_uri.strip_prefix(XSD) {
        Some("dateTime") | Some("date") => ("string", Some("date".to_string())),
        Some(
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "nonPositiveInteger" | "negativeInteger" | "positiveInteger" | "unsignedLong"
            | "unsignedInt" | "unsignedShort" | "unsignedByte",
        ) => ("integer", None),
        Some("decimal" | "float" | "double") => ("number", None),
        Some("boolean") => ("boolean", None),
        _ => ("string", Some(ctx.shorten(range_uri))),
    };
    (kind.to_string(), format)
}

/// Shape of one predicate binding row.
///
/// Returns `None` for rows missing the predicate or its range.
pub fn assemble_predicate(row: &QuerySolution, ctx: &mut MemorizeContext<'_>) -> Option<PredicateShape> {
    let predicate_uri = row.value("predicate")?;
    let range_uri = row.value("range")?;
    let property_kind = PropertyKind::classify(row.value("type"), range_uri);

    let graph = row
        .value("predicate_graph")
        .map(|g| ctx.prefix_to_slug(g))
        .unwrap_or_default();

    let mut shape = PredicateShape {
        title: row.value("title").unwrap_or_default().to_string(),
        description: row.value("predicate_comment").map(str::to_string),
        graph,
        property_kind,
        predicate_uri: predicate_uri.to_string(),
        range_uris: vec![range_uri.to_string()],
        ..PredicateShape::default()
    };

    match property_kind {
        PropertyKind::Object => {
            let range_graph = row
                .value("range_graph")
                .map(|g| ctx.prefix_to_slug(g))
                .unwrap_or_default();
            shape.range = Some(RangeSpec::One(RangeShape {
                id: Some(ctx.shorten(range_uri)),
                graph: Some(range_graph),
                title: Some(row.value("range_label").unwrap_or_default().to_string()),
                kind: "string".to_string(),
                format: Some("uri".to_string()),
            }));
            shape.kind = "string".to_string();
            shape.format = Some("uri".to_string());
            ctx.add_object_property(predicate_uri, range_uri);
        }
        PropertyKind::Datatype => {
            let (kind, format) = datatype_format(range_uri, ctx);
            shape.kind = kind;
            shape.format = format;
        }
    }
    Some(shape)
}

/// Give the shape an explicit `range` mirroring its own type and format
pub fn normalize_predicate_range(mut shape: PredicateShape) -> PredicateShape {
    if shape.range.is_none() {
        shape.range = Some(shape.explicit_range());
    }
    shape
}

/// Union of two ranges, deduplicated, in first-seen order
pub fn merge_ranges(a: RangeSpec, b: RangeSpec) -> RangeSpec {
    let was_list = a.is_many() || b.is_many();
    let mut merged: Vec<RangeShape> = Vec::new();
    for range in a.into_vec().into_iter().chain(b.into_vec()) {
        if !merged.contains(&range) {
            merged.push(range);
        }
    }
    if merged.len() == 1 && !was_list {
        RangeSpec::One(merged.remove(0))
    } else {
        RangeSpec::Many(merged)
    }
}

/// The value every input agrees on, or `""`
pub fn get_common_key(values: &[&str]) -> String {
    match values.split_first() {
        Some((first, rest)) if rest.iter().all(|v| v == first) => first.to_string(),
        _ => String::new(),
    }
}

fn common_optional(a: &Option<String>, b: &Option<String>) -> Option<String> {
    if a.is_none() && b.is_none() {
        return None;
    }
    Some(get_common_key(&[
        a.as_deref().unwrap_or_default(),
        b.as_deref().unwrap_or_default(),
    ]))
}

/// Merge two shapes of the same predicate
pub fn join_predicates(old: PredicateShape, new: PredicateShape) -> PredicateShape {
    let old = normalize_predicate_range(old);
    let new = normalize_predicate_range(new);

    let range = merge_ranges(old.explicit_range(), new.explicit_range());
    let mut range_uris = old.range_uris.clone();
    for uri in &new.range_uris {
        if !range_uris.contains(uri) {
            range_uris.push(uri.clone());
        }
    }

    PredicateShape {
        title: get_common_key(&[&old.title, &new.title]),
        description: common_optional(&old.description, &new.description),
        graph: get_common_key(&[&old.graph, &new.graph]),
        kind: get_common_key(&[&old.kind, &new.kind]),
        format: common_optional(&old.format, &new.format),
        range: Some(range),
        items: None,
        min_items: None,
        max_items: None,
        property_kind: if old.property_kind == PropertyKind::Object
            || new.property_kind == PropertyKind::Object
        {
            PropertyKind::Object
        } else {
            PropertyKind::Datatype
        },
        predicate_uri: old.predicate_uri,
        range_uris,
    }
}

/// Turn a shape into an array when its cardinality asks for one
fn apply_cardinality(shape: &mut PredicateShape, cardinality: Option<&Cardinality>) {
    let min = cardinality.and_then(|c| c.min_items);
    let max = cardinality.and_then(|c| c.max_items);
    let is_array = match shape.property_kind {
        PropertyKind::Object => max != Some(1),
        PropertyKind::Datatype => min.is_some_and(|m| m > 1) || max.is_some_and(|m| m > 1),
    };
    if !is_array {
        return;
    }

    shape.items = Some(ItemShape {
        kind: shape.kind.clone(),
        format: shape.format.take(),
    });
    shape.kind = "array".to_string();
    shape.min_items = min;
    shape.max_items = max;
}

/// Apply restrictions to single-range predicates and collect required names
pub fn apply_cardinalities(
    properties: &mut IndexMap<String, PredicateShape>,
    cardinalities: &Cardinalities,
) -> Vec<String> {
    let mut required = Vec::new();
    for (name, shape) in properties.iter_mut() {
        let [range_uri] = shape.range_uris.as_slice() else {
            continue;
        };
        let cardinality = cardinalities
            .get(&shape.predicate_uri)
            .and_then(|by_range| by_range.get(range_uri))
            .cloned();

        apply_cardinality(shape, cardinality.as_ref());
        if cardinality.is_some_and(|c| c.required) && !required.contains(name) {
            required.push(name.clone());
        }
    }
    required
}

/// Aggregate predicate rows into one shape per predicate
pub fn convert_bindings(
    rows: &[QuerySolution],
    cardinalities: &Cardinalities,
    ctx: &mut MemorizeContext<'_>,
) -> ConvertedPredicates {
    let mut properties: IndexMap<String, PredicateShape> = IndexMap::new();
    for row in rows {
        let Some(shape) = assemble_predicate(row, ctx) else {
            continue;
        };
        let name = ctx.shorten(&shape.predicate_uri);
        match properties.get_mut(&name) {
            Some(existing) if *existing != shape => {
                let old = std::mem::take(existing);
                *existing = join_predicates(old, shape);
            }
            Some(_) => {}
            None => {
                properties.insert(name, shape);
            }
        }
    }

    let required = apply_cardinalities(&mut properties, cardinalities);
    ConvertedPredicates {
        properties,
        required,
    }
}
