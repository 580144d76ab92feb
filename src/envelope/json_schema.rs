//! JSON schemas describing the list resources

use super::{encode_query_value, link};
use crate::params::ParamDict;
use serde_json::{json, Value};

use crate::schema::JSON_SCHEMA_DRAFT;

/// Schema of the `pattern` argument accepted by `_search`
pub fn search_param_schema() -> Value {
    json!({
        "type": "object",
        "required": ["pattern"],
        "properties": {
            "pattern": {"type": "string"}
        }
    })
}

/// Templated pagination properties and links for a list rooted at `root_url`
pub fn pagination_schema(root_url: &str, extra_url_params: &str) -> Value {
    let href = |page: &str| {
        format!(
            "{}?page={}&per_page={{per_page}}{}",
            root_url, page, extra_url_params
        )
    };
    json!({
        "properties": {
            "page": {"type": "integer", "minimum": 1},
            "per_page": {"type": "integer", "minimum": 1},
            "previous_page": {"type": "integer", "minimum": 1},
            "next_page": {"type": "integer"},
            "last_page": {"type": "integer"}
        },
        "links": [
            link(href("1"), "GET", "first"),
            link(href("{previous_page}"), "GET", "previous"),
            link(href("{next_page}"), "GET", "next"),
            link(href("{last_page}"), "GET", "last")
        ]
    })
}

/// Fold `extra` into `base`: properties are unioned, links appended
pub fn merge_schemas(base: &mut Value, extra: Value) {
    let (Value::Object(base), Value::Object(extra)) = (base, extra) else {
        return;
    };
    for (key, value) in extra {
        let replacement = match (base.get_mut(&key), value) {
            (Some(Value::Object(target)), Value::Object(source)) => {
                target.extend(source);
                None
            }
            (Some(Value::Array(target)), Value::Array(source)) => {
                target.extend(source);
                None
            }
            (_, value) => Some(value),
        };
        if let Some(value) = replacement {
            base.insert(key, value);
        }
    }
}

fn list_items(title: &str, item_links: Vec<Value>) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "title": title,
            "required": ["title", "@id", "resource_id"],
            "properties": {
                "title": {"type": "string"},
                "@id": {"type": "string", "format": "uri"},
                "resource_id": {"type": "string"}
            },
            "links": item_links
        }
    })
}

/// Schema of the root listing of contexts
pub fn root_schema() -> Value {
    let mut schema = json!({
        "$schema": JSON_SCHEMA_DRAFT,
        "title": "List of Contexts (Named-graphs)",
        "type": "object",
        "required": ["items"],
        "properties": {
            "do_item_count": {"type": "integer"},
            "item_count": {"type": "integer"},
            "_base_url": {"type": "string", "format": "uri"},
            "items": list_items("Context", vec![link("/{resource_id}", "GET", "context")])
        },
        "links": [
            link("{+_base_url}", "GET", "self"),
            link("/_prefixes", "GET", "prefixes")
        ]
    });
    merge_schemas(&mut schema, pagination_schema("/", ""));
    schema
}

/// Schema of the class listing of one context
pub fn context_schema(context_name: &str) -> Value {
    let class_href = format!("/{}/{{resource_id}}?class_prefix={{class_prefix}}", context_name);
    let mut schema = json!({
        "$schema": JSON_SCHEMA_DRAFT,
        "title": format!("Context {}: list of classes", context_name),
        "type": "object",
        "required": ["items"],
        "properties": {
            "do_item_count": {"type": "integer"},
            "item_count": {"type": "integer"},
            "_base_url": {"type": "string", "format": "uri"},
            "@id": {"type": "string", "format": "uri"},
            "items": list_items("Class", vec![
                link(class_href.clone(), "GET", "collection"),
                link(format!("/{}/{{resource_id}}/_schema", context_name), "GET", "class")
            ])
        },
        "links": [
            link("{+_base_url}", "GET", "self"),
            link("/", "GET", "list")
        ]
    });
    merge_schemas(&mut schema, pagination_schema(&format!("/{}", context_name), ""));
    schema
}

/// Schema of one class's instance listing
pub fn collection_schema(params: &ParamDict, class_title: &str) -> Value {
    let context_name = params.context_name.as_deref().unwrap_or_default();
    let class_name = params.class_name.as_deref().unwrap_or_default();
    let class_path = format!("/{}/{}", context_name, class_name);
    let class_prefix = match params.get("class_prefix") {
        Some(prefix) if !prefix.is_empty() => format!("?class_prefix={}", encode_query_value(prefix)),
        _ => String::new(),
    };
    let item_href = format!(
        "{}/{{resource_id}}?class_prefix={{class_prefix}}&instance_prefix={{instance_prefix}}",
        class_path
    );

    let mut add = link(format!("{}{}", class_path, class_prefix), "POST", "add");
    add["schema"] = json!({"$ref": format!("{}/_schema{}", class_path, class_prefix)});
    let mut search = link(
        format!(
            "{}/_search?graph_uri={}&class_uri={}&pattern={{pattern}}",
            class_path,
            encode_query_value(params.graph_uri.as_deref().unwrap_or_default()),
            encode_query_value(params.class_uri.as_deref().unwrap_or_default()),
        ),
        "GET",
        "search",
    );
    search["schema"] = search_param_schema();

    let mut schema = json!({
        "$schema": JSON_SCHEMA_DRAFT,
        "title": class_title,
        "type": "object",
        "required": ["items", "_class_prefix", "@id"],
        "properties": {
            "_class_prefix": {"type": "string"},
            "pattern": {"type": "string"},
            "do_item_count": {"type": "integer"},
            "item_count": {"type": "integer"},
            "@id": {"type": "string", "format": "uri"},
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "title": class_title,
                    "required": ["title", "@id", "resource_id", "instance_prefix"],
                    "properties": {
                        "title": {"type": "string"},
                        "@id": {"type": "string"},
                        "resource_id": {"type": "string"},
                        "instance_prefix": {"type": "string", "format": "uri"}
                    },
                    "links": [
                        link(item_href.clone(), "GET", "item"),
                        link(item_href, "GET", "instance")
                    ]
                }
            }
        },
        "links": [
            link("{+_base_url}", "GET", "self"),
            link("{+_schema_url}", "GET", "class"),
            link(format!("/{}", context_name), "GET", "context"),
            add,
            search
        ]
    });
    merge_schemas(
        &mut schema,
        pagination_schema(&class_path, "&class_prefix={_class_prefix}"),
    );
    schema
}

/// Schema of `_suggest` results
pub fn suggest_schema() -> Value {
    let mut schema = json!({
        "$schema": JSON_SCHEMA_DRAFT,
        "title": "Suggest Result List Schema",
        "type": "object",
        "required": ["items"],
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["@id", "title", "@type"],
                    "properties": {
                        "@id": {"type": "string", "format": "uri"},
                        "title": {"type": "string"},
                        "@type": {"type": "string", "format": "uri"},
                        "type_title": {"type": "string"}
                    },
                    "links": [
                        link("{+@id}", "GET", "inspect")
                    ]
                }
            }
        },
        "links": [
            link("{+_base_url}", "POST", "self")
        ]
    });
    merge_schemas(&mut schema, pagination_schema("/_suggest", ""));
    schema
}

/// Links of a class schema; templated on the instance it describes
pub fn class_schema_links(params: &ParamDict) -> Vec<Value> {
    let class_path = format!(
        "/{}/{}",
        params.context_name.as_deref().unwrap_or_default(),
        params.class_name.as_deref().unwrap_or_default()
    );
    let class_prefix = match params.get("class_prefix") {
        Some(prefix) if !prefix.is_empty() => format!("?class_prefix={}", encode_query_value(prefix)),
        _ => String::new(),
    };
    let schema_ref = json!({"$ref": format!("{}/_schema{}", class_path, class_prefix)});

    let mut replace = link("{+_base_url}", "PUT", "replace");
    replace["schema"] = schema_ref.clone();
    let mut create = link(format!("{}{}", class_path, class_prefix), "POST", "create");
    create["schema"] = schema_ref;

    vec![
        link("{+_base_url}", "GET", "self"),
        link(format!("{}/_schema{}", class_path, class_prefix), "GET", "describedBy"),
        replace,
        link("{+_base_url}", "DELETE", "delete"),
        link(format!("{}{}", class_path, class_prefix), "GET", "collection"),
        create,
    ]
}
