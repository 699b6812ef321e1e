//! Minimal JSON Schema builder for structured chat output.
//!
//! Properties are given as a flat map of dotted paths to type specs:
//!
//! ```text
//! author.name  -> text
//! author.age   -> int=30
//! ```
//!
//! produces nested `object` schemas with `string` / `integer` leaves, the
//! latter carrying `"default": 30`.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

#[derive(Debug, Default)]
struct ObjectSchema {
    properties: BTreeMap<String, Property>,
    required: Vec<String>,
}

#[derive(Debug)]
enum Property {
    Leaf { kind: String, default: Option<Value> },
    Object(ObjectSchema),
}

impl ObjectSchema {
    fn insert(&mut self, path: &[&str], kind: &str, default: Option<Value>, required: bool) {
        match path {
            [] => {}
            [name] => {
                self.properties.insert(
                    name.to_string(),
                    Property::Leaf {
                        kind: kind.to_string(),
                        default,
                    },
                );
                if required {
                    self.require(name);
                }
            }
            [name, rest @ ..] => {
                let entry = self
                    .properties
                    .entry(name.to_string())
                    .or_insert_with(|| Property::Object(ObjectSchema::default()));
                // A leaf that gains children becomes an object.
                if matches!(entry, Property::Leaf { .. }) {
                    *entry = Property::Object(ObjectSchema::default());
                }
                if let Property::Object(child) = entry {
                    child.insert(rest, kind, default, required);
                }
            }
        }
    }

    fn require(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    fn to_value(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, property)| (name.clone(), property.to_value()))
            .collect();

        let mut schema = json!({ "type": "object", "properties": properties });
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

impl Property {
    fn to_value(&self) -> Value {
        match self {
            Property::Leaf { kind, default } => {
                let mut leaf = json!({ "type": kind });
                if let Some(default) = default {
                    leaf["default"] = default.clone();
                }
                leaf
            }
            Property::Object(object) => object.to_value(),
        }
    }
}

/// Builds a JSON Schema string from dotted property paths and type specs.
///
/// A spec is `type` or `type=default`; an empty type means `string`. A
/// `required` entry marks that full path required on its parent object.
/// Top-level required names are listed even when absent from `props`.
pub fn schema_from_fields<I, K, V>(props: I, required: &[&str]) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut root = ObjectSchema::default();

    for (key, spec) in props {
        let key = key.as_ref();
        let path: Vec<&str> = key.split('.').collect();
        let (kind, default) = parse_type_and_default(spec.as_ref());
        root.insert(&path, normalize_type(&kind), default, required.contains(&key));
    }

    for name in required.iter().filter(|r| !r.contains('.')) {
        root.require(name);
    }

    serde_json::to_string(&root.to_value())
}

/// [`schema_from_fields`] with nothing required.
pub fn schema_from_map<I, K, V>(props: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    schema_from_fields(props, &[])
}

/// Splits `"int=30"` into the type and a default converted to that type.
/// Defaults that fail to convert stay strings.
fn parse_type_and_default(spec: &str) -> (String, Option<Value>) {
    let (kind, raw_default) = match spec.split_once('=') {
        Some((kind, default)) => (kind.trim(), Some(default.trim())),
        None => (spec.trim(), None),
    };
    let kind = if kind.is_empty() { "string" } else { kind };

    let default = raw_default.map(|raw| {
        let typed = match kind.to_lowercase().as_str() {
            "integer" | "int" => raw.parse::<i64>().ok().map(Value::from),
            "number" | "float" => raw.parse::<f64>().ok().map(Value::from),
            "boolean" | "bool" => parse_bool(raw).map(Value::from),
            _ => None,
        };
        typed.unwrap_or_else(|| Value::String(raw.to_string()))
    });

    (kind.to_string(), default)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn normalize_type(kind: &str) -> &str {
    match kind.to_lowercase().as_str() {
        "text" | "string" => "string",
        "int" | "integer" => "integer",
        "float" | "number" => "number",
        "bool" | "boolean" => "boolean",
        "object" => "object",
        "array" => "array",
        _ => kind,
    }
}

/// Best-effort example object for the top-level `properties` of a schema.
/// Returns `None` when the schema is not JSON or has no properties.
pub fn example_from_schema(schema: &str) -> Option<String> {
    let schema: Value = serde_json::from_str(schema).ok()?;
    let properties = schema.get("properties")?.as_object()?;

    let example: Map<String, Value> = properties
        .iter()
        .map(|(name, property)| (name.clone(), example_value(property)))
        .collect();

    serde_json::to_string(&Value::Object(example)).ok()
}

fn example_value(property: &Value) -> Value {
    let kind = property.get("type").and_then(Value::as_str);
    match kind {
        Some("string") => json!("example"),
        Some("number") | Some("integer") => json!(0),
        Some("boolean") => json!(true),
        Some("object") => json!({}),
        Some("array") => {
            let item_kind = property
                .get("items")
                .and_then(|items| items.get("type"))
                .and_then(Value::as_str);
            match item_kind {
                Some("string") => json!(["example"]),
                Some("number") | Some("integer") => json!([0]),
                Some("boolean") => json!([true]),
                _ => json!([]),
            }
        }
        _ => Value::Null,
    }
}
