//! Schema Inference
//!
//! Single-pass, sample-driven JSON schema inference. Arrays are inferred from
//! their first few items; there is no cross-sample merging beyond the array
//! union fallback.

use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Number of array items sampled during inference
pub const ARRAY_SAMPLE_SIZE: usize = 5;
/// Maximum number of alternatives in a mixed-array union
pub const MAX_UNION_SIZE: usize = 3;
/// Strings at or above this length get no length bounds
const MAX_BOUNDED_STRING_LEN: usize = 1000;

/// Recognised string formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Uuid,
    DateTime,
    Date,
    Uri,
    Ipv4,
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::Email => "email",
            StringFormat::Uuid => "uuid",
            StringFormat::DateTime => "date-time",
            StringFormat::Date => "date",
            StringFormat::Uri => "uri",
            StringFormat::Ipv4 => "ipv4",
        }
    }
}

/// Recursive schema descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum InferredSchema {
    /// Unconstrained (`{}`), used for items of an empty array
    Any,
    Null,
    Boolean,
    Integer,
    Number,
    String {
        format: Option<StringFormat>,
        pattern: Option<String>,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Array {
        items: Box<InferredSchema>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    /// `oneOf` over differently-typed array samples
    Union(Vec<InferredSchema>),
    Object {
        properties: BTreeMap<String, InferredSchema>,
        required: Vec<String>,
    },
}

static FORMAT_RULES: OnceLock<Vec<(StringFormat, Regex)>> = OnceLock::new();
static DIGITS: OnceLock<Regex> = OnceLock::new();

fn format_rules() -> &'static Vec<(StringFormat, Regex)> {
    FORMAT_RULES.get_or_init(|| {
        vec![
            (
                StringFormat::Email,
                Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("invalid email format regex"),
            ),
            (
                StringFormat::Uuid,
                Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").expect("invalid uuid format regex"),
            ),
            (
                StringFormat::DateTime,
                Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?$").expect("invalid date-time format regex"),
            ),
            (
                StringFormat::Date,
                Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("invalid date format regex"),
            ),
            (
                StringFormat::Uri,
                Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$").expect("invalid uri format regex"),
            ),
            (
                StringFormat::Ipv4,
                Regex::new(r"^(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)$").expect("invalid ipv4 format regex"),
            ),
        ]
    })
}

fn digits() -> &'static Regex {
    DIGITS.get_or_init(|| Regex::new(r"^\d+$").expect("invalid digit regex"))
}

/// Infer a schema from a single sample value.
pub fn infer(value: &Value) -> InferredSchema {
    match value {
        Value::Null => InferredSchema::Null,
        Value::Bool(_) => InferredSchema::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                InferredSchema::Integer
            } else {
                InferredSchema::Number
            }
        }
        Value::String(s) => infer_string(s),
        Value::Array(items) => infer_array(items),
        Value::Object(map) => infer_object(map),
    }
}

fn infer_string(s: &str) -> InferredSchema {
    if let Some((format, _)) = format_rules().iter().find(|(_, re)| re.is_match(s)) {
        return InferredSchema::String {
            format: Some(*format),
            pattern: None,
            min_length: None,
            max_length: None,
        };
    }
    if digits().is_match(s) {
        return InferredSchema::String {
            format: None,
            pattern: Some(r"^\d+$".to_string()),
            min_length: None,
            max_length: None,
        };
    }
    let len = s.chars().count();
    let (min_length, max_length) = if len > 0 && len < MAX_BOUNDED_STRING_LEN {
        (Some(len), Some(len * 2))
    } else {
        (None, None)
    };
    InferredSchema::String {
        format: None,
        pattern: None,
        min_length,
        max_length,
    }
}

fn infer_array(items: &[Value]) -> InferredSchema {
    if items.is_empty() {
        return InferredSchema::Array {
            items: Box::new(InferredSchema::Any),
            min_items: None,
            max_items: None,
        };
    }

    let sample = &items[..items.len().min(ARRAY_SAMPLE_SIZE)];
    let schemas: Vec<InferredSchema> = sample.iter().map(infer).collect();
    let first_type = json_type_name(&sample[0]);
    let homogeneous = sample.iter().all(|v| json_type_name(v) == first_type);

    let item_schema = if homogeneous {
        schemas.into_iter().next().unwrap_or(InferredSchema::Any)
    } else {
        let mut union: Vec<InferredSchema> = Vec::new();
        for schema in schemas {
            if union.len() >= MAX_UNION_SIZE {
                break;
            }
            if !union.contains(&schema) {
                union.push(schema);
            }
        }
        InferredSchema::Union(union)
    };

    InferredSchema::Array {
        items: Box::new(item_schema),
        min_items: Some(0),
        max_items: Some(sample.len() * 2),
    }
}

fn infer_object(map: &Map<String, Value>) -> InferredSchema {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();
    for (key, value) in map {
        properties.insert(key.clone(), infer(value));
        if !value.is_null() {
            required.push(key.clone());
        }
    }
    InferredSchema::Object {
        properties,
        required,
    }
}

/// Top-level JSON type name; integers and floats are both "number".
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl InferredSchema {
    /// OpenAPI / JSON Schema rendering
    pub fn to_json(&self) -> Value {
        match self {
            InferredSchema::Any => json!({}),
            InferredSchema::Null => json!({"nullable": true}),
            InferredSchema::Boolean => json!({"type": "boolean"}),
            InferredSchema::Integer => json!({"type": "integer"}),
            InferredSchema::Number => json!({"type": "number"}),
            InferredSchema::String {
                format,
                pattern,
                min_length,
                max_length,
            } => {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("string"));
                if let Some(f) = format {
                    obj.insert("format".into(), json!(f.as_str()));
                }
                if let Some(p) = pattern {
                    obj.insert("pattern".into(), json!(p));
                }
                if let Some(n) = min_length {
                    obj.insert("minLength".into(), json!(n));
                }
                if let Some(n) = max_length {
                    obj.insert("maxLength".into(), json!(n));
                }
                Value::Object(obj)
            }
            InferredSchema::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("array"));
                obj.insert("items".into(), items.to_json());
                if let Some(n) = min_items {
                    obj.insert("minItems".into(), json!(n));
                }
                if let Some(n) = max_items {
                    obj.insert("maxItems".into(), json!(n));
                }
                Value::Object(obj)
            }
            InferredSchema::Union(options) => {
                json!({"oneOf": options.iter().map(|o| o.to_json()).collect::<Vec<_>>()})
            }
            InferredSchema::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                let mut obj = Map::new();
                obj.insert("type".into(), json!("object"));
                obj.insert("properties".into(), Value::Object(props));
                if !required.is_empty() {
                    obj.insert("required".into(), json!(required));
                }
                Value::Object(obj)
            }
        }
    }

    /// OpenAPI type name of this schema, if it has exactly one
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            InferredSchema::Boolean => Some("boolean"),
            InferredSchema::Integer => Some("integer"),
            InferredSchema::Number => Some("number"),
            InferredSchema::String { .. } => Some("string"),
            InferredSchema::Array { .. } => Some("array"),
            InferredSchema::Object { .. } => Some("object"),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, InferredSchema::Object { .. })
    }
}
