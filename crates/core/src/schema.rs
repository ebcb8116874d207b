//! Structured-output contract for gateway targets.
//!
//! A type the reasoning gateway can be asked to produce declares a schema
//! name and a JSON Schema describing its wire shape. Schemas are written for
//! strict mode: every property is listed in `required`, optional values are
//! nullable, and no additional properties are allowed.

use serde::Serialize;
use serde::de::DeserializeOwned;

pub trait StructuredOutput: DeserializeOwned + Serialize + Send + Sized {
    /// Schema name reported to the backend.
    const NAME: &'static str;

    /// JSON Schema for the reply.
    fn json_schema() -> serde_json::Value;
}

/// A strict object schema over the given properties, all of them required.
pub fn strict_object(properties: serde_json::Value) -> serde_json::Value {
    let required: Vec<String> = properties
        .as_object()
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}
