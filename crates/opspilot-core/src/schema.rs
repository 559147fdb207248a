//! Minimal JSON-schema checks for tool arguments and outputs.
//!
//! Only the subset tools actually declare is supported: `type`, `enum`,
//! `required`, `properties`, `additionalProperties: false`, `items` and
//! numeric `minimum` / `maximum`. A `null` schema accepts anything.

use serde_json::{Map, Value};

/// Validate `value` against `schema`, reporting the first violation as
/// `$.path reason`.
pub fn validate(value: &Value, schema: &Value) -> Result<(), String> {
    if schema.is_null() {
        return Ok(());
    }
    validate_at(value, schema, "$")
}

/// Names listed under the schema's top-level `required`.
pub fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Declared properties, if any.
pub fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

/// The declared `type` of a top-level property, when it is a single string.
pub fn property_type<'a>(schema: &'a Value, key: &str) -> Option<&'a str> {
    properties(schema)?
        .get(key)?
        .get("type")
        .and_then(Value::as_str)
}

/// Compact type label for prompts: `string`, `integer|null`, `any`.
pub fn type_hint(schema: &Value) -> String {
    match schema.get("type") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if names.is_empty() {
                "any".to_string()
            } else {
                names.join("|")
            }
        }
        _ => "any".to_string(),
    }
}

fn validate_at(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| format!("schema at '{}' must be an object", path))?;

    if let Some(type_spec) = schema_obj.get("type") {
        check_type(value, type_spec, path)?;
    }

    if let Some(variants) = schema_obj.get("enum").and_then(Value::as_array) {
        if !variants.iter().any(|candidate| candidate == value) {
            return Err(format!("{} is not one of the allowed enum values", path));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema_obj.get("minimum").and_then(Value::as_f64) {
            if number < min {
                return Err(format!("{} must be >= {}", path, min));
            }
        }
        if let Some(max) = schema_obj.get("maximum").and_then(Value::as_f64) {
            if number > max {
                return Err(format!("{} must be <= {}", path, max));
            }
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{} must be an object for required fields", path))?;
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(format!("{} missing required field '{}'", path, key));
            }
        }
    }

    if let Some(props) = schema_obj.get("properties").and_then(Value::as_object) {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{} must be an object for properties validation", path))?;
        for (key, child_schema) in props {
            if let Some(child) = object.get(key) {
                validate_at(child, child_schema, &format!("{}.{}", path, key))?;
            }
        }
        if schema_obj.get("additionalProperties").and_then(Value::as_bool) == Some(false) {
            if let Some(extra) = object.keys().find(|key| !props.contains_key(*key)) {
                return Err(format!("{} contains unknown field '{}'", path, extra));
            }
        }
    }

    if let Some(item_schema) = schema_obj.get("items") {
        let array = value
            .as_array()
            .ok_or_else(|| format!("{} must be an array for items validation", path))?;
        for (idx, item) in array.iter().enumerate() {
            validate_at(item, item_schema, &format!("{}[{}]", path, idx))?;
        }
    }

    Ok(())
}

fn type_matches(type_name: &str, value: &Value) -> bool {
    match type_name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn check_type(value: &Value, type_spec: &Value, path: &str) -> Result<(), String> {
    match type_spec {
        Value::String(type_name) if type_matches(type_name, value) => Ok(()),
        Value::String(type_name) => Err(format!("{} expected type '{}'", path, type_name)),
        Value::Array(types) => {
            if types
                .iter()
                .filter_map(Value::as_str)
                .any(|name| type_matches(name, value))
            {
                Ok(())
            } else {
                Err(format!("{} did not match any allowed types", path))
            }
        }
        _ => Err(format!("{} schema.type must be string or array", path)),
    }
}
