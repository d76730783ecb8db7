//! Argument checks against a tool's declared JSON schema.
//!
//! Covers the subset the canvas tools declare: object `properties` with
//! `type`, `enum`, array `items`, and `required`. Unknown keywords are ignored.

use serde_json::Value;

/// Validate `args` against `schema`, returning a message suitable for the model.
pub fn validate(schema: &Value, args: &Value) -> Result<(), String> {
    check_value(schema, args, "arguments")
}

fn check_value(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            return Err(format!("{path}: expected {expected}, got {}", type_name(value)));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(format!("{path}: must be one of {}", options.join(", ")));
        }
    }

    if let (Some(items), Some(elements)) = (schema.get("items"), value.as_array()) {
        for (i, element) in elements.iter().enumerate() {
            check_value(items, element, &format!("{path}[{i}]"))?;
        }
    }

    if let Some(object) = value.as_object() {
        for name in schema.get("required").and_then(Value::as_array).into_iter().flatten() {
            let Some(name) = name.as_str() else { continue };
            if object.get(name).map_or(true, Value::is_null) {
                return Err(format!("{path}: missing required field `{name}`"));
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop_schema) in properties {
                match object.get(name) {
                    None | Some(Value::Null) => {}
                    Some(v) => check_value(prop_schema, v, name)?,
                }
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
