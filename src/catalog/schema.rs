//! A small subset of JSON Schema, enough for tool and validator inputs.
//!
//! Supported keywords: `type` (string or list of strings), `required`,
//! `properties` (recursively) and `enum`. Unknown keywords are ignored.

use serde_json::Value;

/// Check `value` against `schema`, returning every violation found.
/// An empty vector means the value conforms.
pub fn check(schema: &Value, value: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    check_at("params", schema, value, &mut errors);
    errors
}

fn check_at(path: &str, schema: &Value, value: &Value, errors: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, value)) {
            errors.push(format!(
                "'{path}' must be {}, got {}",
                allowed.join(" or "),
                type_name(value)
            ));
            return;
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum")
        && !options.contains(value)
    {
        errors.push(format!("'{path}' must be one of {}", Value::Array(options.clone())));
    }

    let Some(object) = value.as_object() else {
        return;
    };

    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                errors.push(format!("missing required property '{path}.{key}'"));
            }
        }
    }

    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (key, sub_schema) in properties {
            if let Some(sub_value) = object.get(key) {
                check_at(&format!("{path}.{key}"), sub_schema, sub_value, errors);
            }
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
