// Structural validation of tool arguments against an inputSchema

use crate::error::{ToolError, ToolResult};
use serde_json::Value;

/// Check `arguments` against an object schema of the form
/// `{type: "object", properties: {..}, required: [..]}`.
///
/// Covers required fields, JSON types and `enum` membership. Fields the
/// schema does not describe are passed through untouched, and an explicit
/// `null` on an optional field counts as absent.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> ToolResult<()> {
    let args = arguments
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments("expected an object".to_string()))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match args.get(field) {
                None | Some(Value::Null) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required field '{}'",
                        field
                    )))
                }
                Some(_) => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (field, value) in args {
        if value.is_null() {
            continue;
        }
        let Some(property) = properties.get(field) else {
            continue;
        };

        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            if !matches_type(expected, value) {
                return Err(ToolError::InvalidArguments(format!(
                    "field '{}' must be {} {}",
                    field,
                    article(expected),
                    expected
                )));
            }
        }

        if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let options = allowed
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ToolError::InvalidArguments(format!(
                    "field '{}' must be one of: {}",
                    field, options
                )));
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        // Unknown type keywords are not ours to reject
        _ => true,
    }
}

fn article(type_name: &str) -> &'static str {
    match type_name.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "days": {"type": "number", "default": 14},
                "state": {"type": "string", "enum": ["open", "closed", "all"]}
            },
            "required": ["query"]
        })
    }

    #[test]
    fn test_accepts_well_formed_arguments() {
        let schema = search_schema();
        assert!(validate_arguments(&schema, &json!({"query": "launch", "days": 7})).is_ok());
        assert!(validate_arguments(&schema, &json!({"query": "launch", "extra": true})).is_ok());
        assert!(validate_arguments(&schema, &json!({"query": "launch", "days": null})).is_ok());
    }

    #[test]
    fn test_rejects_missing_required_field() {
        let err = validate_arguments(&search_schema(), &json!({"days": 7})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid arguments: missing required field 'query'");

        let err = validate_arguments(&search_schema(), &json!({"query": null})).unwrap_err();
        assert!(err.to_string().contains("'query'"));
    }

    #[test]
    fn test_rejects_wrong_type() {
        let err = validate_arguments(&search_schema(), &json!({"query": "x", "days": "seven"}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid arguments: field 'days' must be a number");
    }

    #[test]
    fn test_rejects_value_outside_enum() {
        let err = validate_arguments(&search_schema(), &json!({"query": "x", "state": "merged"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid arguments: field 'state' must be one of: open, closed, all"
        );
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(validate_arguments(&search_schema(), &json!([1, 2])).is_err());
        assert!(validate_arguments(&search_schema(), &json!("query")).is_err());
    }

    #[test]
    fn test_schema_without_properties_accepts_any_object() {
        let schema = json!({"type": "object"});
        assert!(validate_arguments(&schema, &json!({"anything": 1})).is_ok());
    }
}
