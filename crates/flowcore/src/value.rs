//! Helpers over `serde_json::Value`, the dynamic value type carried by
//! node parameters, upstream input and results.

pub use serde_json::{Map, Value};

/// Parameter map of a node instance.
pub type Parameters = Map<String, Value>;

/// Loose presence check used by parameter validation.
///
/// `null`, `false`, `0`, `""` and empty arrays are all "missing".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Short name of a value's JSON type, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a value as plain text: strings verbatim, everything else as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a number, accepting numeric strings as well.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_values_count_as_missing() {
        for value in [json!(null), json!(""), json!(0), json!(false), json!([])] {
            assert!(!is_truthy(&value), "{value} should be falsy");
        }
        for value in [json!("x"), json!(1), json!(true), json!({}), json!([0])] {
            assert!(is_truthy(&value), "{value} should be truthy");
        }
    }

    #[test]
    fn stringify_keeps_strings_verbatim() {
        assert_eq!(stringify(&json!("abc")), "abc");
        assert_eq!(stringify(&json!(1)), "1");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn numbers_parse_from_strings() {
        assert_eq!(as_number(&json!("42")), Some(42.0));
        assert_eq!(as_number(&json!(2.5)), Some(2.5));
        assert_eq!(as_number(&json!("x")), None);
    }
}
