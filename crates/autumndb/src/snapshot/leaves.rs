//! Extraction of the JSON leaf-value byte sequence summarized by the SBF and PH2.

use serde_json::Value;

/// Recurses into `value`, appending the UTF-8 encoding of every primitive
/// leaf (string, number, bool, null) in JSON iteration order. Object keys
/// and array/object structural tokens are excluded — only leaf values
/// contribute bytes.
pub fn leaf_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    collect_leaf_bytes(value, &mut out);
    out
}

fn collect_leaf_bytes(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => out.extend_from_slice(s.as_bytes()),
        Value::Array(items) => {
            for item in items {
                collect_leaf_bytes(item, out);
            }
        },
        Value::Object(map) => {
            for nested in map.values() {
                collect_leaf_bytes(nested, out);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_of_flat_object_concatenate_values_in_key_order() {
        let value = json!({"b": 2, "a": 1});
        // serde_json::Value's default map is a BTreeMap, so key order is sorted.
        assert_eq!(leaf_bytes(&value), b"12");
    }

    #[test]
    fn nested_arrays_and_objects_recurse() {
        let value = json!({"items": [1, "two", {"three": 3}]});
        assert_eq!(leaf_bytes(&value), b"1two3");
    }

    #[test]
    fn keys_never_contribute_bytes() {
        let value = json!({"key_with_digits_123": "x"});
        assert_eq!(leaf_bytes(&value), b"x");
    }

    #[test]
    fn incidental_whitespace_between_tokens_does_not_affect_leaf_bytes() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str("{\n  \"a\": 1,\n  \"b\": 2\n}").unwrap();
        assert_eq!(leaf_bytes(&a), leaf_bytes(&b));
    }

    #[test]
    fn differently_formatted_but_numerically_equal_leaves_diverge() {
        // arbitrary_precision keeps a Number's original text instead of
        // renormalizing it, so "1.50" and "1.5" remain textually distinct
        // leaves even though they parse to the same numeric value.
        let a: Value = serde_json::from_str(r#"{"a":1.50}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":1.5}"#).unwrap();
        assert_ne!(leaf_bytes(&a), leaf_bytes(&b));
    }
}
