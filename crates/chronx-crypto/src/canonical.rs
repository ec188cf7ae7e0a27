//! Canonical, key-sorted JSON rendering used as the input to every hash and
//! signature in the system. Two implementations that agree on this function
//! agree on every `tx_id`, block `hash`, and `state_root`.

use serde_json::Value;

/// Render `value` as a byte-identical string: object keys sorted
/// lexicographically, arrays left in their given order, no insignificant
/// whitespace. Safe to call on arbitrarily nested structures.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        canonical_json(&Value::String(k.clone())),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        Value::String(s) => serde_json::to_string(s).expect("string serialization is infallible"),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Serialize `item` to JSON, drop the named top-level fields (signatures and
/// embedded public keys never participate in the signable/hashable form),
/// and return the canonical string.
pub fn canonical_form<T: serde::Serialize>(item: &T, exclude: &[&str]) -> String {
    let mut value = serde_json::to_value(item).expect("value is JSON-serializable");
    if let Value::Object(map) = &mut value {
        for field in exclude {
            map.remove(*field);
        }
    }
    canonical_json(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn arrays_keep_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonical_json(&v), "[3,1,2]");
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 3});
        assert_eq!(canonical_json(&v), r#"{"a":3,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn excluded_fields_are_dropped() {
        #[derive(serde::Serialize)]
        struct T {
            a: u32,
            signature: String,
        }
        let t = T { a: 1, signature: "sig".into() };
        assert_eq!(canonical_form(&t, &["signature"]), r#"{"a":1}"#);
    }
}
