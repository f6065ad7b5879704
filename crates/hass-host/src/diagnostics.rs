//! Diagnostics helpers

use std::collections::HashSet;

use serde_json::Value;

pub const REDACTED: &str = "**REDACTED**";

/// Replace the value of every object key in `to_redact`, at any depth
pub fn redact_data(data: &Value, to_redact: &HashSet<&str>) -> Value {
    match data {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = if to_redact.contains(key.as_str()) && !value.is_null() {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_data(value, to_redact)
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_data(v, to_redact)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_nested_keys() {
        let data = json!({
            "title": "Front Door",
            "data": {"key": "secret", "slot": 1, "nested": [{"key": "x"}]},
            "unset": {"key": null},
        });

        let redacted = redact_data(&data, &HashSet::from(["key"]));
        assert_eq!(redacted["title"], "Front Door");
        assert_eq!(redacted["data"]["key"], REDACTED);
        assert_eq!(redacted["data"]["slot"], 1);
        assert_eq!(redacted["data"]["nested"][0]["key"], REDACTED);
        assert_eq!(redacted["unset"]["key"], Value::Null);
    }

    #[test]
    fn test_empty_set_is_identity() {
        let data = json!({"lock_entities": ["lock.front_door"]});
        assert_eq!(redact_data(&data, &HashSet::new()), data);
    }
}
