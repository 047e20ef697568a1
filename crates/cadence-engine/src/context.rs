//! Session context helpers: path lookup, rendering, truthiness, redaction

use serde_json::{Map, Value};

/// Replacement for redacted values
pub const REDACTED: &str = "[redacted]";

/// Look up a dotted path (`user.address.city`, `items.0`)
///
/// Mapping segments are keys; sequence segments are zero-based indices.
#[must_use]
pub fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = context.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Text form used when a value is spliced into a string
///
/// Strings are inserted raw; everything else as compact JSON.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness for single-operand conditions
///
/// `null`, `false`, `0`, `""`, `"false"`, `"0"`, `[]` and `{}` are false.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Copy of `context` with sensitive values masked, at any depth
///
/// A key is sensitive when it contains one of `keys`, ignoring case.
#[must_use]
pub fn redact(context: &Map<String, Value>, keys: &[String]) -> Map<String, Value> {
    if keys.is_empty() {
        return context.clone();
    }
    let needles: Vec<String> = keys.iter().map(|k| k.to_lowercase()).collect();
    redact_map(context, &needles)
}

fn redact_map(map: &Map<String, Value>, needles: &[String]) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            let value = if needles.iter().any(|n| lower.contains(n.as_str())) {
                Value::String(REDACTED.to_string())
            } else {
                redact_value(v, needles)
            };
            (k.clone(), value)
        })
        .collect()
}

fn redact_value(value: &Value, needles: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map, needles)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_value(v, needles)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn nested_lookup() {
        let c = ctx(json!({"user": {"name": "Ada", "tags": ["a", "b"]}, "n": 3}));
        assert_eq!(lookup(&c, "user.name"), Some(&json!("Ada")));
        assert_eq!(lookup(&c, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&c, "user.tags.9"), None);
        assert_eq!(lookup(&c, "n.x"), None);
        assert_eq!(lookup(&c, "missing"), None);
    }

    #[test]
    fn rendering() {
        assert_eq!(render(&json!("plain")), "plain");
        assert_eq!(render(&json!(4.5)), "4.5");
        assert_eq!(render(&json!([1, 2])), "[1,2]");
        assert_eq!(render(&Value::Null), "null");
    }

    #[test]
    fn truthiness() {
        for v in [json!(null), json!(false), json!(0), json!(""), json!("false"), json!([]), json!({})] {
            assert!(!truthy(&v), "{v} should be false");
        }
        for v in [json!(true), json!(1), json!("yes"), json!([0]), json!({"a": 1})] {
            assert!(truthy(&v), "{v} should be true");
        }
    }

    #[test]
    fn redaction_is_deep_and_case_insensitive() {
        let c = ctx(json!({
            "Password": "hunter2",
            "profile": {"api_key": "k", "name": "Ada"},
            "items": [{"refresh_token": "t"}],
            "visible": 1
        }));
        let r = redact(&c, &["password".into(), "token".into(), "api_key".into()]);
        assert_eq!(
            Value::Object(r),
            json!({
                "Password": REDACTED,
                "profile": {"api_key": REDACTED, "name": "Ada"},
                "items": [{"refresh_token": REDACTED}],
                "visible": 1
            })
        );
    }
}
