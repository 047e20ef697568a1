//! `{name}` placeholder substitution
//!
//! Total: unresolved placeholders stay as literal text.

use crate::context::{lookup, render};
use cadence_scenario::template::{single_placeholder, PLACEHOLDER};
use regex::Captures;
use serde_json::{Map, Value};

/// Substitute every placeholder inside `value`, recursing into mappings and
/// sequences
///
/// A string consisting of exactly one resolvable placeholder takes the
/// referenced value with its type intact (`"{count}"` → `3`).
#[must_use]
pub fn substitute(value: &Value, context: &Map<String, Value>) -> Value {
    match value {
        Value::String(text) => {
            if let Some(found) = single_placeholder(text).and_then(|path| lookup(context, path)) {
                return found.clone();
            }
            Value::String(render_template(text, context))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, context)).collect()),
        Value::Object(map) => Value::Object(substitute_params(map, context)),
        other => other.clone(),
    }
}

/// Substitute a parameter bag
#[must_use]
pub fn substitute_params(params: &Map<String, Value>, context: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), substitute(v, context)))
        .collect()
}

/// Replace placeholders in text with rendered context values
#[must_use]
pub fn render_template(text: &str, context: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match lookup(context, &caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> Map<String, Value> {
        match json!({
            "name": "Ada",
            "count": 3,
            "user": {"email": "ada@example.com", "roles": ["admin"]},
            "flag": true
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn nested_walk() {
        let params = json!({
            "greeting": "Hello {name}, you have {count} items",
            "count": "{count}",
            "to": ["{user.email}", "static"],
            "meta": {"role": "{user.roles.0}", "n": 7, "flag": "{flag}"}
        });
        assert_eq!(
            substitute(&params, &ctx()),
            json!({
                "greeting": "Hello Ada, you have 3 items",
                "count": 3,
                "to": ["ada@example.com", "static"],
                "meta": {"role": "admin", "n": 7, "flag": true}
            })
        );
    }

    #[test]
    fn unresolved_placeholders_stay_literal() {
        assert_eq!(
            substitute(&json!("Dear {missing}, from {name}"), &ctx()),
            json!("Dear {missing}, from Ada")
        );
        assert_eq!(substitute(&json!("{missing}"), &ctx()), json!("{missing}"));
        assert_eq!(substitute(&json!("{ not a placeholder }"), &ctx()), json!("{ not a placeholder }"));
    }

    #[test]
    fn non_string_values_render_as_json_inside_text() {
        assert_eq!(
            render_template("user={user}", &ctx()),
            r#"user={"email":"ada@example.com","roles":["admin"]}"#
        );
    }
}
