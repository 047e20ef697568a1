//! Branch condition evaluation
//!
//! The comparator is total. Coercion order:
//! 1. Both operands numeric (numbers or numeric strings): compare as `f64`
//! 2. Both operands scalar (string, number, bool): case-sensitive
//!    comparison of their text forms
//! 3. Otherwise (`null`, sequences, mappings involved) coercion fails: `!=`
//!    is `true`, every other operator is `false`

use crate::context::{lookup, truthy};
use crate::substitute::render_template;
use cadence_scenario::{CompareOp, Condition, Operand};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Numeric view of a value, if it has one
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn holds(ordering: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

/// Compare two values; never panics
#[must_use]
pub fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
        return a.partial_cmp(&b).is_some_and(|o| holds(o, op));
    }
    if let (Some(a), Some(b)) = (as_text(left), as_text(right)) {
        return holds(a.cmp(&b), op);
    }
    matches!(op, CompareOp::Ne)
}

/// Current value of an operand
///
/// Unbound references are `null`; unbound bare words are the word itself.
#[must_use]
pub fn operand_value(operand: &Operand, context: &Map<String, Value>) -> Value {
    match operand {
        Operand::Literal(value) => value.clone(),
        Operand::Reference(path) => lookup(context, path).cloned().unwrap_or(Value::Null),
        Operand::Template(text) => Value::String(render_template(text, context)),
        Operand::Word(word) => lookup(context, word)
            .cloned()
            .unwrap_or_else(|| Value::String(word.clone())),
    }
}

/// Evaluate a condition against a context
#[must_use]
pub fn evaluate(condition: &Condition, context: &Map<String, Value>) -> bool {
    match condition {
        Condition::Compare { left, op, right } => compare(
            &operand_value(left, context),
            *op,
            &operand_value(right, context),
        ),
        Condition::Truthy(operand) => truthy(&operand_value(operand, context)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const OPS: [CompareOp; 6] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ];

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn eval(text: &str, context: &Map<String, Value>) -> bool {
        evaluate(&Condition::parse(text).unwrap(), context)
    }

    #[test]
    fn numeric_coercion_first() {
        assert!(compare(&json!("5"), CompareOp::Eq, &json!(5)));
        assert!(compare(&json!("10"), CompareOp::Gt, &json!("9")));
        assert!(compare(&json!(2.5), CompareOp::Lt, &json!(" 3 ")));
        assert!(!compare(&json!(5), CompareOp::Gt, &json!(5)));
    }

    #[test]
    fn string_fallback_is_case_sensitive() {
        assert!(compare(&json!("abc"), CompareOp::Ne, &json!("ABC")));
        assert!(compare(&json!("apple"), CompareOp::Lt, &json!("banana")));
        assert!(compare(&json!(true), CompareOp::Eq, &json!("true")));
        assert!(compare(&json!("5"), CompareOp::Ne, &json!("five")));
        assert!(!compare(&json!("5"), CompareOp::Eq, &json!("five")));
    }

    #[test]
    fn uncoercible_operands_are_only_unequal() {
        let pairs = [
            (Value::Null, Value::Null),
            (json!([1]), json!([1])),
            (json!({"a": 1}), json!({"a": 1})),
            (json!({"a": 1}), json!("a")),
            (json!(null), json!(0)),
        ];
        for (a, b) in &pairs {
            assert!(compare(a, CompareOp::Ne, b), "{a} != {b}");
            for op in [CompareOp::Eq, CompareOp::Lt, CompareOp::Le, CompareOp::Gt, CompareOp::Ge] {
                assert!(!compare(a, op, b), "{a} {op:?} {b}");
            }
        }
    }

    #[test]
    fn branch_example_x_equals_five() {
        let c = ctx(json!({"x": 5}));
        assert!(!eval("{x} > 5", &c));
        assert!(!eval("{x} < 2", &c));
        assert!(eval("{x} >= 5", &c));
    }

    #[test]
    fn operand_forms() {
        let c = ctx(json!({"status": "open", "user": {"name": "Ada"}, "items": []}));
        assert!(eval("status == \"open\"", &c));
        assert!(eval("status == 'open'", &c));
        assert!(eval("{user.name} == \"Ada\"", &c));
        assert!(eval("\"{user.name}!\" == \"Ada!\"", &c));
        assert!(eval("closed != status", &c));
        assert!(!eval("{missing}", &c));
        assert!(!eval("{items}", &c));
        assert!(!eval("{missing} == null", &c));
        assert!(eval("{missing} != null", &c));
        assert!(eval("{user}", &c));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
            "\\PC{0,8}".prop_map(Value::String),
            "-?[0-9]{1,4}(\\.[0-9]{1,2})?".prop_map(Value::String),
        ];
        leaf.prop_recursive(2, 8, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,3}", inner, 0..3)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_never_panics_and_ne_negates_eq(a in arb_value(), b in arb_value()) {
            for op in OPS {
                let _ = compare(&a, op, &b);
            }
            prop_assert_eq!(
                compare(&a, CompareOp::Ne, &b),
                !compare(&a, CompareOp::Eq, &b)
            );
        }

        #[test]
        fn prop_non_numeric_strings_compare_as_text(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
            let (va, vb) = (json!(a.clone()), json!(b.clone()));
            prop_assert_eq!(compare(&va, CompareOp::Lt, &vb), a < b);
            prop_assert_eq!(compare(&va, CompareOp::Eq, &vb), a == b);
        }

        #[test]
        fn prop_numeric_strings_match_numbers(n in -10_000i64..10_000) {
            prop_assert!(compare(&json!(n.to_string()), CompareOp::Eq, &json!(n)));
            prop_assert!(compare(&json!(n), CompareOp::Lt, &json!((n + 1).to_string())));
        }
    }
}
