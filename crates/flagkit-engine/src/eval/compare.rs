use std::cmp::Ordering;

use serde_json::Value;

/// Strict equality between two scalars. Numbers compare by value regardless
/// of integer/float representation; arrays and objects never compare equal.
pub(crate) fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => false,
    }
}

pub(crate) fn contains(items: &[Value], needle: &Value) -> bool {
    items.iter().any(|item| strict_eq(item, needle))
}

/// Relational ordering. Two strings compare by UTF-16 code units; any other
/// pair is compared numerically after coercion. `None` when either side has
/// no numeric meaning.
pub(crate) fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.encode_utf16().cmp(y.encode_utf16()));
    }
    let x = to_number(a)?;
    let y = to_number(b)?;
    x.partial_cmp(&y)
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}
