use flagkit_core::flag::context::EvaluationContext;
use flagkit_core::flag::rule::{Condition, ConditionValue, PercentageRollout};
use flagkit_core::types::ComparisonOperator;
use serde_json::{Number, Value};

use super::compare::{contains, ordering, strict_eq};
use crate::hash;

/// Evaluate one leaf condition. Anything unresolvable or malformed is `false`.
pub fn evaluate_condition(condition: &Condition, context: &EvaluationContext) -> bool {
    use ComparisonOperator as Op;

    if let (Op::Eq, ConditionValue::Percentage(rollout)) = (condition.operator, &condition.value) {
        return in_rollout(rollout, context);
    }

    let Some(actual) = context.resolve(&condition.field) else {
        return false;
    };

    match (condition.operator, &condition.value) {
        (_, ConditionValue::Percentage(_)) => false,
        (Op::Eq, ConditionValue::Scalar(expected)) => strict_eq(actual, expected),
        (Op::NotEq, ConditionValue::Scalar(expected)) => !strict_eq(actual, expected),
        (Op::NotEq, ConditionValue::List(items)) => !contains(items, actual),
        (Op::In, ConditionValue::List(items)) => contains(items, actual),
        (Op::NotIn, ConditionValue::List(items)) => !contains(items, actual),
        (Op::Gt, ConditionValue::Scalar(expected)) => {
            ordering(actual, expected).is_some_and(|o| o.is_gt())
        }
        (Op::Lt, ConditionValue::Scalar(expected)) => {
            ordering(actual, expected).is_some_and(|o| o.is_lt())
        }
        (Op::Gte, ConditionValue::Scalar(expected)) => {
            ordering(actual, expected).is_some_and(|o| o.is_ge())
        }
        (Op::Lte, ConditionValue::Scalar(expected)) => {
            ordering(actual, expected).is_some_and(|o| o.is_le())
        }
        _ => false,
    }
}

/// Percentage rollout keyed on `userId`.
fn in_rollout(rollout: &PercentageRollout, context: &EvaluationContext) -> bool {
    let Some(user_id) = context.user_id().and_then(user_key) else {
        return false;
    };
    let seed = hash::parse_seed(rollout.seed.as_deref().unwrap_or("0"));
    f64::from(hash::bucket(&user_id, seed)) <= rollout.percentage
}

fn user_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(number_key(n)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Number formatted the way a JavaScript client stringifies it, so `7.0`
/// and `7` hash to the same bucket.
fn number_key(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    let f = n.as_f64().unwrap_or_default();
    if f == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&f.abs()) {
        return f.to_string();
    }
    // exponent form: JS always signs the exponent
    let formatted = format!("{f:e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => formatted,
    }
}
