use flagkit_core::flag::context::EvaluationContext;
use flagkit_core::flag::rule::{Rule, RuleGroup, MAX_RULE_DEPTH};
use flagkit_core::types::LogicalOperator;

use super::condition::evaluate_condition;

/// Evaluate a rule tree node.
///
/// Empty groups are `false`. `AND` / `OR` short-circuit in child order.
/// Unknown node types, unknown logical operators, and groups nested deeper
/// than [`MAX_RULE_DEPTH`] are `false`.
pub fn evaluate_rule(rule: &Rule, context: &EvaluationContext) -> bool {
    evaluate_at(rule, context, 0)
}

/// Evaluate a root group, as attached to an environment.
pub fn evaluate_group(group: &RuleGroup, context: &EvaluationContext) -> bool {
    evaluate_group_at(group, context, 1)
}

fn evaluate_at(rule: &Rule, context: &EvaluationContext, depth: usize) -> bool {
    match rule {
        Rule::Condition(condition) => evaluate_condition(condition, context),
        Rule::Group(group) => evaluate_group_at(group, context, depth + 1),
        Rule::Unknown => false,
    }
}

fn evaluate_group_at(group: &RuleGroup, context: &EvaluationContext, depth: usize) -> bool {
    if depth > MAX_RULE_DEPTH || group.rules.is_empty() {
        return false;
    }
    match group.operator {
        LogicalOperator::And => group
            .rules
            .iter()
            .all(|rule| evaluate_at(rule, context, depth)),
        LogicalOperator::Or => group
            .rules
            .iter()
            .any(|rule| evaluate_at(rule, context, depth)),
        LogicalOperator::Unknown => false,
    }
}
