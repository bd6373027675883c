use serde_json::Value;

use crate::errors::BuilderError;
use crate::flag::context::{ORGANIZATION_ID_KEY, SUBSCRIPTION_TYPE_KEY, USER_ID_KEY};
use crate::flag::rule::{Condition, ConditionValue, PercentageRollout, RuleGroup};
use crate::types::{ComparisonOperator, LogicalOperator};

/// Fluent construction of a rule tree.
///
/// Conditions are appended to the current group. `and()` / `or()` open a
/// nested group as the next child of the current one; `end_group()` closes it.
///
/// ```
/// use flagkit_core::builder::RuleBuilder;
///
/// let rule = RuleBuilder::new()
///     .where_subscription(["pro", "team"])
///     .or()
///     .where_user(["alice", "bob"])
///     .where_percentage(10.0, Some("beta"))
///     .end_group()
///     .unwrap()
///     .build()
///     .unwrap();
/// assert_eq!(rule.rules.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    current: RuleGroup,
    parents: Vec<RuleGroup>,
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBuilder {
    /// Start a builder whose root group is `AND`.
    pub fn new() -> Self {
        Self::with_operator(LogicalOperator::And)
    }

    pub fn with_operator(operator: LogicalOperator) -> Self {
        Self {
            current: RuleGroup::new(operator),
            parents: Vec::new(),
        }
    }

    pub fn where_(mut self, field: &str, operator: ComparisonOperator, value: ConditionValue) -> Self {
        self.current.push(Condition::new(field, operator, value));
        self
    }

    pub fn where_equals(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_(field, ComparisonOperator::Eq, ConditionValue::scalar(value))
    }

    pub fn where_not_equals(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_(field, ComparisonOperator::NotEq, ConditionValue::scalar(value))
    }

    pub fn where_greater_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_(field, ComparisonOperator::Gt, ConditionValue::scalar(value))
    }

    pub fn where_less_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_(field, ComparisonOperator::Lt, ConditionValue::scalar(value))
    }

    pub fn where_greater_than_or_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_(field, ComparisonOperator::Gte, ConditionValue::scalar(value))
    }

    pub fn where_less_than_or_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_(field, ComparisonOperator::Lte, ConditionValue::scalar(value))
    }

    pub fn where_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_(field, ComparisonOperator::In, ConditionValue::list(values))
    }

    pub fn where_not_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_(field, ComparisonOperator::NotIn, ConditionValue::list(values))
    }

    pub fn where_user<I, V>(self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in(USER_ID_KEY, user_ids)
    }

    pub fn where_organization<I, V>(self, organization_ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in(ORGANIZATION_ID_KEY, organization_ids)
    }

    pub fn where_subscription<I, V>(self, subscription_types: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in(SUBSCRIPTION_TYPE_KEY, subscription_types)
    }

    /// Deterministic rollout to `percentage` percent of users, bucketed on `userId`.
    pub fn where_percentage(self, percentage: f64, seed: Option<&str>) -> Self {
        self.where_(
            USER_ID_KEY,
            ComparisonOperator::Eq,
            PercentageRollout::new(percentage, seed).into(),
        )
    }

    pub fn and(self) -> Self {
        self.open(LogicalOperator::And)
    }

    pub fn or(self) -> Self {
        self.open(LogicalOperator::Or)
    }

    fn open(mut self, operator: LogicalOperator) -> Self {
        let parent = std::mem::replace(&mut self.current, RuleGroup::new(operator));
        self.parents.push(parent);
        self
    }

    /// Close the innermost open group and attach it to its parent.
    pub fn end_group(mut self) -> Result<Self, BuilderError> {
        let parent = self.parents.pop().ok_or(BuilderError::NoOpenGroup)?;
        let child = std::mem::replace(&mut self.current, parent);
        self.current.push(child);
        Ok(self)
    }

    /// Number of groups opened but not yet ended.
    pub fn open_groups(&self) -> usize {
        self.parents.len()
    }

    /// Copy of the finished tree. The builder stays usable.
    pub fn build(&self) -> Result<RuleGroup, BuilderError> {
        if !self.parents.is_empty() {
            return Err(BuilderError::UnclosedGroups(self.parents.len()));
        }
        Ok(self.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::rule::Rule;
    use serde_json::json;

    fn condition(rule: &Rule) -> &Condition {
        match rule {
            Rule::Condition(c) => c,
            other => panic!("expected condition, got {other:?}"),
        }
    }

    fn group(rule: &Rule) -> &RuleGroup {
        match rule {
            Rule::Group(g) => g,
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn nested_and_group() {
        let root = RuleBuilder::new()
            .where_equals("a", 1)
            .and()
            .where_greater_than("b", 2)
            .end_group()
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(root.operator, LogicalOperator::And);
        assert_eq!(root.rules.len(), 2);

        let a = condition(&root.rules[0]);
        assert_eq!(a.field, "a");
        assert_eq!(a.operator, ComparisonOperator::Eq);
        assert_eq!(a.value, ConditionValue::scalar(1));

        let nested = group(&root.rules[1]);
        assert_eq!(nested.operator, LogicalOperator::And);
        assert_eq!(nested.rules.len(), 1);
        let b = condition(&nested.rules[0]);
        assert_eq!(b.field, "b");
        assert_eq!(b.operator, ComparisonOperator::Gt);
        assert_eq!(b.value, ConditionValue::scalar(2));
    }

    #[test]
    fn build_with_open_group_fails() {
        let builder = RuleBuilder::new().where_equals("a", 1).or().where_equals("b", 2);
        assert_eq!(builder.open_groups(), 1);
        assert_eq!(builder.build(), Err(BuilderError::UnclosedGroups(1)));
    }

    #[test]
    fn end_group_without_open_group_fails() {
        let err = RuleBuilder::new().where_equals("a", 1).end_group().unwrap_err();
        assert_eq!(err, BuilderError::NoOpenGroup);
    }

    #[test]
    fn conditions_after_end_group_go_to_parent() {
        let root = RuleBuilder::with_operator(LogicalOperator::Or)
            .or()
            .where_user(["u1"])
            .and()
            .where_organization(["o1"])
            .end_group()
            .unwrap()
            .end_group()
            .unwrap()
            .where_subscription(["enterprise"])
            .build()
            .unwrap();

        assert_eq!(root.operator, LogicalOperator::Or);
        assert_eq!(root.rules.len(), 2);
        let first = group(&root.rules[0]);
        assert_eq!(first.operator, LogicalOperator::Or);
        assert_eq!(first.rules.len(), 2);
        assert_eq!(condition(&first.rules[0]).field, "userId");
        let inner = group(&first.rules[1]);
        assert_eq!(condition(&inner.rules[0]).field, "organizationId");
        let last = condition(&root.rules[1]);
        assert_eq!(last.field, "subscriptionType");
        assert_eq!(last.operator, ComparisonOperator::In);
        assert_eq!(last.value, ConditionValue::List(vec![json!("enterprise")]));
    }

    #[test]
    fn percentage_shape() {
        let root = RuleBuilder::new().where_percentage(25.0, Some("42")).build().unwrap();
        let c = condition(&root.rules[0]);
        assert_eq!(c.field, "userId");
        assert_eq!(c.operator, ComparisonOperator::Eq);
        assert_eq!(
            serde_json::to_value(&c.value).unwrap(),
            json!({"type": "percentage", "percentage": 25.0, "seed": "42"})
        );
    }

    #[test]
    fn build_returns_independent_copy() {
        let builder = RuleBuilder::new().where_equals("a", 1);
        let first = builder.build().unwrap();
        let builder = builder.where_equals("b", 2);
        let second = builder.build().unwrap();
        assert_eq!(first.rules.len(), 1);
        assert_eq!(second.rules.len(), 2);
    }

    #[test]
    fn every_operator_helper() {
        let root = RuleBuilder::new()
            .where_not_equals("a", "x")
            .where_less_than("b", 1)
            .where_greater_than_or_equal("c", 2)
            .where_less_than_or_equal("d", 3)
            .where_not_in("e", ["y", "z"])
            .build()
            .unwrap();
        let ops: Vec<_> = root.rules.iter().map(|r| condition(r).operator).collect();
        assert_eq!(
            ops,
            vec![
                ComparisonOperator::NotEq,
                ComparisonOperator::Lt,
                ComparisonOperator::Gte,
                ComparisonOperator::Lte,
                ComparisonOperator::NotIn,
            ]
        );
    }
}
