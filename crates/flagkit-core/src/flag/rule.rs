use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{ComparisonOperator, LogicalOperator};

/// Deepest group nesting the evaluator will descend into. Deeper subtrees
/// evaluate to `false`.
pub const MAX_RULE_DEPTH: usize = 32;

/// A node of a targeting rule tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    Condition(Condition),
    Group(RuleGroup),
    /// Any node whose `type` is not recognized. Always evaluates to `false`.
    #[serde(other)]
    Unknown,
}

impl Rule {
    /// Group nesting depth below and including this node.
    pub fn depth(&self) -> usize {
        match self {
            Rule::Group(group) => group.depth(),
            Rule::Condition(_) | Rule::Unknown => 0,
        }
    }

    /// Total number of nodes in the subtree.
    pub fn node_count(&self) -> usize {
        match self {
            Rule::Group(group) => group.node_count(),
            Rule::Condition(_) | Rule::Unknown => 1,
        }
    }
}

impl From<Condition> for Rule {
    fn from(condition: Condition) -> Self {
        Rule::Condition(condition)
    }
}

impl From<RuleGroup> for Rule {
    fn from(group: RuleGroup) -> Self {
        Rule::Group(group)
    }
}

/// Leaf comparison of a context field against a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub id: String,
    /// Dot-separated path into the evaluation context.
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: ConditionValue,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ComparisonOperator, value: ConditionValue) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            field: field.into(),
            operator,
            value,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Logical combinator over child rules. Children keep their insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default)]
    pub id: String,
    pub operator: LogicalOperator,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RuleGroup {
    pub fn new(operator: LogicalOperator) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operator,
            rules: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn push(&mut self, rule: impl Into<Rule>) {
        self.rules.push(rule.into());
        self.updated_at = Utc::now();
    }

    /// Nesting depth; a group without nested groups has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.rules.iter().map(Rule::depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.rules.iter().map(Rule::node_count).sum::<usize>()
    }
}

/// Right-hand side of a condition.
///
/// Variant order matters for untagged deserialization: the percentage
/// descriptor is tried first, then arrays, then any other JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Percentage(PercentageRollout),
    List(Vec<Value>),
    Scalar(Value),
}

impl ConditionValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        ConditionValue::Scalar(value.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ConditionValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            ConditionValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<PercentageRollout> for ConditionValue {
    fn from(rollout: PercentageRollout) -> Self {
        ConditionValue::Percentage(rollout)
    }
}

/// `{"type": "percentage", "percentage": 25, "seed": "42"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageRollout {
    #[serde(rename = "type")]
    pub kind: PercentageKind,
    pub percentage: f64,
    #[serde(
        default,
        deserialize_with = "de_seed",
        skip_serializing_if = "Option::is_none"
    )]
    pub seed: Option<String>,
}

impl PercentageRollout {
    pub fn new(percentage: f64, seed: Option<&str>) -> Self {
        Self {
            kind: PercentageKind::Percentage,
            percentage,
            seed: seed.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentageKind {
    Percentage,
}

/// Seeds are strings on the wire, but stores that emit bare numbers are
/// accepted too.
fn de_seed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
