#![forbid(unsafe_code)]

pub mod builder;
pub mod errors;
pub mod flag;
pub mod list;
pub mod schema;
pub mod templates;
pub mod types;

pub use builder::RuleBuilder;
pub use errors::BuilderError;
pub use flag::context::EvaluationContext;
pub use flag::rule::{Condition, ConditionValue, PercentageRollout, Rule, RuleGroup, MAX_RULE_DEPTH};
pub use flag::{EnvironmentConfig, FeatureFlag};
pub use types::{ComparisonOperator, LogicalOperator};
