mod compare;
pub mod condition;
pub mod decision;
pub mod flag;
pub mod rule;

pub use condition::evaluate_condition;
pub use decision::{EvaluationReason, FlagEvaluation};
pub use flag::{evaluate_flag, explain_flag};
pub use rule::{evaluate_group, evaluate_rule};
