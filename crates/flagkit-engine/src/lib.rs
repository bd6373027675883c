#![forbid(unsafe_code)]

pub mod eval;
pub mod hash;

pub use eval::{
    evaluate_condition, evaluate_flag, evaluate_group, evaluate_rule, explain_flag,
    EvaluationReason, FlagEvaluation,
};
