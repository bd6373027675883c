use serde::{Deserialize, Serialize};

/// Why a flag resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    /// No configuration for the environment; `defaultEnabled` applied.
    Default,
    /// The environment is disabled.
    KillSwitch,
    /// The environment is enabled without a targeting rule.
    NoRule,
    RuleMatch,
    RuleNoMatch,
}

/// Record of a flag evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagEvaluation {
    pub flag: String,
    pub environment: String,
    pub enabled: bool,
    pub reason: EvaluationReason,
}
