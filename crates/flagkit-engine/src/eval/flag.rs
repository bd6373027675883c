use flagkit_core::flag::context::EvaluationContext;
use flagkit_core::flag::FeatureFlag;

use super::decision::{EvaluationReason, FlagEvaluation};
use super::rule::evaluate_group;

/// Resolve a flag for the context's environment.
///
/// Precedence:
/// 1. No config for the environment -> `defaultEnabled`
/// 2. Environment disabled -> off, whatever the rule says
/// 3. Enabled without a rule -> on
/// 4. Enabled with a rule -> the rule's result
pub fn evaluate_flag(flag: &FeatureFlag, context: &EvaluationContext) -> bool {
    explain_flag(flag, context).enabled
}

/// Same as [`evaluate_flag`], keeping the reason.
pub fn explain_flag(flag: &FeatureFlag, context: &EvaluationContext) -> FlagEvaluation {
    let environment = context.environment();

    let (enabled, reason) = match flag.environment(environment) {
        None => (flag.default_enabled, EvaluationReason::Default),
        Some(config) if !config.enabled => (false, EvaluationReason::KillSwitch),
        Some(config) => match &config.rule {
            None => (true, EvaluationReason::NoRule),
            Some(rule) if evaluate_group(rule, context) => (true, EvaluationReason::RuleMatch),
            Some(_) => (false, EvaluationReason::RuleNoMatch),
        },
    };

    FlagEvaluation {
        flag: flag.name.clone(),
        environment: environment.to_string(),
        enabled,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagkit_core::builder::RuleBuilder;
    use flagkit_core::flag::rule::RuleGroup;
    use flagkit_core::flag::EnvironmentConfig;
    use flagkit_core::types::LogicalOperator;

    fn pro_only() -> RuleGroup {
        RuleBuilder::new()
            .where_equals("subscriptionType", "pro")
            .build()
            .unwrap()
    }

    #[test]
    fn missing_environment_uses_default() {
        for default in [true, false] {
            let flag = FeatureFlag::new("f")
                .with_default(default)
                .with_environment(EnvironmentConfig::new("production", true));
            let ctx = EvaluationContext::new("staging");
            let result = explain_flag(&flag, &ctx);
            assert_eq!(result.enabled, default);
            assert_eq!(result.reason, EvaluationReason::Default);
        }
    }

    #[test]
    fn kill_switch_overrides_rule() {
        let always_on = RuleBuilder::new().where_equals("environment", "production").build().unwrap();
        let empty = RuleGroup::new(LogicalOperator::Or);
        for rule in [None, Some(always_on), Some(empty)] {
            let mut env = EnvironmentConfig::new("production", false);
            env.rule = rule;
            let flag = FeatureFlag::new("f").with_default(true).with_environment(env);
            let result = explain_flag(&flag, &EvaluationContext::new("production"));
            assert!(!result.enabled);
            assert_eq!(result.reason, EvaluationReason::KillSwitch);
        }
    }

    #[test]
    fn enabled_without_rule_is_on() {
        let flag = FeatureFlag::new("f").with_environment(EnvironmentConfig::new("production", true));
        let result = explain_flag(&flag, &EvaluationContext::new("production"));
        assert!(result.enabled);
        assert_eq!(result.reason, EvaluationReason::NoRule);
    }

    #[test]
    fn rule_gates_enabled_environment() {
        let flag = FeatureFlag::new("f")
            .with_environment(EnvironmentConfig::new("production", true).with_rule(pro_only()));
        let pro = EvaluationContext::new("production").with_subscription_type("pro");
        let free = EvaluationContext::new("production").with_subscription_type("free");

        assert_eq!(explain_flag(&flag, &pro).reason, EvaluationReason::RuleMatch);
        assert!(evaluate_flag(&flag, &pro));
        assert_eq!(explain_flag(&flag, &free).reason, EvaluationReason::RuleNoMatch);
        assert!(!evaluate_flag(&flag, &free));
    }

    #[test]
    fn enabled_with_empty_rule_is_off() {
        let flag = FeatureFlag::new("f").with_environment(
            EnvironmentConfig::new("production", true).with_rule(RuleGroup::new(LogicalOperator::And)),
        );
        assert!(!evaluate_flag(&flag, &EvaluationContext::new("production")));
    }

    #[test]
    fn duplicate_environments_first_entry_wins() {
        let flag = FeatureFlag::new("f")
            .with_environment(EnvironmentConfig::new("production", false))
            .with_environment(EnvironmentConfig::new("production", true));
        assert!(!evaluate_flag(&flag, &EvaluationContext::new("production")));

        let flag = FeatureFlag::new("f")
            .with_environment(EnvironmentConfig::new("production", true).with_rule(pro_only()))
            .with_environment(EnvironmentConfig::new("production", true));
        assert!(!evaluate_flag(&flag, &EvaluationContext::new("production")));
    }

    #[test]
    fn explanation_carries_names() {
        let flag = FeatureFlag::new("checkout-v2");
        let result = explain_flag(&flag, &EvaluationContext::new("dev"));
        assert_eq!(result.flag, "checkout-v2");
        assert_eq!(result.environment, "dev");
        assert_eq!(
            serde_json::to_value(result.reason).unwrap(),
            serde_json::json!("default")
        );
    }

    #[test]
    fn production_pro_scenario() {
        let flag: FeatureFlag = serde_json::from_value(serde_json::json!({
            "id": "F",
            "name": "F",
            "defaultEnabled": false,
            "environments": [{
                "environment": "production",
                "enabled": true,
                "rule": {
                    "type": "group",
                    "operator": "AND",
                    "rules": [{"type": "condition", "field": "subscriptionType", "operator": "=", "value": "pro"}]
                }
            }]
        }))
        .unwrap();

        let ctx = |env: &str, tier: &str| EvaluationContext::new(env).with_subscription_type(tier);
        assert!(evaluate_flag(&flag, &ctx("production", "pro")));
        assert!(!evaluate_flag(&flag, &ctx("production", "free")));
        assert!(!evaluate_flag(&flag, &ctx("staging", "pro")));
    }
}
