use crate::builder::RuleBuilder;
use crate::flag::{EnvironmentConfig, FeatureFlag};

/// Built-in flag scaffolds.
pub fn list_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "kill-switch",
            "On everywhere, with a per-environment off switch",
        ),
        ("beta", "Named beta users and organizations in production"),
        ("rollout", "Deterministic 10% percentage rollout in production"),
        ("pro-tier", "Paid subscription tiers only"),
    ]
}

pub fn generate(template: &str, name: Option<&str>) -> Option<FeatureFlag> {
    match template {
        "kill-switch" => Some(kill_switch(name)),
        "beta" => beta(name),
        "rollout" => rollout(name),
        "pro-tier" => pro_tier(name),
        _ => None,
    }
}

fn kill_switch(name: Option<&str>) -> FeatureFlag {
    FeatureFlag::new(name.unwrap_or("kill-switch"))
        .with_description("Disable in an environment to turn the feature off immediately.")
        .with_environment(EnvironmentConfig::new("production", true))
        .with_environment(EnvironmentConfig::new("staging", true))
        .with_environment(EnvironmentConfig::new("development", true))
}

fn beta(name: Option<&str>) -> Option<FeatureFlag> {
    let rule = RuleBuilder::with_operator(crate::types::LogicalOperator::Or)
        .where_user(["replace-with-user-id"])
        .where_organization(["replace-with-organization-id"])
        .build()
        .ok()?;
    Some(
        FeatureFlag::new(name.unwrap_or("beta-feature"))
            .with_description("Visible to listed beta users and organizations.")
            .with_environment(EnvironmentConfig::new("production", true).with_rule(rule))
            .with_environment(EnvironmentConfig::new("staging", true))
            .with_environment(EnvironmentConfig::new("development", true)),
    )
}

fn rollout(name: Option<&str>) -> Option<FeatureFlag> {
    let flag_name = name.unwrap_or("gradual-rollout");
    let rule = RuleBuilder::new()
        .where_percentage(10.0, Some("0"))
        .build()
        .ok()?;
    Some(
        FeatureFlag::new(flag_name)
            .with_description("Raise the percentage to widen the rollout; bucketing is stable per user.")
            .with_environment(EnvironmentConfig::new("production", true).with_rule(rule))
            .with_environment(EnvironmentConfig::new("staging", true)),
    )
}

fn pro_tier(name: Option<&str>) -> Option<FeatureFlag> {
    let rule = RuleBuilder::new()
        .where_subscription(["pro", "enterprise"])
        .build()
        .ok()?;
    Some(
        FeatureFlag::new(name.unwrap_or("pro-feature"))
            .with_description("Only for paying subscriptions.")
            .with_environment(EnvironmentConfig::new("production", true).with_rule(rule.clone()))
            .with_environment(EnvironmentConfig::new("staging", true).with_rule(rule)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn every_template_generates_and_checks_clean() {
        for (template, _) in list_templates() {
            let flag = generate(template, None).unwrap_or_else(|| panic!("{template} missing"));
            let data = serde_json::to_value(&flag).unwrap();
            let report = schema::check(&data, template, true);
            assert!(report.pass, "{template}: {report:?}");
        }
    }

    #[test]
    fn name_override() {
        let flag = generate("pro-tier", Some("reports-v2")).unwrap();
        assert_eq!(flag.name, "reports-v2");
    }

    #[test]
    fn unknown_template() {
        assert!(generate("nope", None).is_none());
    }
}
