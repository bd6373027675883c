use std::collections::HashSet;

use anyhow::{Context, Result};
use jsonschema::Validator;
use serde_json::Value;

use crate::errors::{CheckIssue, CheckReport};
use crate::flag::rule::{Condition, ConditionValue, Rule, RuleGroup, MAX_RULE_DEPTH};
use crate::flag::FeatureFlag;
use crate::types::{ComparisonOperator, LogicalOperator};

const FLAG_SCHEMA: &str = include_str!("../schema/feature-flag.schema.json");

/// Compile the embedded feature flag schema.
pub fn validator() -> Result<Validator> {
    let schema: Value =
        serde_json::from_str(FLAG_SCHEMA).context("embedded schema is invalid JSON")?;
    Validator::new(&schema).map_err(|e| anyhow::anyhow!("schema compilation failed: {e}"))
}

/// Read and parse a flag definition file.
pub fn load_flag(path: &str) -> Result<FeatureFlag> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("{path}: invalid flag definition"))
}

/// Full check producing structured report (for `flagkit check --json`).
pub fn check(data: &Value, file: &str, strict: bool) -> CheckReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Schema validation
    if let Ok(v) = validator() {
        for error in v.iter_errors(data) {
            let pointer = error.instance_path.to_string();
            errors.push(CheckIssue::new(
                "E001",
                "schema",
                error.to_string(),
                json_path(&pointer),
            ));
        }
    }

    let flag = match serde_json::from_value::<FeatureFlag>(data.clone()) {
        Ok(flag) => Some(flag),
        Err(e) => {
            if errors.is_empty() {
                errors.push(CheckIssue::new("E001", "schema", e.to_string(), "$"));
            }
            None
        }
    };

    if let Some(flag) = &flag {
        lint_environments(flag, data, &mut errors, &mut warnings);
    }

    let pass = errors.is_empty() && (!strict || warnings.is_empty());
    CheckReport {
        file: file.to_string(),
        flag: flag.map(|f| f.name),
        pass,
        errors,
        warnings,
    }
}

fn lint_environments(
    flag: &FeatureFlag,
    data: &Value,
    errors: &mut Vec<CheckIssue>,
    warnings: &mut Vec<CheckIssue>,
) {
    // W004: on everywhere with nothing to scope it
    if flag.environments.is_empty() && flag.default_enabled {
        warnings.push(CheckIssue::new(
            "W004",
            "lint",
            "defaultEnabled with no environments turns the flag on everywhere",
            "$.environments",
        ));
    }

    let mut seen = HashSet::new();
    for (i, env) in flag.environments.iter().enumerate() {
        // W003: duplicates are shadowed by the first entry
        if !seen.insert(env.environment.as_str()) {
            warnings.push(CheckIssue::new(
                "W003",
                "lint",
                format!(
                    "duplicate environment '{}' is ignored; the first entry wins",
                    env.environment
                ),
                format!("$.environments[{i}]"),
            ));
        }
        if let Some(group) = &env.rule {
            let mut walker = RuleWalker {
                data,
                errors: &mut *errors,
                warnings: &mut *warnings,
            };
            walker.group(group, &format!("/environments/{i}/rule"), 1);
        }
    }
}

struct RuleWalker<'a> {
    data: &'a Value,
    errors: &'a mut Vec<CheckIssue>,
    warnings: &'a mut Vec<CheckIssue>,
}

impl RuleWalker<'_> {
    fn group(&mut self, group: &RuleGroup, pointer: &str, depth: usize) {
        if depth > MAX_RULE_DEPTH {
            self.errors.push(CheckIssue::new(
                "E003",
                "rules",
                format!("rule nesting exceeds {MAX_RULE_DEPTH} levels; the subtree always evaluates to false"),
                json_path(pointer),
            ));
            return;
        }
        if group.operator == LogicalOperator::Unknown {
            let raw = self.raw_str(&format!("{pointer}/operator"));
            self.errors.push(CheckIssue::new(
                "E005",
                "rules",
                format!("unknown logical operator '{raw}'"),
                json_path(&format!("{pointer}/operator")),
            ));
        }
        if group.rules.is_empty() {
            self.warnings.push(CheckIssue::new(
                "W001",
                "lint",
                "empty group always evaluates to false",
                json_path(pointer),
            ));
        }
        for (i, rule) in group.rules.iter().enumerate() {
            let child = format!("{pointer}/rules/{i}");
            match rule {
                Rule::Group(g) => self.group(g, &child, depth + 1),
                Rule::Condition(c) => self.condition(c, &child),
                Rule::Unknown => {
                    let raw = self.raw_str(&format!("{child}/type"));
                    self.errors.push(CheckIssue::new(
                        "E005",
                        "rules",
                        format!("unknown rule type '{raw}'"),
                        json_path(&child),
                    ));
                }
            }
        }
    }

    fn condition(&mut self, condition: &Condition, pointer: &str) {
        let op_path = json_path(&format!("{pointer}/operator"));
        if condition.operator == ComparisonOperator::Unknown {
            let raw = self.raw_str(&format!("{pointer}/operator"));
            self.errors.push(CheckIssue::new(
                "E005",
                "rules",
                format!("unknown comparison operator '{raw}'"),
                op_path.clone(),
            ));
        }

        match &condition.value {
            ConditionValue::Percentage(rollout) => {
                if !rollout.percentage.is_finite() || !(0.0..=100.0).contains(&rollout.percentage) {
                    self.errors.push(CheckIssue::new(
                        "E002",
                        "rules",
                        format!("percentage {} outside [0, 100]", rollout.percentage),
                        json_path(&format!("{pointer}/value/percentage")),
                    ));
                }
                if condition.operator != ComparisonOperator::Eq {
                    self.warnings.push(CheckIssue::new(
                        "W002",
                        "lint",
                        format!(
                            "percentage rollout only applies with '=', not '{}'",
                            condition.operator
                        ),
                        op_path,
                    ));
                }
            }
            ConditionValue::List(_) => {}
            ConditionValue::Scalar(value) => {
                // W005: looks like a rollout but compares as a plain object
                if value.get("type").and_then(Value::as_str) == Some("percentage") {
                    self.warnings.push(CheckIssue::new(
                        "W005",
                        "lint",
                        "malformed percentage rollout ('percentage' must be a number); \
                         the condition never matches",
                        json_path(&format!("{pointer}/value")),
                    ));
                }
                if condition.operator.expects_list() {
                    self.errors.push(CheckIssue::new(
                        "E004",
                        "rules",
                        format!("operator '{}' requires a list value", condition.operator),
                        json_path(&format!("{pointer}/value")),
                    ));
                }
            }
        }
    }

    fn raw_str(&self, pointer: &str) -> String {
        self.data
            .pointer(pointer)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }
}

/// `/environments/0/rule` -> `$.environments[0].rule`
fn json_path(pointer: &str) -> String {
    let mut out = String::from("$");
    for segment in pointer.split('/').skip(1) {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push_str(&format!("[{segment}]"));
        } else {
            out.push('.');
            out.push_str(segment);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(issues: &[CheckIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn clean_flag_passes_strict() {
        let data = json!({
            "name": "pro-dashboard",
            "environments": [{
                "environment": "production",
                "enabled": true,
                "rule": {
                    "type": "group",
                    "operator": "AND",
                    "rules": [{"type": "condition", "field": "subscriptionType", "operator": "=", "value": "pro"}]
                }
            }]
        });
        let report = check(&data, "pro.json", true);
        assert!(report.pass, "{report:?}");
        assert_eq!(report.flag.as_deref(), Some("pro-dashboard"));
    }

    #[test]
    fn schema_errors_are_reported() {
        let report = check(&json!({"environments": [{"enabled": "yes"}]}), "bad.json", false);
        assert!(!report.pass);
        assert!(codes(&report.errors).iter().all(|c| *c == "E001"));
        assert!(!report.errors.is_empty());
        assert!(report.flag.is_none());
    }

    #[test]
    fn semantic_errors() {
        let data = json!({
            "name": "broken",
            "environments": [{
                "environment": "production",
                "enabled": true,
                "rule": {
                    "operator": "AND",
                    "rules": [
                        {"type": "condition", "field": "userId", "operator": "=", "value": {"type": "percentage", "percentage": 150}},
                        {"type": "condition", "field": "country", "operator": "IN", "value": "NZ"},
                        {"type": "condition", "field": "plan", "operator": "LIKE", "value": "pro%"},
                        {"type": "script", "source": "true"}
                    ]
                }
            }]
        });
        let report = check(&data, "broken.json", false);
        assert_eq!(codes(&report.errors), vec!["E002", "E004", "E005", "E005"]);
        assert!(report.errors[2].message.contains("LIKE"));
        assert!(report.errors[3].message.contains("script"));
        assert_eq!(
            report.errors[1].path.as_deref(),
            Some("$.environments[0].rule.rules[1].value")
        );
    }

    #[test]
    fn warnings_fail_only_in_strict_mode() {
        let data = json!({
            "name": "dup",
            "environments": [
                {"environment": "production", "enabled": true, "rule": {"operator": "OR", "rules": []}},
                {"environment": "production", "enabled": false}
            ]
        });
        let lenient = check(&data, "dup.json", false);
        assert!(lenient.pass);
        assert_eq!(codes(&lenient.warnings), vec!["W001", "W003"]);

        let strict = check(&data, "dup.json", true);
        assert!(!strict.pass);
    }

    #[test]
    fn excessive_depth_is_an_error() {
        let mut rule = json!({"type": "condition", "field": "a", "operator": "=", "value": 1});
        for _ in 0..MAX_RULE_DEPTH + 1 {
            rule = json!({"type": "group", "operator": "AND", "rules": [rule]});
        }
        let data = json!({
            "name": "deep",
            "environments": [{"environment": "dev", "enabled": true, "rule": rule}]
        });
        let report = check(&data, "deep.json", false);
        assert_eq!(codes(&report.errors), vec!["E003"]);
    }

    #[test]
    fn percentage_with_other_operator_warns() {
        let data = json!({
            "name": "odd",
            "environments": [{"environment": "dev", "enabled": true, "rule": {"operator": "AND", "rules": [
                {"type": "condition", "field": "userId", "operator": "!=", "value": {"type": "percentage", "percentage": 5}}
            ]}}]
        });
        let report = check(&data, "odd.json", false);
        assert_eq!(codes(&report.warnings), vec!["W002"]);
    }

    #[test]
    fn json_path_formatting() {
        assert_eq!(json_path(""), "$");
        assert_eq!(json_path("/environments/0/rule"), "$.environments[0].rule");
    }

    #[test]
    fn malformed_percentage_rollout_warns() {
        let data = json!({
            "name": "rollout",
            "environments": [{"environment": "dev", "enabled": true, "rule": {"operator": "AND", "rules": [
                {"type": "condition", "field": "userId", "operator": "=", "value": {"type": "percentage", "percentage": "50"}}
            ]}}]
        });
        let lenient = check(&data, "rollout.json", false);
        assert!(lenient.pass);
        assert_eq!(codes(&lenient.warnings), vec!["W005"]);
        assert_eq!(
            lenient.warnings[0].path.as_deref(),
            Some("$.environments[0].rule.rules[0].value")
        );

        let strict = check(&data, "rollout.json", true);
        assert!(!strict.pass);
    }
}
