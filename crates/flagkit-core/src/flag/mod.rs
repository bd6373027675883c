pub mod context;
pub mod rule;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use self::rule::RuleGroup;

/// A named boolean toggle with per-environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub default_enabled: bool,

    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            default_enabled: false,
            environments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    pub fn with_environment(mut self, config: EnvironmentConfig) -> Self {
        self.environments.push(config);
        self
    }

    /// Configuration for `environment`. The first entry wins when a store
    /// hands us duplicates.
    pub fn environment(&self, environment: &str) -> Option<&EnvironmentConfig> {
        self.environments
            .iter()
            .find(|config| config.environment == environment)
    }
}

/// Per-environment switch plus optional targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub environment: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleGroup>,
}

impl EnvironmentConfig {
    pub fn new(environment: impl Into<String>, enabled: bool) -> Self {
        Self {
            environment: environment.into(),
            enabled,
            rule: None,
        }
    }

    pub fn with_rule(mut self, rule: RuleGroup) -> Self {
        self.rule = Some(rule);
        self
    }
}
