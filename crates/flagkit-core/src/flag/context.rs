use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ENVIRONMENT_KEY: &str = "environment";
pub const USER_ID_KEY: &str = "userId";
pub const ORGANIZATION_ID_KEY: &str = "organizationId";
pub const SUBSCRIPTION_TYPE_KEY: &str = "subscriptionType";

/// Facts a rule is evaluated against.
///
/// A flat JSON object that always carries a string `environment`. Any other
/// key (including nested objects) is addressable by dot-path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct EvaluationContext {
    attributes: Map<String, Value>,
}

impl EvaluationContext {
    pub fn new(environment: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert(ENVIRONMENT_KEY.into(), Value::String(environment.into()));
        Self { attributes }
    }

    pub fn environment(&self) -> &str {
        self.attributes
            .get(ENVIRONMENT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_user_id(self, user_id: impl Into<Value>) -> Self {
        self.with(USER_ID_KEY, user_id)
    }

    pub fn with_organization_id(self, organization_id: impl Into<Value>) -> Self {
        self.with(ORGANIZATION_ID_KEY, organization_id)
    }

    pub fn with_subscription_type(self, subscription_type: impl Into<Value>) -> Self {
        self.with(SUBSCRIPTION_TYPE_KEY, subscription_type)
    }

    /// Set a top-level attribute. A non-string `environment` is ignored so the
    /// context always keeps a usable environment name.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if key == ENVIRONMENT_KEY && !value.is_string() {
            return;
        }
        self.attributes.insert(key, value);
    }

    /// Shallow-merge a partial context into this one.
    pub fn merge(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn user_id(&self) -> Option<&Value> {
        self.get(USER_ID_KEY)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Resolve a dot-path such as `organization.plan.tier`.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is
    /// not an object or array. Numeric segments index into arrays.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let head = self.attributes.get(segments.next()?)?;
        descend(head, segments)
    }
}

fn descend<'a, 'p>(value: &'a Value, mut segments: impl Iterator<Item = &'p str>) -> Option<&'a Value> {
    let Some(segment) = segments.next() else {
        return Some(value);
    };
    let next = match value {
        Value::Object(map) => map.get(segment)?,
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
        _ => return None,
    };
    descend(next, segments)
}

impl TryFrom<Map<String, Value>> for EvaluationContext {
    type Error = String;

    fn try_from(attributes: Map<String, Value>) -> Result<Self, Self::Error> {
        match attributes.get(ENVIRONMENT_KEY) {
            Some(Value::String(_)) => Ok(Self { attributes }),
            Some(_) => Err("context field 'environment' must be a string".into()),
            None => Err("context is missing required field 'environment'".into()),
        }
    }
}

impl From<EvaluationContext> for Map<String, Value> {
    fn from(context: EvaluationContext) -> Self {
        context.attributes
    }
}
