use std::collections::HashMap;

use async_trait::async_trait;
use flagkit_core::flag::context::{
    EvaluationContext, ENVIRONMENT_KEY, ORGANIZATION_ID_KEY, SUBSCRIPTION_TYPE_KEY, USER_ID_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Remote evaluation endpoint.
#[async_trait]
pub trait EvaluationTransport: Send + Sync {
    async fn evaluate_one(&self, flag_name: &str, context: &EvaluationContext) -> Result<bool>;

    async fn evaluate_many(
        &self,
        flag_names: &[String],
        context: &EvaluationContext,
    ) -> Result<HashMap<String, bool>>;
}

#[derive(Debug, Deserialize)]
struct SingleResponse {
    enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    flag_names: &'a [String],
    context: &'a EvaluationContext,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: HashMap<String, bool>,
}

/// Talks to the flag API over HTTP.
///
/// - `GET  {endpoint}/name/{flag}/evaluate?userId=&organizationId=&subscriptionType=&environment=`
/// - `POST {endpoint}/evaluate` with `{flagNames, context}`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: config.endpoint()?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn single_url(&self, flag_name: &str, context: &EvaluationContext) -> Result<Url> {
        let mut url = self.url(&["name", flag_name, "evaluate"])?;
        {
            let mut query = url.query_pairs_mut();
            for key in [USER_ID_KEY, ORGANIZATION_ID_KEY, SUBSCRIPTION_TYPE_KEY] {
                if let Some(value) = context.get(key).and_then(query_value) {
                    query.append_pair(key, &value);
                }
            }
            query.append_pair(ENVIRONMENT_KEY, context.environment());
        }
        Ok(url)
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[async_trait]
impl EvaluationTransport for HttpTransport {
    async fn evaluate_one(&self, flag_name: &str, context: &EvaluationContext) -> Result<bool> {
        let url = self.single_url(flag_name, context)?;
        let response = ensure_success(self.http.get(url).send().await?)?;
        let body: SingleResponse = response.json().await?;
        Ok(body.enabled)
    }

    async fn evaluate_many(
        &self,
        flag_names: &[String],
        context: &EvaluationContext,
    ) -> Result<HashMap<String, bool>> {
        let url = self.url(&["evaluate"])?;
        let request = BatchRequest {
            flag_names,
            context,
        };
        let response = ensure_success(self.http.post(url).json(&request).send().await?)?;
        let body: BatchResponse = response.json().await?;
        Ok(body.results)
    }
}
