//! Client for the hosted colorization model.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::{Config, Credentials, MODEL_API_KEY_ENV};
use crate::error::{ColorizerError, Result};

const MODEL_NAME: &str = "colorizer";

/// The model's answer for one input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorizationResult {
    /// Temporary URL of the colorized image, hosted by the model provider.
    pub output_url: String,
    /// Provider-assigned job id.
    pub id: String,
}

#[async_trait]
pub trait ColorizationService: Send + Sync {
    async fn colorize(&self, image_url: &str) -> Result<ColorizationResult>;
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    output_url: Option<String>,
    #[serde(default)]
    err: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeepAiClient {
    http: Client,
    api_key: String,
    base_url: Url,
}

impl DeepAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ColorizerError::config(format!(
                "{MODEL_API_KEY_ENV} is not set"
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ColorizerError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: Url::parse(base_url.as_ref())?,
        })
    }

    /// The request timeout is the colorize deadline; the pipeline enforces it again.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let api_key = credentials
            .model_api_key
            .clone()
            .ok_or_else(|| ColorizerError::config(format!("{MODEL_API_KEY_ENV} is not set")))?;
        Self::new(api_key, &config.endpoints.colorize, config.timeouts.colorize)
    }

    fn endpoint(&self) -> Result<Url> {
        Ok(self.base_url.join(&format!("/api/{MODEL_NAME}"))?)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("api-key", &self.api_key)
    }
}

#[async_trait]
impl ColorizationService for DeepAiClient {
    async fn colorize(&self, image_url: &str) -> Result<ColorizationResult> {
        let url = self.endpoint()?;
        tracing::debug!(%image_url, "requesting colorization");
        let response = self
            .authed(self.http.post(url))
            .form(&[("image", image_url)])
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "the model did not answer in time".to_string()
                } else {
                    format!("model request failed: {e}")
                };
                ColorizerError::colorization(None, message)
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        parse_model_response(status, &body)
    }
}

fn parse_model_response(status: StatusCode, body: &str) -> Result<ColorizationResult> {
    let parsed: Option<ModelResponse> = serde_json::from_str(body).ok();

    if !status.is_success() {
        let message = parsed
            .and_then(|r| r.err.or(r.status))
            .unwrap_or_else(|| format!("model returned status {}", status.as_u16()));
        return Err(ColorizerError::colorization(Some(status), message));
    }

    let Some(response) = parsed else {
        return Err(ColorizerError::colorization(
            Some(status),
            "model returned an unreadable response",
        ));
    };
    if let Some(err) = response.err {
        return Err(ColorizerError::colorization(Some(status), err));
    }

    let output_url = response
        .output_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ColorizerError::colorization(Some(status), "model returned no output image"))?;
    // The id is stored with the record, so an answer without one is unusable.
    let id = match response.id {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ColorizerError::colorization(
                Some(status),
                "model returned no colorization id",
            ))
        }
    };

    Ok(ColorizationResult { output_url, id })
}
