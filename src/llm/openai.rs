//! OpenAI-compatible chat completions backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{LlmConfig, ModelBackend};
use crate::error::LlmError;

const PROVIDER: &str = "openai-compat";

/// Classification answers are a single token.
const MAX_TOKENS: u32 = 8;

const TEMPERATURE: f32 = 0.0;

/// Backend that posts to `{base_url}/chat/completions`.
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: secrecy::SecretString,
    models: HashMap<String, String>,
}

impl OpenAiCompatBackend {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url,
            api_key: config.api_key,
            models: config.models,
        }
    }

    fn resolve_model(&self, alias: &str) -> Result<&str, LlmError> {
        self.models
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| LlmError::ModelNotAvailable {
                provider: PROVIDER.to_string(),
                model: alias.to_string(),
            })
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatBackend {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let model_id = self.resolve_model(model)?;
        let body = serde_json::json!({
            "model": model_id,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        debug!(alias = model, model = model_id, "Sending completion request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            warn!(status = %status, model = model_id, "Completion request rejected");
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {body_text}"),
            });
        }

        let raw = resp.text().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;
        parse_completion(&raw)
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a chat completions response body.
fn parse_completion(raw: &str) -> Result<String, LlmError> {
    let body: CompletionBody = serde_json::from_str(raw)?;
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "response has no message content".into(),
        })
}
