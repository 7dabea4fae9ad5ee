//! Model backend used by the classifier.
//!
//! The host owns model inference; the relay only needs "send this prompt to
//! the model registered under this alias and give me the text back".
//! [`OpenAiCompatBackend`] is the HTTP implementation used by the replay
//! binary.

pub mod openai;

pub use openai::OpenAiCompatBackend;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{ConfigError, LlmError};

/// Model invocation interface.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Provider name for logging.
    fn provider_name(&self) -> &str;

    /// Run `prompt` against the model registered as `model` and return its reply text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: secrecy::SecretString,
    /// Alias (e.g. `utils`) → provider model id.
    pub models: HashMap<String, String>,
}

impl LlmConfig {
    /// Read backend settings from the environment.
    ///
    /// Returns `Ok(None)` when `FORWARD_RELAY_API_KEY` is unset.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(api_key) = std::env::var("FORWARD_RELAY_API_KEY") else {
            return Ok(None);
        };
        let base_url = std::env::var("FORWARD_RELAY_MODEL_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let models = std::env::var("FORWARD_RELAY_MODELS")
            .unwrap_or_else(|_| "utils=gpt-4o-mini".to_string());

        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: secrecy::SecretString::from(api_key),
            models: parse_model_map(&models)?,
        }))
    }
}

/// Parse `alias=model,alias2=model2`.
pub fn parse_model_map(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut models = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((alias, model)) = entry.split_once('=') else {
            return Err(ConfigError::invalid(
                "FORWARD_RELAY_MODELS",
                format!("expected alias=model, got '{entry}'"),
            ));
        };
        let (alias, model) = (alias.trim(), model.trim());
        if alias.is_empty() || model.is_empty() {
            return Err(ConfigError::invalid(
                "FORWARD_RELAY_MODELS",
                format!("empty alias or model in '{entry}'"),
            ));
        }
        models.insert(alias.to_string(), model.to_string());
    }
    Ok(models)
}
