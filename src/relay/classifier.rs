//! Semantic classifier: asks a model whether a bundle is fit to share.
//!
//! Fail-closed: backend errors, timeouts and any reply other than the
//! affirmative token reject the message. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::error::LlmError;
use crate::llm::ModelBackend;

/// The only reply that approves a relay.
pub const AFFIRMATIVE: &str = "是";

/// Adapter over a [`ModelBackend`] with a bounded call time.
pub struct Classifier {
    backend: Arc<dyn ModelBackend>,
    timeout: Duration,
}

impl Classifier {
    pub fn new(backend: Arc<dyn ModelBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Ask `model_name` whether `text` passes `rule`.
    pub async fn classify(&self, text: &str, rule: &str, model_name: &str) -> bool {
        info!(model = model_name, "Classifying forward bundle");
        let prompt = build_judge_prompt(rule, text);

        let reply = match self.generate(model_name, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    provider = self.backend.provider_name(),
                    model = model_name,
                    error = %e,
                    "Classifier backend unavailable"
                );
                return false;
            }
        };

        let approved = is_affirmative(&reply);
        if approved {
            info!(model = model_name, "Classifier approved relay");
        } else {
            info!(model = model_name, reply = %reply, "Classifier rejected relay");
        }
        approved
    }

    async fn generate(&self, model_name: &str, prompt: &str) -> Result<String, LlmError> {
        tokio::time::timeout(self.timeout, self.backend.generate(model_name, prompt))
            .await
            .unwrap_or(Err(LlmError::Timeout(self.timeout)))
    }
}

/// Build the yes/no instruction for the classifier.
pub fn build_judge_prompt(rule: &str, text: &str) -> String {
    let mut prompt = String::with_capacity(rule.len() + text.len() + 128);
    prompt.push_str(
        "请根据下述规则，判断该聊天记录是否适合分享到其它群聊，仅回复'是'或'否'，不要输出多余内容，如理由、括号、引号等\n",
    );
    prompt.push_str(&format!("判断规则：\n{rule}\n"));
    prompt.push_str(&format!("聊天记录：\n{text}\n"));
    prompt.push_str("是否适合转发：(是/否)");
    prompt
}

/// Trimmed, lowercased reply equals the affirmative token.
pub fn is_affirmative(reply: &str) -> bool {
    reply.trim().to_lowercase() == AFFIRMATIVE
}
