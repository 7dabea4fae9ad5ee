//! Configuration types.
//!
//! The plugin config is a TOML file with a `[plugin]` and a `[forward]`
//! section. It is parsed once at activation into typed structs and validated;
//! nothing downstream looks keys up by string path.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Rule text handed to the classifier when `forward.judge_rule` is not set.
pub const DEFAULT_JUDGE_RULE: &str = "1.来源可信：确保重大信息经可靠信源证实，非匿名或可疑来源。\n\
2.合法性评估：信息无淫秽、引战、辱骂信息。\n\
3.娱乐为先：对于奇怪但是有趣的消息适当放宽标准";

/// Model alias used when `forward.judge_model` is not set.
pub const DEFAULT_JUDGE_MODEL: &str = "utils";

/// Whole plugin configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginConfig {
    pub plugin: PluginSection,
    pub forward: ForwardConfig,
}

/// `[plugin]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginSection {
    /// Config file schema version.
    pub config_version: String,
    /// When false the forward handler is never activated.
    pub enabled: bool,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self {
            config_version: "1.0.0".to_string(),
            enabled: true,
        }
    }
}

/// What happens to a message that arrives inside the cooldown window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Hold the message until the window closes, then relay it.
    #[default]
    Delay,
    /// Drop the message.
    Skip,
}

/// How per-destination results fold into one success flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// Every destination must succeed.
    All,
    /// At least one destination must succeed.
    #[default]
    Any,
    /// Only the final destination in the set counts.
    Last,
}

/// `[forward]` section: everything the relay workflow reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwardConfig {
    /// Model alias used for classification.
    pub judge_model: String,
    /// Instruction given to the classifier.
    pub judge_rule: String,
    /// Skip classification and approve every filtered message.
    pub disable_judge: bool,
    /// Trusted origin identifiers (group ids and user ids).
    #[serde(deserialize_with = "id_list")]
    pub sources: Vec<String>,
    /// Destination group identifiers.
    #[serde(deserialize_with = "id_list")]
    pub target_groups: Vec<String>,
    /// Destination user identifiers.
    #[serde(deserialize_with = "id_list")]
    pub target_users: Vec<String>,
    /// Cooldown between successful relays, in seconds.
    pub interval: f64,
    pub cooldown_policy: CooldownPolicy,
    pub success_policy: SuccessPolicy,
    /// Classifier call timeout, in seconds.
    pub judge_timeout: f64,
    /// Timeout for each stream lookup, history query and send, in seconds.
    pub host_timeout: f64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            judge_rule: DEFAULT_JUDGE_RULE.to_string(),
            disable_judge: false,
            sources: Vec::new(),
            target_groups: Vec::new(),
            target_users: Vec::new(),
            interval: 0.0,
            cooldown_policy: CooldownPolicy::default(),
            success_policy: SuccessPolicy::default(),
            judge_timeout: 30.0,
            host_timeout: 10.0,
        }
    }
}

impl ForwardConfig {
    pub fn interval(&self) -> Duration {
        secs(self.interval)
    }

    pub fn judge_timeout(&self) -> Duration {
        secs(self.judge_timeout)
    }

    pub fn host_timeout(&self) -> Duration {
        secs(self.host_timeout)
    }

    /// Check values serde cannot express constraints for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Duration::try_from_secs_f64(self.interval).is_err() {
            return Err(ConfigError::invalid(
                "forward.interval",
                format!(
                    "must be a non-negative, representable number of seconds, got {}",
                    self.interval
                ),
            ));
        }
        for (key, value) in [
            ("forward.judge_timeout", self.judge_timeout),
            ("forward.host_timeout", self.host_timeout),
        ] {
            if value <= 0.0 || Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::invalid(
                    key,
                    format!("must be a positive, representable number of seconds, got {value}"),
                ));
            }
        }
        if !self.disable_judge && self.judge_model.trim().is_empty() {
            return Err(ConfigError::invalid(
                "forward.judge_model",
                "must name a model when the judge is enabled",
            ));
        }
        for (key, ids) in [
            ("forward.sources", &self.sources),
            ("forward.target_groups", &self.target_groups),
            ("forward.target_users", &self.target_users),
        ] {
            if ids.iter().any(|id| id.is_empty()) {
                return Err(ConfigError::invalid(key, "identifiers must not be empty"));
            }
        }
        Ok(())
    }
}

impl PluginConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.forward.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            version = %config.plugin.config_version,
            enabled = config.plugin.enabled,
            "Loaded forward plugin config"
        );
        Ok(config)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// Host ids show up as strings or bare integers in hand-written configs.
fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    let raw = Vec::<RawId>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|id| match id {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        })
        .collect())
}
