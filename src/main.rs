use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use forward_relay::config::PluginConfig;
use forward_relay::error::{ConfigError, LlmError};
use forward_relay::host::memory::HostFixture;
use forward_relay::host::{InboundEvent, MemoryHost};
use forward_relay::llm::{LlmConfig, ModelBackend, OpenAiCompatBackend};
use forward_relay::relay::ForwardHandler;

/// Host state plus the events to replay against it.
#[derive(Debug, Deserialize)]
struct ReplayFixture {
    #[serde(flatten)]
    host: HostFixture,
    #[serde(default)]
    events: Vec<InboundEvent>,
}

/// Stand-in when no model endpoint is configured; every judge call fails closed.
struct NoModelBackend;

#[async_trait]
impl ModelBackend for NoModelBackend {
    fn provider_name(&self) -> &str {
        "none"
    }

    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::ModelNotAvailable {
            provider: "none".to_string(),
            model: model.to_string(),
        })
    }
}

fn load_fixture() -> forward_relay::error::Result<ReplayFixture> {
    let path = std::env::var("FORWARD_RELAY_FIXTURE")
        .map_err(|_| ConfigError::MissingEnvVar("FORWARD_RELAY_FIXTURE".to_string()))?;
    let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let fixture = serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{path}: {e}")))?;
    Ok(fixture)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = std::env::var("FORWARD_RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let plugin = PluginConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let fixture = load_fixture()?;

    eprintln!("📨 forward-relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Config: {}", config_path.display());
    eprintln!("   Events: {}", fixture.events.len());

    let model: Arc<dyn ModelBackend> = match LlmConfig::from_env()? {
        Some(llm_config) => {
            eprintln!("   Model endpoint: {}", llm_config.base_url);
            Arc::new(OpenAiCompatBackend::new(llm_config))
        }
        None => {
            if !plugin.forward.disable_judge {
                eprintln!("   Warning: FORWARD_RELAY_API_KEY not set, every judge call will reject");
            }
            Arc::new(NoModelBackend)
        }
    };

    let host = Arc::new(MemoryHost::from_fixture(fixture.host));
    let Some(handler) = ForwardHandler::activate(&plugin, host.clone(), model) else {
        eprintln!("   Plugin disabled, nothing to do");
        return Ok(());
    };
    eprintln!();

    for (i, event) in fixture.events.iter().enumerate() {
        let result = handler.handle(Some(event)).await;
        eprintln!(
            "   [{}] {} origin={} -> {}",
            i + 1,
            event.stream_id,
            event.origin_id().unwrap_or("?"),
            result.outcome.label()
        );
    }

    let deliveries = host.deliveries().await;
    println!("{}", serde_json::to_string_pretty(&deliveries)?);
    Ok(())
}
