//! Forward handler: runs one inbound event through the relay workflow.
//!
//! filter → classifier → cooldown → resolve → dispatch.
//!
//! The handler never suppresses the event it was given: every path ends in a
//! [`HandlerResult`] with `continue_processing` set, and no error reaches the
//! host.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::classifier::Classifier;
use super::cooldown::{self, GateState};
use super::dispatcher::{self, DispatchReport};
use super::filter;
use super::resolver;
use crate::config::{CooldownPolicy, ForwardConfig, PluginConfig};
use crate::host::{HostApi, InboundEvent};
use crate::llm::ModelBackend;

/// Handler name registered with the host.
pub const HANDLER_NAME: &str = "forward_messages_handler";

/// Terminal state of one handling cycle.
#[derive(Debug, Clone)]
pub enum RelayOutcome {
    /// The host passed no event.
    NoEvent,
    NotForwardBundle,
    UntrustedOrigin,
    ClassifierRejected,
    /// Dropped inside the cooldown window under the `skip` policy.
    CooldownSkipped,
    /// No configured destination resolved to a stream.
    NoDestinations,
    /// Nothing in the origin stream to forward.
    MessageNotFound,
    Dispatched { report: DispatchReport, success: bool },
}

impl RelayOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoEvent => "no_event",
            Self::NotForwardBundle => "not_forward_bundle",
            Self::UntrustedOrigin => "untrusted_origin",
            Self::ClassifierRejected => "classifier_rejected",
            Self::CooldownSkipped => "cooldown_skipped",
            Self::NoDestinations => "no_destinations",
            Self::MessageNotFound => "message_not_found",
            Self::Dispatched { success: true, .. } => "relayed",
            Self::Dispatched { success: false, .. } => "relay_failed",
        }
    }

    pub fn is_relayed(&self) -> bool {
        matches!(self, Self::Dispatched { success: true, .. })
    }
}

/// What the host gets back for an event.
#[derive(Debug, Clone)]
pub struct HandlerResult {
    /// Always true: the original event keeps flowing through the host.
    pub continue_processing: bool,
    pub outcome: RelayOutcome,
}

impl HandlerResult {
    fn done(outcome: RelayOutcome) -> Self {
        Self {
            continue_processing: true,
            outcome,
        }
    }
}

/// Relays forwarded bundles from trusted origins to configured destinations.
pub struct ForwardHandler {
    config: ForwardConfig,
    host: Arc<dyn HostApi>,
    classifier: Classifier,
    /// Held from the cooldown check until the relay is recorded, so
    /// concurrent events relay one at a time.
    gate: Mutex<GateState>,
}

impl ForwardHandler {
    pub fn new(config: ForwardConfig, host: Arc<dyn HostApi>, model: Arc<dyn ModelBackend>) -> Self {
        let classifier = Classifier::new(model, config.judge_timeout());
        Self {
            config,
            host,
            classifier,
            gate: Mutex::new(GateState::new()),
        }
    }

    /// Build the handler for a loaded plugin config, or `None` if the plugin is disabled.
    pub fn activate(
        plugin: &PluginConfig,
        host: Arc<dyn HostApi>,
        model: Arc<dyn ModelBackend>,
    ) -> Option<Self> {
        if !plugin.plugin.enabled {
            info!(handler = HANDLER_NAME, "Forward plugin disabled, handler not activated");
            return None;
        }
        info!(
            handler = HANDLER_NAME,
            sources = plugin.forward.sources.len(),
            target_groups = plugin.forward.target_groups.len(),
            target_users = plugin.forward.target_users.len(),
            judge = !plugin.forward.disable_judge,
            "Forward handler activated"
        );
        Some(Self::new(plugin.forward.clone(), host, model))
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    /// Time of the last successful relay.
    pub async fn last_relay(&self) -> Option<Instant> {
        self.gate.lock().await.last_relay()
    }

    /// Handle one inbound event.
    pub async fn handle(&self, event: Option<&InboundEvent>) -> HandlerResult {
        let started = Utc::now();
        let Some(event) = event else {
            debug!("Handler invoked without an event");
            return HandlerResult::done(RelayOutcome::NoEvent);
        };

        let outcome = self.run(event, started).await;
        debug!(
            stream = %event.stream_id,
            outcome = outcome.label(),
            "Forward handling finished"
        );
        HandlerResult::done(outcome)
    }

    async fn run(&self, event: &InboundEvent, started: chrono::DateTime<Utc>) -> RelayOutcome {
        if !filter::is_forward_bundle(event) {
            debug!(stream = %event.stream_id, "Not a forwarded bundle");
            return RelayOutcome::NotForwardBundle;
        }
        if !filter::is_trusted_origin(event, &self.config.sources) {
            debug!(stream = %event.stream_id, "Dropping bundle from untrusted origin");
            return RelayOutcome::UntrustedOrigin;
        }

        if !self.config.disable_judge
            && !self
                .classifier
                .classify(
                    &event.plain_text,
                    &self.config.judge_rule,
                    &self.config.judge_model,
                )
                .await
        {
            return RelayOutcome::ClassifierRejected;
        }

        let mut gate = self.gate.lock().await;
        let interval = self.config.interval();
        match self.config.cooldown_policy {
            CooldownPolicy::Delay => {
                cooldown::check_and_wait(Instant::now(), gate.last_relay(), interval).await;
            }
            CooldownPolicy::Skip => {
                if let Some(left) = cooldown::remaining(Instant::now(), gate.last_relay(), interval)
                {
                    info!(
                        remaining_ms = left.as_millis() as u64,
                        "Inside cooldown window, skipping relay"
                    );
                    return RelayOutcome::CooldownSkipped;
                }
            }
        }

        let host_timeout = self.config.host_timeout();
        let destinations = resolver::resolve_destinations(
            self.host.as_ref(),
            &self.config.target_groups,
            &self.config.target_users,
            host_timeout,
        )
        .await;
        if destinations.is_empty() {
            warn!("No forward destinations resolved, nothing relayed");
            return RelayOutcome::NoDestinations;
        }

        let Some(message) =
            dispatcher::find_message_ref(self.host.as_ref(), event, started, host_timeout).await
        else {
            warn!(stream = %event.stream_id, "No message found to forward");
            return RelayOutcome::MessageNotFound;
        };

        let report =
            dispatcher::dispatch(self.host.as_ref(), &destinations, &message, host_timeout).await;
        let success = report.is_success(self.config.success_policy);
        if success {
            gate.record_relay(Instant::now());
            info!(
                message_id = %message,
                delivered = report.delivered(),
                "Relay succeeded"
            );
        } else {
            error!(
                message_id = %message,
                policy = ?self.config.success_policy,
                delivered = report.delivered(),
                failed = report.failed(),
                "Relay failed"
            );
        }

        RelayOutcome::Dispatched { report, success }
    }
}
