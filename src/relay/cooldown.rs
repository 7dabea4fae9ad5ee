//! Cooldown gate between successive relays.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Time of the last successful relay, owned by one handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateState {
    last_relay: Option<Instant>,
}

impl GateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_relay(&self) -> Option<Instant> {
        self.last_relay
    }

    /// Record a successful relay. Never moves the timestamp backwards.
    pub fn record_relay(&mut self, at: Instant) {
        self.last_relay = Some(match self.last_relay {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

/// Time left until `interval` has passed since `last`, if any.
pub fn remaining(now: Instant, last: Option<Instant>, interval: Duration) -> Option<Duration> {
    let last = last?;
    let elapsed = now.saturating_duration_since(last);
    interval.checked_sub(elapsed).filter(|d| !d.is_zero())
}

/// Suspend until the cooldown window has closed. Returns how long it waited.
pub async fn check_and_wait(now: Instant, last: Option<Instant>, interval: Duration) -> Duration {
    match remaining(now, last, interval) {
        Some(wait) => {
            info!(wait_ms = wait.as_millis() as u64, "Relay cooling down");
            tokio::time::sleep(wait).await;
            wait
        }
        None => Duration::ZERO,
    }
}
