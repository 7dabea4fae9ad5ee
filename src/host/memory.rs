//! In-memory host: stream registry, message history and a delivery log.
//!
//! Backs the replay binary and the tests. Sends to streams marked as failing
//! return `HostError::SendFailed` so partial-delivery paths can be exercised.
//! Per-target delays stall individual calls to exercise host timeouts.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::types::{MessageId, StoredMessage, StreamId};
use super::HostApi;
use crate::error::HostError;

/// Serializable starting state for a [`MemoryHost`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostFixture {
    /// Group id → stream id.
    pub groups: HashMap<String, StreamId>,
    /// User id → private stream id.
    pub users: HashMap<String, StreamId>,
    pub history: Vec<StoredMessage>,
    /// Streams every send to fails.
    pub failing_streams: Vec<StreamId>,
}

/// A forward recorded by the host.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub id: Uuid,
    pub target: StreamId,
    pub messages: Vec<MessageId>,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Default)]
struct HostState {
    groups: HashMap<String, StreamId>,
    users: HashMap<String, StreamId>,
    history: Vec<StoredMessage>,
    failing: HashSet<StreamId>,
    /// Group or user id → stall before answering a stream lookup.
    lookup_delays: HashMap<String, Duration>,
    history_delays: HashMap<StreamId, Duration>,
    send_delays: HashMap<StreamId, Duration>,
    deliveries: Vec<Delivery>,
}

/// Host implementation that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryHost {
    state: RwLock<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: HostFixture) -> Self {
        Self {
            state: RwLock::new(HostState {
                groups: fixture.groups,
                users: fixture.users,
                history: fixture.history,
                failing: fixture.failing_streams.into_iter().collect(),
                ..HostState::default()
            }),
        }
    }

    pub async fn add_group(&self, group_id: &str, stream: &str) {
        self.state
            .write()
            .await
            .groups
            .insert(group_id.to_string(), StreamId::from(stream));
    }

    pub async fn add_user(&self, user_id: &str, stream: &str) {
        self.state
            .write()
            .await
            .users
            .insert(user_id.to_string(), StreamId::from(stream));
    }

    /// Append a message to the stream history.
    pub async fn record_message(&self, message: StoredMessage) {
        self.state.write().await.history.push(message);
    }

    /// Make every future send to `stream` fail.
    pub async fn fail_sends_to(&self, stream: &str) {
        self.state.write().await.failing.insert(StreamId::from(stream));
    }

    /// Stall every lookup of group or user `id` for `delay`.
    pub async fn delay_lookups_of(&self, id: &str, delay: Duration) {
        self.state
            .write()
            .await
            .lookup_delays
            .insert(id.to_string(), delay);
    }

    /// Stall every history query on `stream` for `delay`.
    pub async fn delay_history_of(&self, stream: &str, delay: Duration) {
        self.state
            .write()
            .await
            .history_delays
            .insert(StreamId::from(stream), delay);
    }

    /// Stall every send to `stream` for `delay` before it is recorded.
    pub async fn delay_sends_to(&self, stream: &str, delay: Duration) {
        self.state
            .write()
            .await
            .send_delays
            .insert(StreamId::from(stream), delay);
    }

    async fn stall<K>(&self, pick: impl FnOnce(&HostState) -> &HashMap<K, Duration>, key: &K)
    where
        K: std::hash::Hash + Eq,
    {
        let delay = pick(&*self.state.read().await).get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Snapshot of successful forwards, in send order.
    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.state.read().await.deliveries.clone()
    }
}

#[async_trait]
impl HostApi for MemoryHost {
    async fn stream_for_group(&self, group_id: &str) -> Result<Option<StreamId>, HostError> {
        self.stall(|s| &s.lookup_delays, &group_id.to_string()).await;
        Ok(self.state.read().await.groups.get(group_id).cloned())
    }

    async fn stream_for_user(&self, user_id: &str) -> Result<Option<StreamId>, HostError> {
        self.stall(|s| &s.lookup_delays, &user_id.to_string()).await;
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn messages_before(
        &self,
        stream: &StreamId,
        before: DateTime<Utc>,
        limit: usize,
        exclude_bot: bool,
    ) -> Result<Vec<StoredMessage>, HostError> {
        self.stall(|s| &s.history_delays, stream).await;
        let state = self.state.read().await;
        let mut matching: Vec<StoredMessage> = state
            .history
            .iter()
            .filter(|m| &m.stream_id == stream && m.timestamp < before)
            .filter(|m| !(exclude_bot && m.from_bot))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn send_forward(
        &self,
        target: &StreamId,
        messages: &[MessageId],
    ) -> Result<(), HostError> {
        self.stall(|s| &s.send_delays, target).await;
        let mut state = self.state.write().await;
        if state.failing.contains(target) {
            return Err(HostError::SendFailed {
                stream: target.to_string(),
                reason: "stream rejected the forward".into(),
            });
        }
        let delivery = Delivery {
            id: Uuid::new_v4(),
            target: target.clone(),
            messages: messages.to_vec(),
            delivered_at: Utc::now(),
        };
        debug!(delivery_id = %delivery.id, target = %target, "Recorded forward");
        state.deliveries.push(delivery);
        Ok(())
    }
}
