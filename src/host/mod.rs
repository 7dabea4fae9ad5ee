//! Host platform collaborator interface.
//!
//! The host owns message ingestion, chat streams, history and delivery.
//! The relay workflow only talks to it through [`HostApi`].

pub mod memory;
pub mod types;

pub use memory::MemoryHost;
pub use types::*;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::HostError;

/// Host operations the relay workflow consumes.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Chat stream for a group id, `None` if the host has no such stream.
    async fn stream_for_group(&self, group_id: &str) -> Result<Option<StreamId>, HostError>;

    /// Chat stream for a private conversation with a user id.
    async fn stream_for_user(&self, user_id: &str) -> Result<Option<StreamId>, HostError>;

    /// Messages in `stream` strictly before `before`, newest first, at most `limit`.
    ///
    /// With `exclude_bot` set, messages sent by the bot itself are skipped.
    async fn messages_before(
        &self,
        stream: &StreamId,
        before: DateTime<Utc>,
        limit: usize,
        exclude_bot: bool,
    ) -> Result<Vec<StoredMessage>, HostError>;

    /// Forward existing messages, by reference, into `target`.
    async fn send_forward(&self, target: &StreamId, messages: &[MessageId])
    -> Result<(), HostError>;
}

/// Run a host call under `timeout`; expiry becomes [`HostError::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, call: F) -> Result<T, HostError>
where
    F: Future<Output = Result<T, HostError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(HostError::Timeout {
                operation: operation.to_string(),
                timeout,
            })
        })
}
