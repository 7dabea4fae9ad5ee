//! Destination resolver: configured ids → host chat streams.

use std::fmt;
use std::time::Duration;

use tracing::error;

use crate::host::{HostApi, StreamId, with_timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Group,
    User,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => f.write_str("group"),
            Self::User => f.write_str("user"),
        }
    }
}

/// A configured target that resolved to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub kind: DestinationKind,
    /// Identifier as written in the config.
    pub id: String,
    pub stream: StreamId,
}

/// Ordered destinations for one relay attempt: groups first, then users.
pub type DestinationSet = Vec<Destination>;

/// Resolve every configured target, skipping those the host cannot find.
pub async fn resolve_destinations(
    host: &dyn HostApi,
    target_groups: &[String],
    target_users: &[String],
    timeout: Duration,
) -> DestinationSet {
    let mut destinations = Vec::with_capacity(target_groups.len() + target_users.len());

    let targets = target_groups
        .iter()
        .map(|id| (DestinationKind::Group, id))
        .chain(target_users.iter().map(|id| (DestinationKind::User, id)));

    for (kind, id) in targets {
        let lookup = async {
            match kind {
                DestinationKind::Group => host.stream_for_group(id).await,
                DestinationKind::User => host.stream_for_user(id).await,
            }
        };

        match with_timeout(&format!("{kind} stream lookup"), timeout, lookup).await {
            Ok(Some(stream)) => destinations.push(Destination {
                kind,
                id: id.clone(),
                stream,
            }),
            Ok(None) => {
                error!(kind = %kind, id = %id, "No chat stream for forward target");
            }
            Err(e) => {
                error!(kind = %kind, id = %id, error = %e, "Chat stream lookup failed");
            }
        }
    }

    destinations
}
