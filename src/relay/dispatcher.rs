//! Relay dispatcher: forwards one message to every resolved destination.
//!
//! Destinations are tried in order and a failure never stops the rest.
//! Whether the relay as a whole counts as a success is decided by the
//! configured [`SuccessPolicy`] over the collected [`DispatchReport`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::resolver::Destination;
use crate::config::SuccessPolicy;
use crate::error::HostError;
use crate::host::{HostApi, InboundEvent, MessageId, with_timeout};

/// Result of one send.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub destination: Destination,
    /// `None` on success.
    pub error: Option<HostError>,
}

impl DeliveryAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Every attempt made for one relay, in send order.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub message: Option<MessageId>,
    pub attempts: Vec<DeliveryAttempt>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempts.len() - self.delivered()
    }

    /// Fold the attempts under `policy`. A report with no attempts never succeeds.
    pub fn is_success(&self, policy: SuccessPolicy) -> bool {
        if self.attempts.is_empty() {
            return false;
        }
        match policy {
            SuccessPolicy::All => self.attempts.iter().all(DeliveryAttempt::succeeded),
            SuccessPolicy::Any => self.attempts.iter().any(DeliveryAttempt::succeeded),
            SuccessPolicy::Last => self
                .attempts
                .last()
                .is_some_and(DeliveryAttempt::succeeded),
        }
    }
}

/// Pick the message to forward for `event`.
///
/// Uses the event's own message id when the host provides one, otherwise the
/// most recent non-bot message in the event's stream before `before`.
pub async fn find_message_ref(
    host: &dyn HostApi,
    event: &InboundEvent,
    before: DateTime<Utc>,
    timeout: Duration,
) -> Option<MessageId> {
    if let Some(id) = event.message_id.clone() {
        return Some(id);
    }

    let query = host.messages_before(&event.stream_id, before, 1, true);
    match with_timeout("history query", timeout, query).await {
        Ok(messages) => {
            let found = messages.into_iter().next().map(|m| m.id);
            if let Some(ref id) = found {
                debug!(stream = %event.stream_id, message_id = %id, "Resolved message to forward");
            }
            found
        }
        Err(e) => {
            error!(stream = %event.stream_id, error = %e, "Message history query failed");
            None
        }
    }
}

/// Forward `message` to each destination in order.
pub async fn dispatch(
    host: &dyn HostApi,
    destinations: &[Destination],
    message: &MessageId,
    timeout: Duration,
) -> DispatchReport {
    let mut report = DispatchReport {
        message: Some(message.clone()),
        attempts: Vec::with_capacity(destinations.len()),
    };
    let refs = std::slice::from_ref(message);

    for destination in destinations {
        let send = host.send_forward(&destination.stream, refs);
        let error = match with_timeout("send forward", timeout, send).await {
            Ok(()) => {
                debug!(
                    kind = %destination.kind,
                    id = %destination.id,
                    stream = %destination.stream,
                    "Forwarded message"
                );
                None
            }
            Err(e) => Some(e),
        };

        if let Some(ref e) = error {
            error!(
                kind = %destination.kind,
                id = %destination.id,
                stream = %destination.stream,
                error = %e,
                "Forward to destination failed"
            );
        }

        report.attempts.push(DeliveryAttempt {
            destination: destination.clone(),
            error,
        });
    }

    if report.failed() > 0 && report.delivered() > 0 {
        warn!(
            delivered = report.delivered(),
            failed = report.failed(),
            "Relay partially delivered"
        );
    } else {
        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "Relay dispatch finished"
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, StoredMessage, StreamId};
    use crate::relay::resolver::DestinationKind;

    fn group(id: &str, stream: &str) -> Destination {
        Destination {
            kind: DestinationKind::Group,
            id: id.into(),
            stream: StreamId::from(stream),
        }
    }

    fn report(outcomes: &[bool]) -> DispatchReport {
        DispatchReport {
            message: Some(MessageId::from("m")),
            attempts: outcomes
                .iter()
                .enumerate()
                .map(|(i, ok)| DeliveryAttempt {
                    destination: group(&i.to_string(), "s"),
                    error: (!ok).then(|| HostError::SendFailed {
                        stream: "s".into(),
                        reason: "boom".into(),
                    }),
                })
                .collect(),
        }
    }

    #[test]
    fn success_policies() {
        let mixed_last_fails = report(&[true, false]);
        assert!(!mixed_last_fails.is_success(SuccessPolicy::All));
        assert!(mixed_last_fails.is_success(SuccessPolicy::Any));
        assert!(!mixed_last_fails.is_success(SuccessPolicy::Last));

        let mixed_last_ok = report(&[false, true]);
        assert!(!mixed_last_ok.is_success(SuccessPolicy::All));
        assert!(mixed_last_ok.is_success(SuccessPolicy::Any));
        assert!(mixed_last_ok.is_success(SuccessPolicy::Last));

        let all_ok = report(&[true, true]);
        assert!(all_ok.is_success(SuccessPolicy::All));

        let none_ok = report(&[false, false]);
        assert!(!none_ok.is_success(SuccessPolicy::Any));
    }

    #[test]
    fn empty_report_never_succeeds() {
        let empty = report(&[]);
        assert!(!empty.is_success(SuccessPolicy::All));
        assert!(!empty.is_success(SuccessPolicy::Any));
        assert!(!empty.is_success(SuccessPolicy::Last));
    }

    #[tokio::test]
    async fn failure_does_not_stop_remaining_destinations() {
        let host = MemoryHost::new();
        host.fail_sends_to("bad").await;
        let destinations = vec![group("1", "bad"), group("2", "good")];

        let report = dispatch(
            &host,
            &destinations,
            &MessageId::from("m1"),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(report.attempts.len(), 2);
        assert!(!report.attempts[0].succeeded());
        assert!(report.attempts[1].succeeded());

        let deliveries = host.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, StreamId::from("good"));
        assert_eq!(deliveries[0].messages, vec![MessageId::from("m1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_destination_times_out_without_blocking_others() {
        let host = MemoryHost::new();
        host.delay_sends_to("slow", Duration::from_secs(60)).await;
        let destinations = vec![group("1", "slow"), group("2", "good")];

        let report = dispatch(
            &host,
            &destinations,
            &MessageId::from("m1"),
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(report.attempts.len(), 2);
        assert!(matches!(
            report.attempts[0].error,
            Some(HostError::Timeout { ref operation, timeout })
                if operation == "send forward" && timeout == Duration::from_secs(2)
        ));
        assert!(report.attempts[1].succeeded());
        assert!(report.is_success(SuccessPolicy::Any));
        assert!(!report.is_success(SuccessPolicy::All));

        let deliveries = host.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, StreamId::from("good"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_history_query_yields_no_message() {
        let host = MemoryHost::new();
        host.record_message(StoredMessage {
            id: MessageId::from("latest"),
            stream_id: StreamId::from("src"),
            sender: "someone".into(),
            from_bot: false,
            timestamp: Utc::now() - chrono::Duration::seconds(5),
        })
        .await;
        host.delay_history_of("src", Duration::from_secs(60)).await;
        let event = InboundEvent::group("100", "1", "src", vec![]);

        let found = find_message_ref(&host, &event, Utc::now(), Duration::from_secs(2)).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn message_ref_prefers_event_id() {
        let host = MemoryHost::new();
        let event = InboundEvent::group("100", "1", "src", vec![]).with_message_id("own");

        let found = find_message_ref(&host, &event, Utc::now(), Duration::from_secs(1)).await;
        assert_eq!(found, Some(MessageId::from("own")));
    }

    #[tokio::test]
    async fn message_ref_falls_back_to_latest_user_message() {
        let host = MemoryHost::new();
        let now = Utc::now();
        for (id, from_bot, secs_ago) in [("older", false, 20), ("latest", false, 10), ("bot", true, 5)] {
            host.record_message(StoredMessage {
                id: MessageId::from(id),
                stream_id: StreamId::from("src"),
                sender: "someone".into(),
                from_bot,
                timestamp: now - chrono::Duration::seconds(secs_ago),
            })
            .await;
        }
        let event = InboundEvent::group("100", "1", "src", vec![]);

        let found = find_message_ref(&host, &event, now, Duration::from_secs(1)).await;
        assert_eq!(found, Some(MessageId::from("latest")));
    }

    #[tokio::test]
    async fn message_ref_none_when_history_empty() {
        let host = MemoryHost::new();
        let event = InboundEvent::group("100", "1", "src", vec![]);
        assert_eq!(
            find_message_ref(&host, &event, Utc::now(), Duration::from_secs(1)).await,
            None
        );
    }
}
