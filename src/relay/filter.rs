//! Eligibility filter: local checks that need neither the model nor the host.

use tracing::{debug, warn};

use crate::host::types::{InboundEvent, OriginKind, Segment};

/// True iff the event carries at least one top-level compound segment.
///
/// Events without segment structure are never forwarded bundles.
pub fn is_forward_bundle(event: &InboundEvent) -> bool {
    let Some(segments) = event.segments.as_ref() else {
        debug!(stream = %event.stream_id, "Event has no segment structure");
        return false;
    };
    segments.iter().any(|s| matches!(s, Segment::Seglist(_)))
}

/// True iff the event's origin id is in `whitelist`.
///
/// Group events match on group id, private events on sender id. An empty
/// whitelist trusts nobody.
pub fn is_trusted_origin(event: &InboundEvent, whitelist: &[String]) -> bool {
    if whitelist.is_empty() {
        warn!("Forward source whitelist is empty, rejecting every origin");
        return false;
    }

    let Some(origin_id) = event.origin_id() else {
        debug!(
            origin = ?event.origin,
            stream = %event.stream_id,
            "Event has no origin id"
        );
        return false;
    };

    let trusted = whitelist.iter().any(|s| s == origin_id);
    if !trusted {
        let kind = match event.origin {
            OriginKind::Group => "group",
            OriginKind::Private => "user",
        };
        debug!(origin = kind, id = origin_id, "Origin not in forward whitelist");
    }
    trusted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> Vec<Segment> {
        vec![Segment::Seglist(vec![Segment::Text("quoted".into())])]
    }

    fn whitelist(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seglist_segment_is_forward_bundle() {
        let event = InboundEvent::group("100", "1", "s1", bundle());
        assert!(is_forward_bundle(&event));
    }

    #[test]
    fn seglist_after_text_still_counts() {
        let mut segments = vec![Segment::Text("look".into())];
        segments.extend(bundle());
        let event = InboundEvent::group("100", "1", "s1", segments);
        assert!(is_forward_bundle(&event));
    }

    #[test]
    fn plain_segments_are_not_bundles() {
        let event = InboundEvent::group(
            "100",
            "1",
            "s1",
            vec![Segment::Text("hi".into()), Segment::Image("abc".into())],
        );
        assert!(!is_forward_bundle(&event));
    }

    #[test]
    fn missing_segments_are_not_bundles() {
        let mut event = InboundEvent::group("100", "1", "s1", bundle());
        event.segments = None;
        assert!(!is_forward_bundle(&event));
    }

    #[test]
    fn group_origin_matches_group_id() {
        let event = InboundEvent::group("100", "42", "s1", bundle());
        assert!(is_trusted_origin(&event, &whitelist(&["100"])));
        // Sender id alone does not make a group event trusted.
        assert!(!is_trusted_origin(&event, &whitelist(&["42"])));
    }

    #[test]
    fn private_origin_matches_user_id() {
        let event = InboundEvent::private("42", "s1", bundle());
        assert!(is_trusted_origin(&event, &whitelist(&["42"])));
        assert!(!is_trusted_origin(&event, &whitelist(&["100"])));
    }

    #[test]
    fn empty_whitelist_trusts_nobody() {
        let group = InboundEvent::group("100", "42", "s1", bundle());
        let private = InboundEvent::private("42", "s1", bundle());
        assert!(!is_trusted_origin(&group, &[]));
        assert!(!is_trusted_origin(&private, &[]));
    }

    #[test]
    fn missing_origin_id_is_untrusted() {
        let mut event = InboundEvent::group("100", "42", "s1", bundle());
        event.group_id = None;
        assert!(!is_trusted_origin(&event, &whitelist(&["100", "42"])));
    }
}
