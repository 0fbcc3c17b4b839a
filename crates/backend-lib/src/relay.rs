// ============================
// crates/backend-lib/src/relay.rs
// ============================
//! Point-to-point forwarding of WebRTC negotiation messages.
use crate::error::{DeliveryError, RelayError};
use crate::sessions::SessionDirectory;
use ::metrics::counter;
use huddle_common::{NegotiationPayload, ServerEvent, SessionId, SignalKind};
use std::sync::Arc;
use tracing::debug;

/// Forwards offers, answers and ICE candidates to the addressed session only.
///
/// Delivery is best-effort and at-most-once: nothing is queued for sessions
/// that are not connected, a target whose queue is full loses the message,
/// and nothing is retried.
#[derive(Debug, Clone)]
pub struct SignalingRelay {
    sessions: Arc<SessionDirectory>,
}

impl SignalingRelay {
    pub fn new(sessions: Arc<SessionDirectory>) -> Self {
        Self { sessions }
    }

    /// Stamp `from` with `sender` and deliver the payload to its `to` target.
    /// Returns the session the payload was delivered to.
    pub fn relay(
        &self,
        kind: SignalKind,
        sender: SessionId,
        mut payload: NegotiationPayload,
    ) -> Result<SessionId, RelayError> {
        let target = payload.target().ok_or_else(|| {
            RelayError::MissingTarget(
                payload
                    .raw_target()
                    .map_or_else(|| "no `to` field".to_string(), ToString::to_string),
            )
        })?;
        let room = payload.room().map(str::to_owned);

        payload.stamp_sender(sender);
        self.sessions
            .send(target, ServerEvent::signal(kind, payload))
            .map_err(|err| match err {
                DeliveryError::Gone(_) => RelayError::TargetNotFound(target),
                DeliveryError::Saturated(_) => RelayError::TargetSaturated(target),
            })?;

        counter!(crate::metrics::SIGNAL_RELAYED, "kind" => kind.as_str()).increment(1);
        debug!(%kind, from = %sender, to = %target, room = room.as_deref(), "Relayed negotiation message");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::sessions::{outbox, DEFAULT_OUTBOX_CAPACITY};

    fn payload(value: serde_json::Value) -> NegotiationPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_relay_reaches_only_target_with_true_sender() {
        let sessions = Arc::new(SessionDirectory::new());
        let relay = SignalingRelay::new(sessions.clone());
        let (sender, target, bystander) = (SessionId::new(), SessionId::new(), SessionId::new());
        let (sender_tx, mut sender_rx) = outbox(DEFAULT_OUTBOX_CAPACITY);
        let (target_tx, mut target_rx) = outbox(DEFAULT_OUTBOX_CAPACITY);
        let (bystander_tx, mut bystander_rx) = outbox(DEFAULT_OUTBOX_CAPACITY);
        sessions.register(sender, sender_tx);
        sessions.register(target, target_tx);
        sessions.register(bystander, bystander_tx);

        let forged = SessionId::new();
        let delivered = relay
            .relay(
                SignalKind::Offer,
                sender,
                payload(json!({
                    "room": "abc-defg-hij",
                    "to": target.to_string(),
                    "from": forged.to_string(),
                    "sdp": {"type": "offer", "sdp": "v=0"}
                })),
            )
            .unwrap();
        assert_eq!(delivered, target);

        let ServerEvent::Offer(received) = target_rx.try_recv().unwrap() else {
            panic!("Expected offer");
        };
        assert_eq!(received.sender(), Some(sender));
        assert_eq!(received.get("sdp").unwrap()["sdp"], "v=0");
        assert_eq!(received.room(), Some("abc-defg-hij"));
        assert!(sender_rx.try_recv().is_err());
        assert!(bystander_rx.try_recv().is_err());
    }

    #[test]
    fn test_room_field_does_not_affect_routing() {
        let sessions = Arc::new(SessionDirectory::new());
        let relay = SignalingRelay::new(sessions.clone());
        let target = SessionId::new();
        let (tx, mut rx) = outbox(DEFAULT_OUTBOX_CAPACITY);
        sessions.register(target, tx);

        relay
            .relay(
                SignalKind::Candidate,
                SessionId::new(),
                payload(json!({"room": "some-other-room", "to": target.to_string()})),
            )
            .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Candidate(_)));
    }

    #[test]
    fn test_unknown_target_is_reported() {
        let relay = SignalingRelay::new(Arc::new(SessionDirectory::new()));
        let target = SessionId::new();
        let err = relay
            .relay(
                SignalKind::Answer,
                SessionId::new(),
                payload(json!({"to": target.to_string()})),
            )
            .unwrap_err();
        assert_eq!(err, RelayError::TargetNotFound(target));
    }

    #[test]
    fn test_missing_or_malformed_target() {
        let relay = SignalingRelay::new(Arc::new(SessionDirectory::new()));
        let sender = SessionId::new();
        assert!(matches!(
            relay.relay(SignalKind::Offer, sender, payload(json!({}))),
            Err(RelayError::MissingTarget(_))
        ));
        assert!(matches!(
            relay.relay(SignalKind::Offer, sender, payload(json!({"to": 42}))),
            Err(RelayError::MissingTarget(_))
        ));
    }

    #[test]
    fn test_non_reading_target_drops_excess_messages() {
        let sessions = Arc::new(SessionDirectory::new());
        let relay = SignalingRelay::new(sessions.clone());
        let (sender, target) = (SessionId::new(), SessionId::new());
        let (tx, rx) = outbox(DEFAULT_OUTBOX_CAPACITY);
        sessions.register(target, tx);

        let sdp = "a".repeat(1024);
        let mut dropped = 0;
        for _ in 0..1_000 {
            let result = relay.relay(
                SignalKind::Offer,
                sender,
                payload(json!({"to": target.to_string(), "sdp": sdp})),
            );
            if result == Err(RelayError::TargetSaturated(target)) {
                dropped += 1;
            }
        }
        assert_eq!(rx.len(), DEFAULT_OUTBOX_CAPACITY);
        assert_eq!(dropped, 1_000 - DEFAULT_OUTBOX_CAPACITY);
    }
}
