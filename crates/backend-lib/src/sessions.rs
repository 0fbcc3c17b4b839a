// ============================
// crates/backend-lib/src/sessions.rs
// ============================
//! Outbound channels of connected sessions.
use crate::error::DeliveryError;
use dashmap::DashMap;
use huddle_common::{ServerEvent, SessionId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Sending half of a session's outbound event queue.
///
/// Bounded; events are queued with `try_send` so delivery never suspends the
/// caller. The transport task draining the receiver is the only consumer.
pub type Outbox = mpsc::Sender<ServerEvent>;

/// Default number of events buffered for one session
pub const DEFAULT_OUTBOX_CAPACITY: usize = 32;

/// Create the outbound queue of one session
pub fn outbox(capacity: usize) -> (Outbox, mpsc::Receiver<ServerEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Directory of connected sessions and how to reach them
#[derive(Debug, Default)]
pub struct SessionDirectory {
    outboxes: DashMap<SessionId, Outbox>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: SessionId, outbox: Outbox) {
        self.outboxes.insert(session, outbox);
    }

    /// Returns false if the session was not registered
    pub fn unregister(&self, session: SessionId) -> bool {
        self.outboxes.remove(&session).is_some()
    }

    pub fn is_connected(&self, session: SessionId) -> bool {
        self.outboxes.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    /// Queue `event` for one session. A full queue drops the event.
    pub fn send(&self, session: SessionId, event: ServerEvent) -> Result<(), DeliveryError> {
        let outbox = self
            .outboxes
            .get(&session)
            .ok_or(DeliveryError::Gone(session))?;
        outbox.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Saturated(session),
            TrySendError::Closed(_) => DeliveryError::Gone(session),
        })
    }

    /// Queue a copy of `event` for every listed session, skipping the ones
    /// that are already gone.
    pub fn broadcast(&self, recipients: &[SessionId], event: &ServerEvent) {
        for &recipient in recipients {
            if let Err(err) = self.send(recipient, event.clone()) {
                debug!(event = event.name(), %err, "Skipping broadcast recipient");
            }
        }
    }
}
