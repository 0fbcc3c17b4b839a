// ============================
// crates/backend-lib/src/coordinator.rs
// ============================
//! Session lifecycle coordination.
//!
//! The coordinator owns the registries and is the only component the
//! transport talks to. A session moves through three states:
//!
//! - `Connected`: registered with an outbound channel, in no room
//! - `InRoom`: member of exactly one room
//! - `Gone`: disconnected, all state released
//!
//! Room notifications (`hostAssigned`, `roomUsers`, `userDisconnected`) are
//! queued while the affected room is locked, so the notifications of one
//! transition reach every member before those of the next transition of the
//! same room.
//!
//! The transport must feed the events of one session sequentially (as a
//! WebSocket read loop does); different sessions may run fully in parallel.

use crate::connections::ConnectionRegistry;
use crate::error::{RelayError, RoomFullError};
use crate::host::{EarliestJoined, HostElector};
use crate::relay::SignalingRelay;
use crate::rooms::{MemberSnapshot, RoomRegistry, Transition};
use crate::sessions::{Outbox, SessionDirectory};
use ::metrics::{counter, gauge};
use huddle_common::{ClientEvent, NegotiationPayload, RoomId, ServerEvent, SessionId, SignalKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    InRoom(RoomId),
    Gone,
}

pub struct SessionLifecycleCoordinator {
    sessions: Arc<SessionDirectory>,
    connections: ConnectionRegistry,
    rooms: RoomRegistry,
    elector: Arc<dyn HostElector>,
    relay: SignalingRelay,
}

impl SessionLifecycleCoordinator {
    /// Coordinator electing the earliest-joined member as host
    pub fn new(max_room_size: usize) -> Self {
        Self::with_elector(max_room_size, Arc::new(EarliestJoined))
    }

    pub fn with_elector(max_room_size: usize, elector: Arc<dyn HostElector>) -> Self {
        let sessions = Arc::new(SessionDirectory::new());
        Self {
            relay: SignalingRelay::new(sessions.clone()),
            sessions,
            connections: ConnectionRegistry::new(),
            rooms: RoomRegistry::new(max_room_size),
            elector,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn sessions(&self) -> &SessionDirectory {
        &self.sessions
    }

    pub fn state(&self, session: SessionId) -> SessionState {
        if !self.sessions.is_connected(session) {
            return SessionState::Gone;
        }
        match self.connections.lookup(session) {
            Some(room_id) => SessionState::InRoom(room_id),
            None => SessionState::Connected,
        }
    }

    /// Register a new session and tell it its own id
    pub fn connect(&self, session: SessionId, outbox: Outbox) {
        self.sessions.register(session, outbox);
        self.notify(session, ServerEvent::Connected(session));

        counter!(crate::metrics::WS_CONNECTION).increment(1);
        gauge!(crate::metrics::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        info!(%session, "Session connected");
    }

    /// Dispatch one inbound event
    pub fn handle_event(&self, session: SessionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom(room_id) => {
                let _ = self.join_room(session, &room_id);
            },
            ClientEvent::Offer(payload) => {
                let _ = self.relay(session, SignalKind::Offer, payload);
            },
            ClientEvent::Answer(payload) => {
                let _ = self.relay(session, SignalKind::Answer, payload);
            },
            ClientEvent::Candidate(payload) => {
                let _ = self.relay(session, SignalKind::Candidate, payload);
            },
        }
    }

    /// Join `room_id`, leaving the session's previous room in the same step.
    ///
    /// On success every member receives `hostAssigned` then `roomUsers`. A
    /// full room answers the requester alone with `full` and leaves the
    /// session where it was.
    pub fn join_room(
        &self,
        session: SessionId,
        room_id: &str,
    ) -> Result<MemberSnapshot, RoomFullError> {
        let result = match self.connections.lookup(session) {
            Some(previous) if previous != room_id => {
                self.rooms
                    .transfer_with(&previous, room_id, session, |left, joined| {
                        if let Some(left) = left {
                            self.announce_departure(session, left);
                        }
                        self.connections.assign(session, room_id);
                        self.announce_membership(&joined.after);
                        joined.after.clone()
                    })
            },
            _ => self.rooms.join_with(room_id, session, |joined| {
                self.connections.assign(session, room_id);
                self.announce_membership(&joined.after);
                joined.after.clone()
            }),
        };

        match &result {
            Ok(members) => {
                counter!(crate::metrics::ROOM_JOINED).increment(1);
                info!(%session, room = room_id, members = members.len(), "Session joined room");
            },
            Err(err) => {
                counter!(crate::metrics::ROOM_FULL).increment(1);
                info!(%session, room = room_id, %err, "Join rejected");
                self.notify(session, ServerEvent::Full(room_id.to_string()));
            },
        }
        result
    }

    /// Relay a negotiation message. Failures are logged and reported to the
    /// sender as an `error` event; they never affect other sessions.
    pub fn relay(
        &self,
        sender: SessionId,
        kind: SignalKind,
        payload: NegotiationPayload,
    ) -> Result<SessionId, RelayError> {
        self.relay.relay(kind, sender, payload).inspect_err(|err| {
            counter!(crate::metrics::SIGNAL_DROPPED, "kind" => kind.as_str()).increment(1);
            warn!(%sender, %kind, %err, "Dropping negotiation message");
            self.notify(sender, ServerEvent::error(err.error_code(), err.to_string()));
        })
    }

    /// Release everything held for `session`. Remaining members of its room
    /// are told who left; an emptied room is deleted silently.
    pub fn disconnect(&self, session: SessionId) {
        if !self.sessions.unregister(session) {
            debug!(%session, "Disconnect for unknown session ignored");
            return;
        }

        if let Some(room_id) = self.connections.lookup(session) {
            let left = self.rooms.leave_with(&room_id, session, |left| {
                self.connections.remove(session);
                self.announce_departure(session, left);
                left.after.len()
            });
            match left {
                Some(remaining) => {
                    counter!(crate::metrics::ROOM_LEFT).increment(1);
                    info!(%session, room = %room_id, remaining, "Session left room");
                },
                None => {
                    // Room already gone; only the stale mapping is left.
                    self.connections.remove(session);
                },
            }
        }

        counter!(crate::metrics::WS_DISCONNECTION).increment(1);
        gauge!(crate::metrics::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        info!(%session, "Session disconnected");
    }

    /// Queue an event for one session; a vanished session is not an error here
    pub fn notify(&self, session: SessionId, event: ServerEvent) {
        if let Err(err) = self.sessions.send(session, event) {
            debug!(%err, "Notification dropped");
        }
    }

    fn announce_membership(&self, members: &MemberSnapshot) {
        if let Some(host) = self.elector.elect(members) {
            self.sessions
                .broadcast(members.members(), &ServerEvent::HostAssigned(host));
        }
        self.sessions.broadcast(
            members.members(),
            &ServerEvent::RoomUsers(members.members().to_vec()),
        );
    }

    fn announce_departure(&self, departed: SessionId, left: &Transition) {
        if left.room_closed() {
            debug!(room = left.after.room_id(), "Room closed");
            return;
        }

        let survivors = left.after.members();
        let previous_host = self.elector.elect(&left.before);
        let host = self.elector.elect(&left.after);
        if let Some(host) = host.filter(|host| Some(*host) != previous_host) {
            info!(room = left.after.room_id(), %host, "Host reassigned");
            self.sessions
                .broadcast(survivors, &ServerEvent::HostAssigned(host));
        }
        self.sessions
            .broadcast(survivors, &ServerEvent::UserDisconnected(departed));
        self.sessions
            .broadcast(survivors, &ServerEvent::RoomUsers(survivors.to_vec()));
    }
}
