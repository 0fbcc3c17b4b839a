// ============================
// crates/backend-lib/src/connections.rs
// ============================
//! Session to room lookup.
use dashmap::DashMap;
use huddle_common::{RoomId, SessionId};

/// Maps each session to the room it currently belongs to.
///
/// Absence is never an error: a session that never joined, or already left,
/// simply has no mapping.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    rooms_by_session: DashMap<SessionId, RoomId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `session` to `room`, replacing any previous mapping
    pub fn assign(&self, session: SessionId, room: impl Into<RoomId>) {
        self.rooms_by_session.insert(session, room.into());
    }

    pub fn lookup(&self, session: SessionId) -> Option<RoomId> {
        self.rooms_by_session
            .get(&session)
            .map(|entry| entry.value().clone())
    }

    pub fn remove(&self, session: SessionId) {
        self.rooms_by_session.remove(&session);
    }

    pub fn len(&self) -> usize {
        self.rooms_by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms_by_session.is_empty()
    }

    /// Sessions currently mapped to `room`
    pub fn sessions_in(&self, room: &str) -> Vec<SessionId> {
        self.rooms_by_session
            .iter()
            .filter(|entry| entry.value() == room)
            .map(|entry| *entry.key())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_overwrites() {
        let registry = ConnectionRegistry::new();
        let session = SessionId::new();

        registry.assign(session, "abc-defg-hij");
        registry.assign(session, "xyz-wxyz-xyz");
        assert_eq!(registry.lookup(session).as_deref(), Some("xyz-wxyz-xyz"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_and_remove_absent_session() {
        let registry = ConnectionRegistry::new();
        let session = SessionId::new();

        assert!(registry.lookup(session).is_none());
        registry.remove(session);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sessions_in_room() {
        let registry = ConnectionRegistry::new();
        let a = SessionId::new();
        let b = SessionId::new();
        let c = SessionId::new();
        registry.assign(a, "one");
        registry.assign(b, "one");
        registry.assign(c, "two");

        let mut in_one = registry.sessions_in("one");
        in_one.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(in_one, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_assignments() {
        let registry = std::sync::Arc::new(ConnectionRegistry::new());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let registry = registry.clone();
            tasks.spawn(async move {
                let session = SessionId::new();
                registry.assign(session, format!("room-{}", i % 4));
                session
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(registry.lookup(result.unwrap()).is_some());
        }
        assert_eq!(registry.len(), 64);
    }
}
