// ============================
// crates/backend-lib/src/rooms.rs
// ============================
//! Room membership and capacity enforcement.
//!
//! Every room owns its own mutex; the map holding the rooms is sharded, so
//! rooms never contend with each other. All membership changes of one room
//! happen under that room's lock, and the `*_with` variants run the caller's
//! follow-up work (registry updates, notifications) before the lock is
//! released. Two transitions of the same room are therefore never observed
//! interleaved.
//!
//! Lock order: a room mutex may be held while touching the room map, but a
//! map guard is never held while waiting on a room mutex. When two rooms are
//! locked together they are locked in room-id order.
use crate::error::RoomFullError;
use ::metrics::gauge;
use dashmap::DashMap;
use huddle_common::{RoomId, SessionId};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Point-in-time membership of one room, in join order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    room_id: RoomId,
    members: Vec<SessionId>,
}

impl MemberSnapshot {
    pub fn new(room_id: impl Into<RoomId>, members: Vec<SessionId>) -> Self {
        Self {
            room_id: room_id.into(),
            members,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Members ordered from earliest to latest join
    pub fn members(&self) -> &[SessionId] {
        &self.members
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.members.contains(&session)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_members(self) -> Vec<SessionId> {
        self.members
    }
}

/// Membership before and after one join or leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub before: MemberSnapshot,
    pub after: MemberSnapshot,
}

impl Transition {
    /// The room was deleted by this transition
    pub fn room_closed(&self) -> bool {
        self.after.is_empty()
    }
}

#[derive(Debug, Default)]
struct Room {
    members: Vec<SessionId>,
    /// Set once the room has emptied and been unlinked from the map; a
    /// joiner holding a stale handle must look the room up again.
    closed: bool,
}

impl Room {
    fn snapshot(&self, room_id: &str) -> MemberSnapshot {
        MemberSnapshot::new(room_id, self.members.clone())
    }

    fn position(&self, session: SessionId) -> Option<usize> {
        self.members.iter().position(|member| *member == session)
    }
}

type RoomSlot = Arc<Mutex<Room>>;

/// Registry of live rooms and their members
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, RoomSlot>,
    capacity: usize,
}

impl RoomRegistry {
    /// Default maximum number of members per room
    pub const DEFAULT_CAPACITY: usize = 4;

    /// Create a registry whose rooms hold at most `capacity` members (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add `session` to `room_id`, creating the room if needed
    pub fn join(&self, room_id: &str, session: SessionId) -> Result<MemberSnapshot, RoomFullError> {
        self.join_with(room_id, session, |joined| joined.after.clone())
    }

    /// Remove `session` from `room_id`. Returns the surviving membership, or
    /// `None` if the room is gone (deleted now, or never existed).
    pub fn leave(&self, room_id: &str, session: SessionId) -> Option<MemberSnapshot> {
        self.leave_with(room_id, session, |left| left.after.clone())
            .filter(|survivors| !survivors.is_empty())
    }

    /// Current membership; empty if the room does not exist
    pub fn members(&self, room_id: &str) -> MemberSnapshot {
        match self.existing_slot(room_id) {
            Some(slot) => slot.lock().snapshot(room_id),
            None => MemberSnapshot::new(room_id, Vec::new()),
        }
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Capacity-checked join. `on_joined` runs while the room is still locked.
    ///
    /// Re-joining a room the session already belongs to keeps its place in
    /// the join order and skips the capacity check.
    pub fn join_with<T>(
        &self,
        room_id: &str,
        session: SessionId,
        on_joined: impl FnOnce(&Transition) -> T,
    ) -> Result<T, RoomFullError> {
        loop {
            let slot = self.slot(room_id);
            let mut room = slot.lock();
            if room.closed {
                continue;
            }

            let before = room.snapshot(room_id);
            if room.position(session).is_none() {
                self.ensure_capacity(room_id, &room)?;
                room.members.push(session);
            }

            let joined = Transition {
                before,
                after: room.snapshot(room_id),
            };
            let outcome = on_joined(&joined);
            drop(room);
            self.record_room_count();
            return Ok(outcome);
        }
    }

    /// Remove `session`; the room is deleted when its last member leaves.
    /// `on_left` runs while the room is still locked. Returns `None` without
    /// calling `on_left` when the room does not exist or `session` is not a
    /// member.
    pub fn leave_with<T>(
        &self,
        room_id: &str,
        session: SessionId,
        on_left: impl FnOnce(&Transition) -> T,
    ) -> Option<T> {
        let slot = self.existing_slot(room_id)?;
        let mut room = slot.lock();
        if room.closed {
            return None;
        }
        let position = room.position(session)?;

        let before = room.snapshot(room_id);
        room.members.remove(position);
        if room.members.is_empty() {
            self.unlink(room_id, &slot, &mut room);
        }

        let left = Transition {
            before,
            after: room.snapshot(room_id),
        };
        let outcome = on_left(&left);
        drop(room);
        self.record_room_count();
        Some(outcome)
    }

    /// Move `session` from room `from` to room `to` as one step.
    ///
    /// Both rooms stay locked while `on_moved` runs; it receives the
    /// departure transition of `from` (`None` if the session was not in it)
    /// and the join transition of `to`. If `to` is full nothing changes.
    pub fn transfer_with<T>(
        &self,
        from: &str,
        to: &str,
        session: SessionId,
        on_moved: impl FnOnce(Option<&Transition>, &Transition) -> T,
    ) -> Result<T, RoomFullError> {
        if from == to {
            return self.join_with(to, session, |joined| on_moved(None, joined));
        }

        loop {
            let Some(from_slot) = self.existing_slot(from) else {
                return self.join_with(to, session, |joined| on_moved(None, joined));
            };
            let to_slot = self.slot(to);
            let (mut from_room, mut to_room) = lock_pair(from, &from_slot, to, &to_slot);

            if to_room.closed {
                continue;
            }
            let Some(position) = from_room.position(session).filter(|_| !from_room.closed) else {
                drop((from_room, to_room));
                return self.join_with(to, session, |joined| on_moved(None, joined));
            };

            let joined_before = to_room.snapshot(to);
            if to_room.position(session).is_none() {
                self.ensure_capacity(to, &to_room)?;
                to_room.members.push(session);
            }

            let left_before = from_room.snapshot(from);
            from_room.members.remove(position);
            if from_room.members.is_empty() {
                self.unlink(from, &from_slot, &mut from_room);
            }

            let left = Transition {
                before: left_before,
                after: from_room.snapshot(from),
            };
            let joined = Transition {
                before: joined_before,
                after: to_room.snapshot(to),
            };
            let outcome = on_moved(Some(&left), &joined);
            drop((from_room, to_room));
            self.record_room_count();
            return Ok(outcome);
        }
    }

    fn ensure_capacity(&self, room_id: &str, room: &Room) -> Result<(), RoomFullError> {
        if room.members.len() >= self.capacity {
            return Err(RoomFullError {
                room_id: room_id.to_string(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Handle to the room, created empty if absent
    fn slot(&self, room_id: &str) -> RoomSlot {
        let entry = self.rooms.entry(room_id.to_string()).or_default();
        Arc::clone(entry.value())
    }

    fn existing_slot(&self, room_id: &str) -> Option<RoomSlot> {
        self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop an emptied room from the map. Caller holds the room lock.
    fn unlink(&self, room_id: &str, slot: &RoomSlot, room: &mut Room) {
        room.closed = true;
        self.rooms
            .remove_if(room_id, |_, linked| Arc::ptr_eq(linked, slot));
    }

    fn record_room_count(&self) {
        gauge!(crate::metrics::ROOMS_ACTIVE).set(self.rooms.len() as f64);
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Lock two distinct rooms in room-id order, returned as (first, second)
fn lock_pair<'a>(
    first_id: &str,
    first: &'a RoomSlot,
    second_id: &str,
    second: &'a RoomSlot,
) -> (MutexGuard<'a, Room>, MutexGuard<'a, Room>) {
    if first_id < second_id {
        let a = first.lock();
        let b = second.lock();
        (a, b)
    } else {
        let b = second.lock();
        let a = first.lock();
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ROOM: &str = "abc-defg-hij";

    #[test]
    fn test_join_creates_room_in_join_order() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        let b = SessionId::new();

        assert_eq!(rooms.join(ROOM, a).unwrap().members(), &[a]);
        assert_eq!(rooms.join(ROOM, b).unwrap().members(), &[a, b]);
        assert!(rooms.contains(ROOM));
        assert_eq!(rooms.room_count(), 1);
    }

    #[test]
    fn test_fifth_join_is_rejected_and_state_unchanged() {
        let rooms = RoomRegistry::default();
        let members: Vec<_> = (0..4).map(|_| SessionId::new()).collect();
        for member in &members {
            rooms.join(ROOM, *member).unwrap();
        }

        let err = rooms.join(ROOM, SessionId::new()).unwrap_err();
        assert_eq!(err.capacity, 4);
        assert_eq!(err.room_id, ROOM);
        assert_eq!(rooms.members(ROOM).members(), members.as_slice());
    }

    #[test]
    fn test_rejoin_is_idempotent_even_when_full() {
        let rooms = RoomRegistry::new(2);
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join(ROOM, a).unwrap();
        rooms.join(ROOM, b).unwrap();

        assert_eq!(rooms.join(ROOM, a).unwrap().members(), &[a, b]);
    }

    #[test]
    fn test_leave_returns_survivors_then_deletes_room() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join(ROOM, a).unwrap();
        rooms.join(ROOM, b).unwrap();

        assert_eq!(rooms.leave(ROOM, a).unwrap().members(), &[b]);
        assert!(rooms.leave(ROOM, b).is_none());
        assert!(!rooms.contains(ROOM));
        assert!(rooms.members(ROOM).is_empty());
        assert_eq!(rooms.room_count(), 0);
    }

    #[test]
    fn test_leave_unknown_room_is_noop() {
        let rooms = RoomRegistry::default();
        assert!(rooms.leave("nope", SessionId::new()).is_none());
        assert!(rooms
            .leave_with("nope", SessionId::new(), |_| unreachable!())
            .is_none());
    }

    #[test]
    fn test_leave_by_non_member_leaves_room_alone() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        rooms.join(ROOM, a).unwrap();

        assert!(rooms.leave_with(ROOM, SessionId::new(), |_| ()).is_none());
        assert_eq!(rooms.members(ROOM).members(), &[a]);
    }

    #[test]
    fn test_join_then_leave_restores_membership() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join(ROOM, a).unwrap();
        let before = rooms.members(ROOM);

        rooms.join(ROOM, b).unwrap();
        rooms.leave(ROOM, b);
        assert_eq!(rooms.members(ROOM), before);
    }

    #[test]
    fn test_transitions_report_before_and_after() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join(ROOM, a).unwrap();

        let joined = rooms.join_with(ROOM, b, Clone::clone).unwrap();
        assert_eq!(joined.before.members(), &[a]);
        assert_eq!(joined.after.members(), &[a, b]);

        let left = rooms.leave_with(ROOM, a, Clone::clone).unwrap();
        assert_eq!(left.before.members(), &[a, b]);
        assert_eq!(left.after.members(), &[b]);
        assert!(!left.room_closed());
    }

    #[test]
    fn test_transfer_moves_between_rooms() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join("first", a).unwrap();
        rooms.join("first", b).unwrap();

        let (left, joined) = rooms
            .transfer_with("first", "second", a, |left, joined| {
                (left.cloned(), joined.clone())
            })
            .unwrap();
        assert_eq!(left.unwrap().after.members(), &[b]);
        assert_eq!(joined.after.members(), &[a]);
        assert_eq!(rooms.members("first").members(), &[b]);
        assert_eq!(rooms.members("second").members(), &[a]);
    }

    #[test]
    fn test_transfer_of_last_member_deletes_source_room() {
        let rooms = RoomRegistry::default();
        let a = SessionId::new();
        rooms.join("second", a).unwrap();

        let closed = rooms
            .transfer_with("second", "first", a, |left, _| {
                left.map(Transition::room_closed)
            })
            .unwrap();
        assert_eq!(closed, Some(true));
        assert!(!rooms.contains("second"));
    }

    #[test]
    fn test_transfer_into_full_room_changes_nothing() {
        let rooms = RoomRegistry::new(1);
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join("first", a).unwrap();
        rooms.join("second", b).unwrap();

        let result = rooms.transfer_with("first", "second", a, |_, _| ());
        assert!(result.is_err());
        assert_eq!(rooms.members("first").members(), &[a]);
        assert_eq!(rooms.members("second").members(), &[b]);
    }

    #[test]
    fn test_capacity_never_below_one() {
        let rooms = RoomRegistry::new(0);
        assert_eq!(rooms.capacity(), 1);
        assert!(rooms.join(ROOM, SessionId::new()).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_joins_never_exceed_capacity() {
        for _ in 0..20 {
            let rooms = Arc::new(RoomRegistry::default());
            let admitted = Arc::new(AtomicUsize::new(0));
            let mut tasks = tokio::task::JoinSet::new();
            for _ in 0..16 {
                let rooms = rooms.clone();
                let admitted = admitted.clone();
                tasks.spawn(async move {
                    if rooms.join(ROOM, SessionId::new()).is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
            while tasks.join_next().await.is_some() {}

            assert_eq!(admitted.load(Ordering::SeqCst), 4);
            assert_eq!(rooms.members(ROOM).len(), 4);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_churn_leaves_no_rooms_behind() {
        let rooms = Arc::new(RoomRegistry::default());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let rooms = rooms.clone();
            tasks.spawn(async move {
                let room = format!("room-{}", i % 3);
                let session = SessionId::new();
                for _ in 0..50 {
                    if rooms.join(&room, session).is_ok() {
                        rooms.leave(&room, session);
                    }
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
        assert_eq!(rooms.room_count(), 0);
    }
}
