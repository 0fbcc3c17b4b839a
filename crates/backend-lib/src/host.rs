// ============================
// crates/backend-lib/src/host.rs
// ============================
//! Host election policy.
use crate::rooms::MemberSnapshot;
use huddle_common::SessionId;

/// Picks the coordinating member of a room from its current membership.
///
/// Implementations must be deterministic: the same snapshot always elects
/// the same member, and the elected session is always a member.
pub trait HostElector: Send + Sync {
    fn elect(&self, members: &MemberSnapshot) -> Option<SessionId>;
}

/// The earliest-joined surviving member is host
#[derive(Debug, Default, Clone, Copy)]
pub struct EarliestJoined;

impl HostElector for EarliestJoined {
    fn elect(&self, members: &MemberSnapshot) -> Option<SessionId> {
        members.members().first().copied()
    }
}
