// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const SESSIONS_ACTIVE: &str = "session.active";
pub const ROOMS_ACTIVE: &str = "room.active";
pub const ROOM_JOINED: &str = "room.joined";
pub const ROOM_FULL: &str = "room.full";
pub const ROOM_LEFT: &str = "room.left";
pub const SIGNAL_RELAYED: &str = "signal.relayed";
pub const SIGNAL_DROPPED: &str = "signal.dropped";
pub const MEETING_ID_GENERATED: &str = "meeting_id.generated";
pub const COMPANION_LAUNCH_FAILED: &str = "companion.launch_failed";
