// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Signaling core of the Huddle peer-to-peer call server.
//!
//! Sessions join named rooms of bounded size, each room elects a host, and
//! WebRTC negotiation messages are relayed between exactly two sessions.
//! Media never passes through this server.

pub mod companion;
pub mod config;
pub mod connections;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod host;
pub mod logging;
pub mod meeting_id;
pub mod metrics;
pub mod relay;
pub mod rooms;
pub mod sessions;
pub mod ws_router;

use crate::companion::{launcher_from_settings, CompanionLauncher};
use crate::config::Settings;
use crate::coordinator::SessionLifecycleCoordinator;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Session, room and relay bookkeeping
    pub coordinator: SessionLifecycleCoordinator,
    /// Launcher for the per-meeting companion process
    pub companion: Arc<dyn CompanionLauncher>,
    /// Settings the server was started with
    pub settings: Settings,
}

impl AppState {
    /// Create the application state described by `settings`
    pub fn new(settings: Settings) -> Self {
        let companion = launcher_from_settings(&settings.companion);
        Self::with_companion(settings, companion)
    }

    /// Create the application state with an explicit companion launcher
    pub fn with_companion(settings: Settings, companion: Arc<dyn CompanionLauncher>) -> Self {
        Self {
            coordinator: SessionLifecycleCoordinator::new(settings.max_room_size),
            companion,
            settings,
        }
    }
}
