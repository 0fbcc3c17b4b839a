// ============================
// crates/backend-lib/src/handlers/rooms.rs
// ============================
//! Meeting id endpoints.
use crate::companion::spawn_companion;
use crate::meeting_id::generate_meeting_id;
use crate::AppState;
use ::metrics::counter;
use axum::extract::State;
use std::sync::Arc;
use tracing::info;

/// `GET /room/generate-meetingId`
///
/// Returns a fresh meeting id as plain text. The companion process for the
/// meeting is launched in the background after the id has been chosen.
pub async fn generate_meeting_id_handler(State(state): State<Arc<AppState>>) -> String {
    let meeting_id = generate_meeting_id();
    counter!(crate::metrics::MEETING_ID_GENERATED).increment(1);
    info!(%meeting_id, "Generated meeting id");

    spawn_companion(state.companion.clone(), meeting_id.clone());
    meeting_id
}

/// `GET /room/test`
pub async fn test_handler() -> &'static str {
    "test"
}
