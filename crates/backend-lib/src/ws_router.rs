// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection handling.
use crate::handlers::rooms::{generate_meeting_id_handler, test_handler};
use crate::sessions::outbox;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use huddle_common::{ClientEvent, ServerEvent, SessionId};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, error, warn};

/// Create the router: `/ws` for signaling plus the meeting id endpoints.
/// With `static_dir` set, every other path is served from that directory.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/room/generate-meetingId", get(generate_meeting_id_handler))
        .route("/room/test", get(test_handler));
    if let Some(dir) = &state.settings.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Handler for WebSocket connections
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut tx, mut rx) = socket.split();
    let coordinator = &state.coordinator;

    // Outbound events for this session, drained into the socket
    let (event_tx, mut event_rx) = outbox(state.settings.outbox_capacity);
    let session = SessionId::new();
    coordinator.connect(session, event_tx);

    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    error!(event = event.name(), %err, "Failed to serialize event");
                    continue;
                },
            };
            if tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = rx.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(%session, %err, "WebSocket read failed");
                break;
            },
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => coordinator.handle_event(session, event),
                Err(err) => {
                    warn!(%session, %err, "Malformed client message");
                    coordinator.notify(
                        session,
                        ServerEvent::error("MALFORMED_MESSAGE", err.to_string()),
                    );
                },
            },
            Message::Close(_) => break,
            _ => {}, // Ping/pong are answered by axum; binary frames are not part of the protocol
        }
    }

    // Cleanup: the session leaves its room when the connection drops
    coordinator.disconnect(session);
    send_task.abort();
}
