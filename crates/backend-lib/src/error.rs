// crates/backend-lib/src/error.rs

//! Error types for the signaling core.
use huddle_common::{RoomId, SessionId};
use thiserror::Error;

/// Join attempted on a room already at capacity. Room state is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Room {room_id} is full ({capacity} members)")]
pub struct RoomFullError {
    pub room_id: RoomId,
    pub capacity: usize,
}

/// Failure to forward a negotiation payload. Never fatal: the payload is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Target session {0} is not connected")]
    TargetNotFound(SessionId),

    #[error("Target session {0} is not keeping up; message dropped")]
    TargetSaturated(SessionId),

    #[error("Payload has no valid target session: {0}")]
    MissingTarget(String),
}

impl RelayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::TargetNotFound(_) => "TARGET_NOT_FOUND",
            RelayError::TargetSaturated(_) => "TARGET_SATURATED",
            RelayError::MissingTarget(_) => "MISSING_TARGET",
        }
    }
}

/// An event could not be queued for a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Session {0} is not connected")]
    Gone(SessionId),

    #[error("Outbound queue of session {0} is full")]
    Saturated(SessionId),
}

/// Companion process could not be started
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Refusing to launch companion for malformed meeting id {0:?}")]
    InvalidMeetingId(String),

    #[error("Failed to spawn companion process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Startup errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
