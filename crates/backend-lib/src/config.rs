// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use crate::error::AppError;
use crate::sessions::DEFAULT_OUTBOX_CAPACITY;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "huddle.toml";
/// Prefix for environment overrides, e.g. `HUDDLE_MAX_ROOM_SIZE=6`
pub const ENV_PREFIX: &str = "HUDDLE_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Maximum number of sessions per room
    pub max_room_size: usize,
    /// Events buffered per session before further ones are dropped
    pub outbox_capacity: usize,
    /// Directory with the browser client, served for paths not routed
    /// otherwise. Nothing is served when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
    /// Companion bot process settings
    pub companion: CompanionSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Companion process launched for every generated meeting id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompanionSettings {
    /// Launch the companion at all
    pub enabled: bool,
    /// Program to execute
    pub program: String,
    /// Arguments placed before the meeting id
    pub args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            max_room_size: 4,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            static_dir: None,
            companion: CompanionSettings::default(),
        }
    }
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "node".to_string(),
            args: vec!["node-bot/bot-server.js".to_string()],
        }
    }
}

impl Settings {
    /// Load settings from defaults, then `path`, then `HUDDLE_*` variables.
    /// A missing file is not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "invalid log_level {:?}, expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.max_room_size == 0 {
            return Err(AppError::Config("max_room_size must be at least 1".to_string()));
        }
        if self.outbox_capacity == 0 {
            return Err(AppError::Config("outbox_capacity must be at least 1".to_string()));
        }
        if self.companion.enabled && self.companion.program.trim().is_empty() {
            return Err(AppError::Config(
                "companion.program must be set when the companion is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
