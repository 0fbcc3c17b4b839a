// ============================
// crates/backend-lib/src/companion.rs
// ============================
//! Companion bot process launched alongside a new meeting.
//!
//! Launching is fire-and-forget: [`spawn_companion`] returns immediately and
//! a failed launch is only logged. The signaling path never waits on it.
use crate::config::CompanionSettings;
use crate::error::LaunchError;
use crate::meeting_id::is_meeting_id;
use ::metrics::counter;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Starts the auxiliary process for a meeting
#[async_trait]
pub trait CompanionLauncher: Send + Sync {
    async fn launch(&self, meeting_id: &str) -> Result<(), LaunchError>;
}

/// Launcher used when the companion is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLauncher;

#[async_trait]
impl CompanionLauncher for NoopLauncher {
    async fn launch(&self, meeting_id: &str) -> Result<(), LaunchError> {
        info!(meeting_id, "Companion disabled, not launching");
        Ok(())
    }
}

/// Runs `program args... <meeting id>` and supervises it until it exits
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, meeting_id: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(meeting_id)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }
}

#[async_trait]
impl CompanionLauncher for ProcessLauncher {
    async fn launch(&self, meeting_id: &str) -> Result<(), LaunchError> {
        // The id ends up on a command line.
        if !is_meeting_id(meeting_id) {
            return Err(LaunchError::InvalidMeetingId(meeting_id.to_string()));
        }

        let mut child = self.command(meeting_id).spawn()?;
        info!(meeting_id, pid = child.id(), program = %self.program, "Companion launched");

        let meeting_id = meeting_id.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(%meeting_id, "Companion exited");
                },
                Ok(status) => {
                    warn!(%meeting_id, %status, "Companion exited with failure");
                },
                Err(err) => {
                    warn!(%meeting_id, %err, "Lost track of companion process");
                },
            }
        });
        Ok(())
    }
}

/// Build the launcher described by the settings
pub fn launcher_from_settings(settings: &CompanionSettings) -> Arc<dyn CompanionLauncher> {
    if settings.enabled {
        Arc::new(ProcessLauncher::new(
            settings.program.clone(),
            settings.args.clone(),
        ))
    } else {
        Arc::new(NoopLauncher)
    }
}

/// Launch the companion on a detached task. Errors are logged, never returned.
pub fn spawn_companion(launcher: Arc<dyn CompanionLauncher>, meeting_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = launcher.launch(&meeting_id).await {
            counter!(crate::metrics::COMPANION_LAUNCH_FAILED).increment(1);
            warn!(%meeting_id, %err, "Companion launch failed");
        }
    })
}
