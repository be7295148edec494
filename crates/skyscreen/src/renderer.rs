//! # Renderer Supervision
//!
//! The renderer runs as a child process that maps the shared frame file
//! and subscribes to the frame bus. It learns where both are from its
//! environment:
//!
//! ```text
//!   SKYSCREEN_FILE        path of the shared frame file
//!   SKYSCREEN_SYNC_PORT   message bus port
//! ```
//!
//! The player polls it between frames and stops when it exits. Dropping
//! the handle kills and reaps the child.

use std::path::Path;
use std::process::{Child, Command, ExitStatus};

use skyscreen_core::{SkyError, SkyResult};

use crate::config::RendererConfig;

/// Environment variable carrying the shared frame path.
pub const ENV_SHARED_FILE: &str = "SKYSCREEN_FILE";

/// Environment variable carrying the bus port.
pub const ENV_SYNC_PORT: &str = "SKYSCREEN_SYNC_PORT";

/// A running renderer child.
pub struct RendererProcess {
    child: Child,
    command: String,
    exit_status: Option<ExitStatus>,
}

impl RendererProcess {
    /// Starts the renderer.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::NotFound`] or [`SkyError::Io`] if the program
    /// cannot be started.
    pub fn spawn(config: &RendererConfig, shared_file: &Path, sync_port: u16) -> SkyResult<Self> {
        let child = Command::new(&config.command)
            .args(&config.args)
            .env(ENV_SHARED_FILE, shared_file)
            .env(ENV_SYNC_PORT, sync_port.to_string())
            .spawn()
            .map_err(|e| SkyError::from_fs(&config.command, e))?;

        tracing::info!("started renderer '{}' (pid {})", config.command, child.id());
        Ok(Self { child, command: config.command.clone(), exit_status: None })
    }

    /// OS process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Health check: whether the child is still running.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Io`] if the child's status cannot be queried.
    pub fn is_running(&mut self) -> SkyResult<bool> {
        if self.exit_status.is_some() {
            return Ok(false);
        }
        match self.child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                tracing::info!("renderer '{}' exited with {}", self.command, status);
                self.exit_status = Some(status);
                Ok(false)
            }
            Err(e) => Err(SkyError::Io { path: self.command.clone().into(), source: e }),
        }
    }

    /// Exit status, once the child has been seen to exit.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Kills the child if still running and waits for it.
    pub fn stop(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            self.exit_status = Some(status);
            return;
        }
        if let Err(e) = self.child.kill() {
            tracing::warn!("failed to kill renderer '{}': {}", self.command, e);
        }
        match self.child.wait() {
            Ok(status) => {
                tracing::info!("renderer '{}' stopped", self.command);
                self.exit_status = Some(status);
            }
            Err(e) => tracing::warn!("failed to reap renderer '{}': {}", self.command, e),
        }
    }
}

impl Drop for RendererProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> RendererConfig {
        RendererConfig { command: "sh".to_string(), args: vec!["-c".to_string(), script.to_string()] }
    }

    #[test]
    fn test_exited_child_reported() {
        let mut renderer = RendererProcess::spawn(&sh("exit 3"), Path::new("/tmp/f"), 5555).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while renderer.is_running().unwrap() {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(renderer.exit_status().unwrap().code(), Some(3));
    }

    #[test]
    fn test_environment_passed() {
        let script = format!("test \"${ENV_SHARED_FILE}\" = /tmp/frame && test \"${ENV_SYNC_PORT}\" = 6001");
        let mut renderer = RendererProcess::spawn(&sh(&script), Path::new("/tmp/frame"), 6001).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while renderer.is_running().unwrap() {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(renderer.exit_status().unwrap().success());
    }

    #[test]
    fn test_stop_kills_running_child() {
        let mut renderer = RendererProcess::spawn(&sh("sleep 30"), Path::new("/tmp/f"), 5555).unwrap();
        assert!(renderer.is_running().unwrap());
        renderer.stop();
        assert!(!renderer.is_running().unwrap());
        assert!(!renderer.exit_status().unwrap().success());
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let config = RendererConfig { command: "/nonexistent/renderer".to_string(), args: vec![] };
        let result = RendererProcess::spawn(&config, Path::new("/tmp/f"), 5555);
        assert!(matches!(result, Err(SkyError::NotFound { .. })));
    }
}
