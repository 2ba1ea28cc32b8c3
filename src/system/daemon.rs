//! Daemon lifecycle control via systemctl.

use std::process::Command;

use tracing::debug;

use crate::error::{PptpctlError, Result};

/// Lifecycle operations the configuration manager delegates to.
pub trait DaemonControl {
    /// Restart the managed daemon so edited config takes effect.
    fn restart(&self) -> Result<()>;

    /// Whether the managed daemon is currently active.
    fn is_running(&self) -> Result<bool>;

    /// Whether another service unit is installed on this host.
    fn is_installed(&self, unit: &str) -> Result<bool>;
}

/// systemd-backed daemon control.
pub struct Systemctl {
    unit: String,
}

impl Systemctl {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }
}

impl DaemonControl for Systemctl {
    fn restart(&self) -> Result<()> {
        debug!(unit = %self.unit, "restarting daemon");
        let output = run("systemctl", &["restart", &self.unit])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Access denied") || stderr.contains("Permission denied") {
                return Err(PptpctlError::PermissionDenied);
            }
            return Err(PptpctlError::CommandFailed {
                command: format!("systemctl restart {}", self.unit),
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    fn is_running(&self) -> Result<bool> {
        // `is-active` exits non-zero for inactive units; that is an answer,
        // not a failure.
        let output = run("systemctl", &["is-active", "--quiet", &self.unit])?;
        Ok(output.status.success())
    }

    fn is_installed(&self, unit: &str) -> Result<bool> {
        let service = format!("{unit}.service");
        let output = run("systemctl", &["list-unit-files", "--no-legend", &service])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(output.status.success() && !stdout.trim().is_empty())
    }
}

fn run(cmd: &str, args: &[&str]) -> Result<std::process::Output> {
    Command::new(cmd)
        .args(args)
        .output()
        .map_err(|e| PptpctlError::CommandFailed {
            command: format!("{cmd} {}", args.join(" ")),
            message: e.to_string(),
        })
}
