//! Namespace-scoped command execution
//!
//! Runs `nsenter -n -t <pid> iptables …` so the firewall command sees the
//! pod's network namespace instead of the host's.

use crate::config::IsolationConfig;
use crate::error::ExecError;
use crate::models::ExecMode;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Runs a firewall command inside a process's network namespace
#[async_trait]
pub trait NamespaceExecutor: Send + Sync {
    /// Returns the captured output for [`ExecMode::Inspect`] and an empty
    /// string for [`ExecMode::Clear`]
    async fn run(&self, pid: u32, mode: ExecMode) -> Result<String, ExecError>;
}

/// [`NamespaceExecutor`] that shells out to `nsenter` and `iptables`
#[derive(Debug, Clone)]
pub struct NsenterExecutor {
    nsenter: String,
    iptables: String,
}

impl Default for NsenterExecutor {
    fn default() -> Self {
        Self::new("nsenter", "iptables")
    }
}

impl NsenterExecutor {
    pub fn new(nsenter: impl Into<String>, iptables: impl Into<String>) -> Self {
        Self {
            nsenter: nsenter.into(),
            iptables: iptables.into(),
        }
    }

    pub fn from_config(config: &IsolationConfig) -> Self {
        Self::new(&config.nsenter_path, &config.iptables_path)
    }

    /// Arguments passed to the namespace-entry helper
    pub fn args(&self, pid: u32, mode: ExecMode) -> Vec<String> {
        let action = match mode {
            ExecMode::Inspect => "-nvL",
            ExecMode::Clear => "-F",
        };
        vec![
            "-n".to_string(),
            "-t".to_string(),
            pid.to_string(),
            self.iptables.clone(),
            action.to_string(),
        ]
    }
}

#[async_trait]
impl NamespaceExecutor for NsenterExecutor {
    async fn run(&self, pid: u32, mode: ExecMode) -> Result<String, ExecError> {
        let args = self.args(pid, mode);
        debug!(program = %self.nsenter, args = ?args, "Running namespace command");

        let output = Command::new(&self.nsenter)
            .args(&args)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: self.nsenter.clone(),
                pid,
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(ExecError::Failed {
                pid,
                status: output.status.to_string(),
                output: detail.to_string(),
            });
        }

        match mode {
            ExecMode::Inspect => Ok(format!("{}{}", stdout, stderr)),
            ExecMode::Clear => Ok(String::new()),
        }
    }
}
