//! Offline audit: runs the evaluation suite as a child process, outside the
//! query path, and captures its console output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::core::config::settings::AuditSettings;
use crate::core::config::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSpec {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub status: AuditStatus,
    pub output: String,
    pub finished_at: DateTime<Utc>,
}

impl AuditOutcome {
    pub fn new(status: AuditStatus, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
            finished_at: Utc::now(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self::new(AuditStatus::Error, message)
    }
}

#[async_trait]
pub trait AuditRunner: Send + Sync {
    /// Never fails; problems are reported through `AuditStatus`.
    async fn run(&self, spec: &AuditSpec) -> AuditOutcome;
}

/// Runs `program args.. <spec path>` with a wall-clock limit. The child is
/// killed if the limit elapses or the caller goes away.
pub struct SubprocessAuditRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl SubprocessAuditRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout,
        }
    }

    pub fn from_settings(settings: &AuditSettings, paths: &AppPaths) -> Self {
        Self::new(settings.program.clone(), settings.args.clone(), settings.timeout)
            .with_working_dir(paths.project_root.clone())
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

#[async_trait]
impl AuditRunner for SubprocessAuditRunner {
    async fn run(&self, spec: &AuditSpec) -> AuditOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&spec.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::info!("Starting audit: {} {:?} {}", self.program, self.args, spec.path.display());

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!("Failed to start audit process {}: {}", self.program, err);
                return AuditOutcome::error(format!(
                    "Audit failed to start ({}): {}",
                    self.program, err
                ));
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return AuditOutcome::error(format!("Audit process error: {}", err));
            }
            Err(_) => {
                tracing::warn!("Audit timed out after {:?}", self.timeout);
                return AuditOutcome::error(format!(
                    "Audit failed: timed out after {} ms.",
                    self.timeout.as_millis()
                ));
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        if output.status.success() {
            tracing::info!("Audit passed");
            AuditOutcome::new(AuditStatus::Pass, text)
        } else {
            let code = output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            tracing::warn!("Audit failed with exit status {}", code);
            AuditOutcome::new(
                AuditStatus::Fail,
                format!("Audit failed (exit {}):\n{}", code, text),
            )
        }
    }
}
