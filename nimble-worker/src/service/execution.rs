//! Execution service
//!
//! The boundary between the worker loop and the trainer. The loop only knows
//! [`TaskExecutor`]: hand it a task and a device, get an artifact back or an
//! error. [`CommandExecutor`] is the production implementation and runs an
//! external trainer process with the task passed through its environment:
//!
//! - `NIMBLE_TASK_ARGS`: the task descriptor as JSON
//! - `NIMBLE_OUTPUT_DIR`: directory the artifact must be written to
//! - `NIMBLE_DEVICE_INDEX`: index of the GPU to train on

use async_trait::async_trait;
use nimble_core::domain::{Artifact, DeviceIndex, TaskDescriptor};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;

/// Number of trailing stderr lines kept in a failure report
const STDERR_TAIL_LINES: usize = 20;

/// Errors raised while running a training task
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to prepare artifact path {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode task arguments: {0}")]
    InvalidTask(String),

    #[error("Failed to run trainer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trainer exited with {}: {stderr}", exit_description(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("Trainer did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("Trainer did not produce {}", display_paths(.0))]
    MissingArtifact(Vec<PathBuf>),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runs one training task on one device
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Trains according to `task` on `device` and returns the persisted artifact
    ///
    /// On error no artifact may be submitted.
    async fn execute(
        &self,
        task: &TaskDescriptor,
        device: DeviceIndex,
    ) -> Result<Artifact, ExecutionError>;
}

/// Runs an external trainer process per task
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    artifact: Artifact,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    /// Creates an executor for `command` (program followed by its arguments)
    pub fn new(command: &[String], artifact: Artifact, timeout: Option<Duration>) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        Self {
            program,
            args,
            artifact,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.trainer_command,
            Artifact::new(config.artifact_dir.clone()),
            config.task_timeout,
        )
    }

    /// Deletes the artifact files a previous cycle left behind
    ///
    /// Only the well-known artifact files are removed. Anything else in the
    /// directory belongs to the operator and is left alone.
    async fn clear_previous_artifact(&self) -> Result<(), ExecutionError> {
        let dir = self.artifact.dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ExecutionError::Workspace {
                path: dir.to_path_buf(),
                source,
            })?;

        for path in self.artifact.files() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed previous artifact file {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(ExecutionError::Workspace { path, source }),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    async fn execute(
        &self,
        task: &TaskDescriptor,
        device: DeviceIndex,
    ) -> Result<Artifact, ExecutionError> {
        info!(
            "Starting training of {} on {} (GPU {})",
            task.model_name, task.dataset_name, device
        );

        self.clear_previous_artifact().await?;

        let task_args = serde_json::to_string(task)
            .map_err(|e| ExecutionError::InvalidTask(e.to_string()))?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .env("NIMBLE_TASK_ARGS", task_args)
            .env("NIMBLE_OUTPUT_DIR", self.artifact.dir())
            .env("NIMBLE_DEVICE_INDEX", device.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ExecutionError::TimedOut(limit))?,
            None => child.wait_with_output().await,
        };

        let output = waited.map_err(|source| ExecutionError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!(target: "nimble_worker::trainer", "{}", line);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!(target: "nimble_worker::trainer", "{}", line);
        }

        if !output.status.success() {
            return Err(ExecutionError::Failed {
                code: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        let missing = self.artifact.missing_files();
        if !missing.is_empty() {
            return Err(ExecutionError::MissingArtifact(missing));
        }

        Ok(self.artifact.clone())
    }
}

/// Last `n` non-empty lines of `text`
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
