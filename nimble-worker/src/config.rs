//! Worker configuration
//!
//! Defines all configurable parameters for the worker including the
//! coordinator connection, polling cadence and the trainer invocation.

use nimble_client::{
    CoordinatorConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_COORDINATOR_URL, DEFAULT_SUBMIT_TIMEOUT,
};
use nimble_core::domain::artifact::DEFAULT_ARTIFACT_DIR;
use std::path::PathBuf;
use std::time::Duration;

/// Trainer launched for every task unless configured otherwise
pub const DEFAULT_TRAINER_COMMAND: &str = "python3 -m nimble_trainer";

/// Worker configuration
///
/// The worker address is not part of the configuration: it is a positional
/// argument and is resolved separately at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordinator base URL (e.g., "https://mainnet.nimble.technology:443")
    pub coordinator_url: String,

    /// Wait before every task acquisition
    pub poll_interval: Duration,

    /// Hard timeout of a task acquisition
    pub acquire_timeout: Duration,

    /// Hard timeout of a completion upload
    pub submit_timeout: Duration,

    /// Directory the trainer writes its artifact into
    pub artifact_dir: PathBuf,

    /// Trainer program followed by its arguments
    pub trainer_command: Vec<String>,

    /// Maximum time a trainer may run before it is killed
    pub task_timeout: Option<Duration>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(coordinator_url: String) -> Self {
        Self {
            coordinator_url,
            poll_interval: Duration::from_secs(10),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            trainer_command: split_command(DEFAULT_TRAINER_COMMAND),
            task_timeout: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; unset or unparseable values fall back to
    /// the defaults:
    /// - NIMBLE_COORDINATOR_URL
    /// - NIMBLE_POLL_INTERVAL (seconds, default: 10)
    /// - NIMBLE_ACQUIRE_TIMEOUT (seconds, default: 10)
    /// - NIMBLE_SUBMIT_TIMEOUT (seconds, default: 60)
    /// - NIMBLE_ARTIFACT_DIR (default: my_model)
    /// - NIMBLE_TRAINER (whitespace-separated command line)
    /// - NIMBLE_TASK_TIMEOUT (seconds, default: none)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let seconds = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        let defaults = Self::default();

        Self {
            coordinator_url: lookup("NIMBLE_COORDINATOR_URL").unwrap_or(defaults.coordinator_url),
            poll_interval: seconds("NIMBLE_POLL_INTERVAL").unwrap_or(defaults.poll_interval),
            acquire_timeout: seconds("NIMBLE_ACQUIRE_TIMEOUT").unwrap_or(defaults.acquire_timeout),
            submit_timeout: seconds("NIMBLE_SUBMIT_TIMEOUT").unwrap_or(defaults.submit_timeout),
            artifact_dir: lookup("NIMBLE_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            trainer_command: lookup("NIMBLE_TRAINER")
                .map(|s| split_command(&s))
                .unwrap_or(defaults.trainer_command),
            task_timeout: seconds("NIMBLE_TASK_TIMEOUT").or(defaults.task_timeout),
        }
    }

    /// Connection settings handed to the coordinator client
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new(self.coordinator_url.clone())
            .with_acquire_timeout(self.acquire_timeout)
            .with_submit_timeout(self.submit_timeout)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.coordinator_url.is_empty() {
            anyhow::bail!("coordinator_url cannot be empty");
        }

        if !self.coordinator_url.starts_with("http://")
            && !self.coordinator_url.starts_with("https://")
        {
            anyhow::bail!("coordinator_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.acquire_timeout.is_zero() || self.submit_timeout.is_zero() {
            anyhow::bail!("coordinator timeouts must be greater than 0");
        }

        if self.artifact_dir.as_os_str().is_empty() {
            anyhow::bail!("artifact_dir cannot be empty");
        }

        if self.trainer_command.is_empty() {
            anyhow::bail!("trainer_command cannot be empty");
        }

        if self.task_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("task_timeout must be greater than 0 when set");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_COORDINATOR_URL.to_string())
    }
}

/// Splits a command line on whitespace
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}
