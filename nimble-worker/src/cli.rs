//! Command-line arguments
//!
//! `nimble-worker <ADDRESS> [GPU_INDEX]`, plus optional flags that override
//! the environment configuration.

use clap::Parser;
use nimble_core::domain::WorkerAddress;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, split_command};
use crate::error::StartupError;

#[derive(Debug, Parser)]
#[command(name = "nimble-worker")]
#[command(about = "Nimble network training worker", long_about = None)]
pub struct Cli {
    /// Wallet address credited for completed tasks
    pub address: Option<String>,

    /// Index of the GPU to train on (defaults to 0)
    #[arg(allow_hyphen_values = true)]
    pub gpu_index: Option<String>,

    /// Coordinator URL
    #[arg(long)]
    pub coordinator_url: Option<String>,

    /// Directory the trainer writes its artifact into
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Seconds to wait before every task acquisition
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval: Option<u64>,

    /// Trainer command line
    #[arg(long)]
    pub trainer: Option<String>,
}

impl Cli {
    /// The worker address, required before anything else happens
    pub fn worker_address(&self) -> Result<WorkerAddress, StartupError> {
        self.address
            .as_deref()
            .and_then(WorkerAddress::parse)
            .ok_or(StartupError::MissingIdentity)
    }

    /// Overrides `config` with the flags given on the command line
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.coordinator_url {
            config.coordinator_url = url.clone();
        }
        if let Some(dir) = &self.artifact_dir {
            config.artifact_dir = dir.clone();
        }
        if let Some(seconds) = self.poll_interval {
            config.poll_interval = Duration::from_secs(seconds);
        }
        if let Some(trainer) = &self.trainer {
            config.trainer_command = split_command(trainer);
        }
    }
}
