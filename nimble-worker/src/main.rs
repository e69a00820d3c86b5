//! Nimble Worker
//!
//! A long-running worker that earns credit on the Nimble network by
//! fine-tuning models on a local GPU.
//!
//! Architecture:
//! - Configuration: environment variables, overridden by CLI flags
//! - Repositories: the coordinator calls, behind a trait
//! - Services: device discovery and the trainer boundary
//! - Scheduler: the acquire → execute → submit loop
//!
//! Only startup problems (no address, no GPU, bad configuration) stop the
//! process. Failures inside a cycle are logged and the loop moves on.

mod cli;
mod config;
mod error;
mod repository;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use nimble_client::CoordinatorClient;
use nimble_core::domain::DeviceInfo;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::Config;
use crate::repository::HttpCoordinatorRepository;
use crate::scheduler::WorkerLoop;
use crate::service::{CommandExecutor, DeviceService, NvmlDeviceService, select_device};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nimble_worker=info,nimble_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let address = match cli.worker_address() {
        Ok(address) => address,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    // Load configuration
    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: coordinator_url={}, artifact_dir={}",
        config.coordinator_url,
        config.artifact_dir.display()
    );

    // Resolve the GPU once, before the loop
    let devices = NvmlDeviceService::new().discover();
    print_devices(&devices);

    let selection = match select_device(&devices, cli.gpu_index.as_deref()) {
        Ok(selection) => selection,
        Err(e) => {
            error!("{}. Exiting.", e);
            return Err(e.into());
        }
    };
    debug!("GPU {} selected ({:?})", selection.index, selection.reason);

    let client = CoordinatorClient::new(config.coordinator_config())
        .context("Failed to create coordinator client")?;
    let coordinator = Arc::new(HttpCoordinatorRepository::new(client));
    let executor = Arc::new(CommandExecutor::from_config(&config));

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    info!("Poll interval: {:?}", config.poll_interval);

    let stats = WorkerLoop::new(
        address,
        selection.index,
        config.poll_interval,
        coordinator,
        executor,
        shutdown,
    )
    .run()
    .await;

    info!(
        "Completed {} task(s), {} cycle(s) failed",
        stats.completed,
        stats.failed()
    );

    Ok(())
}

/// Lists the available devices for the operator
fn print_devices(devices: &[DeviceInfo]) {
    if devices.is_empty() {
        println!("{}", "No CUDA devices available.".yellow());
        return;
    }

    println!("{}", "Available CUDA devices:".yellow().bold());
    for device in devices {
        println!("  {} {}", format!("{}:", device.index).cyan(), device.name);
    }
}

/// Cancels `token` on Ctrl-C so the loop stops at its next `Preparing` boundary
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested, finishing the current cycle");
        token.cancel();
    });
}
