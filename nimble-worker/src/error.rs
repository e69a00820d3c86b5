//! Startup errors
//!
//! The only conditions that stop the worker. Everything that goes wrong
//! once the loop runs is a [`crate::scheduler::worker_loop::CycleError`] instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("Address not provided")]
    MissingIdentity,

    #[error("No CUDA devices available")]
    NoDeviceAvailable,
}
