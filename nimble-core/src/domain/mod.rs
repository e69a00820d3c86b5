//! Core domain types
//!
//! These types describe what a worker owns during its lifetime: the address
//! it claims credit for, the device it trains on, the task handed out for the
//! current cycle, and the artifact the trainer leaves behind.

pub mod artifact;
pub mod device;
pub mod identity;
pub mod task;

pub use artifact::Artifact;
pub use device::{DeviceIndex, DeviceInfo};
pub use identity::WorkerAddress;
pub use task::TaskDescriptor;
