//! Compute device identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of the local GPU a worker binds its training to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIndex(u32);

impl DeviceIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compute device visible on this host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub index: DeviceIndex,

    /// Marketing name reported by the driver (e.g. "NVIDIA A100-SXM4-40GB")
    pub name: String,
}
