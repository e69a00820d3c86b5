//! Device service
//!
//! Discovers the GPUs visible on this host and resolves which one the worker
//! trains on. Selection happens once, before the worker loop starts.
//!
//! NVML initialisation is optional: on a host without NVIDIA drivers the
//! service reports zero devices instead of failing, and startup then stops
//! with [`StartupError::NoDeviceAvailable`].

use nimble_core::domain::{DeviceIndex, DeviceInfo};
use nvml_wrapper::Nvml;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::StartupError;

/// Service trait for compute device discovery
pub trait DeviceService: Send + Sync {
    /// Lists every device that can be bound to, ordered by index
    fn discover(&self) -> Vec<DeviceInfo>;
}

/// NVML-backed implementation of DeviceService
pub struct NvmlDeviceService {
    /// `None` when NVML could not be initialised (no drivers / no GPU).
    nvml: Option<Nvml>,
}

impl NvmlDeviceService {
    pub fn new() -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => Some(nvml),
            Err(e) => {
                warn!("NVML unavailable, no CUDA devices will be reported: {}", e);
                None
            }
        };
        Self { nvml }
    }
}

impl Default for NvmlDeviceService {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceService for NvmlDeviceService {
    fn discover(&self) -> Vec<DeviceInfo> {
        let Some(nvml) = self.nvml.as_ref() else {
            return Vec::new();
        };

        let count = match nvml.device_count() {
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to query CUDA device count: {}", e);
                return Vec::new();
            }
        };

        (0..count)
            .map(|idx| {
                let name = nvml
                    .device_by_index(idx)
                    .and_then(|device| device.name())
                    .unwrap_or_else(|e| {
                        warn!("Failed to read name of GPU {}: {}", idx, e);
                        "unknown".to_string()
                    });
                DeviceInfo {
                    index: DeviceIndex::new(idx),
                    name,
                }
            })
            .collect()
    }
}

/// Why a requested device index was not used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDeviceIndex {
    #[error("'{0}' is not a device index")]
    NotANumber(String),

    #[error("GPU {index} does not exist ({count} available)")]
    OutOfRange { index: u32, count: usize },
}

/// How the device index was arrived at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// The operator asked for this device
    Requested,
    /// No device was requested
    Default,
    /// The requested device was invalid and index 0 was used instead
    Fallback(InvalidDeviceIndex),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelection {
    pub index: DeviceIndex,
    pub reason: SelectionReason,
}

/// Resolves the device the worker binds to
///
/// A valid request is used unchanged. An invalid one (not a non-negative
/// integer, or past the last device) is downgraded to index 0 with a warning.
/// Without a request index 0 is used. Only an empty device list is an error.
pub fn select_device(
    devices: &[DeviceInfo],
    requested: Option<&str>,
) -> Result<DeviceSelection, StartupError> {
    if devices.is_empty() {
        return Err(StartupError::NoDeviceAvailable);
    }

    let Some(raw) = requested else {
        info!("No GPU index provided. Using default (0).");
        return Ok(DeviceSelection {
            index: DeviceIndex::new(0),
            reason: SelectionReason::Default,
        });
    };

    match parse_index(raw, devices.len()) {
        Ok(index) => Ok(DeviceSelection {
            index,
            reason: SelectionReason::Requested,
        }),
        Err(invalid) => {
            warn!("Invalid GPU index '{}': {}. Using default (0).", raw, invalid);
            Ok(DeviceSelection {
                index: DeviceIndex::new(0),
                reason: SelectionReason::Fallback(invalid),
            })
        }
    }
}

fn parse_index(raw: &str, count: usize) -> Result<DeviceIndex, InvalidDeviceIndex> {
    let index = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| InvalidDeviceIndex::NotANumber(raw.to_string()))?;

    if (index as usize) < count {
        Ok(DeviceIndex::new(index))
    } else {
        Err(InvalidDeviceIndex::OutOfRange { index, count })
    }
}
