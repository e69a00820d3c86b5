//! Service layer
//!
//! Services contain the worker's local logic: discovering compute devices
//! and running training tasks.
//!
//! Both are trait-based to enable testing and dependency injection.

mod devices;
mod execution;

// Re-export traits
pub use devices::DeviceService;
pub use execution::TaskExecutor;

// Re-export implementations
pub use devices::{NvmlDeviceService, select_device};
pub use execution::{CommandExecutor, ExecutionError};
