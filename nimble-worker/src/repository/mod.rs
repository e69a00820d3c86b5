//! Repository layer
//!
//! Repositories are stateless adapters over the coordinator client. The
//! worker loop only sees the trait, so tests can swap in a scripted
//! coordinator.

mod coordinator;

pub use coordinator::{CoordinatorRepository, HttpCoordinatorRepository};
