//! Particle registration DTOs

use serde::{Deserialize, Serialize};

use crate::domain::identity::WorkerAddress;
use crate::domain::task::TaskDescriptor;

/// Request body of `POST /register_particle`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterParticle {
    pub address: WorkerAddress,
}

/// Response body of a successful particle registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleAssignment {
    /// Parameters of the task assigned to the worker
    pub args: TaskDescriptor,
}
