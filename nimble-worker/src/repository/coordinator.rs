//! Coordinator repository
//!
//! Handles communication with the coordinator for the two calls of a cycle:
//! - Acquiring a task for this worker's address
//! - Submitting the artifact of a finished task

use async_trait::async_trait;
use nimble_client::{ClientError, CompletionAck, CoordinatorClient};
use nimble_core::domain::{Artifact, TaskDescriptor, WorkerAddress};

/// Repository trait for coordinator operations
#[async_trait]
pub trait CoordinatorRepository: Send + Sync {
    /// Requests the next task for `address`
    async fn acquire_task(&self, address: &WorkerAddress) -> Result<TaskDescriptor, ClientError>;

    /// Uploads `artifact` and claims credit for it on behalf of `address`
    async fn submit_completion(
        &self,
        address: &WorkerAddress,
        artifact: &Artifact,
    ) -> Result<CompletionAck, ClientError>;
}

/// HTTP implementation of CoordinatorRepository
pub struct HttpCoordinatorRepository {
    client: CoordinatorClient,
}

impl HttpCoordinatorRepository {
    pub fn new(client: CoordinatorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoordinatorRepository for HttpCoordinatorRepository {
    async fn acquire_task(&self, address: &WorkerAddress) -> Result<TaskDescriptor, ClientError> {
        self.client.acquire_task(address).await
    }

    async fn submit_completion(
        &self,
        address: &WorkerAddress,
        artifact: &Artifact,
    ) -> Result<CompletionAck, ClientError> {
        self.client.submit_completion(address, artifact).await
    }
}
