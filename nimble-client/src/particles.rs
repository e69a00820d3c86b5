//! Task acquisition endpoint

use crate::CoordinatorClient;
use crate::error::{ClientError, Operation, Result};
use nimble_core::domain::{TaskDescriptor, WorkerAddress};
use nimble_core::dto::particle::{ParticleAssignment, RegisterParticle};
use tracing::debug;

impl CoordinatorClient {
    /// Register a particle for this worker and return the assigned task
    ///
    /// # Arguments
    /// * `address` - The address the worker claims credit for
    ///
    /// # Returns
    /// The `args` mapping of the coordinator's response
    ///
    /// # Example
    /// ```no_run
    /// # use nimble_client::{CoordinatorClient, CoordinatorConfig};
    /// # use nimble_core::domain::WorkerAddress;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = CoordinatorClient::new(CoordinatorConfig::default())?;
    /// let address = WorkerAddress::parse("0xABC").unwrap();
    /// let task = client.acquire_task(&address).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire_task(&self, address: &WorkerAddress) -> Result<TaskDescriptor> {
        let url = format!("{}/register_particle", self.base_url());
        debug!("Requesting task from {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.config.acquire_timeout)
            .json(&RegisterParticle {
                address: address.clone(),
            })
            .send()
            .await
            .map_err(|e| ClientError::transport(Operation::AcquireTask, e))?;

        let assignment: ParticleAssignment =
            self.handle_response(Operation::AcquireTask, response).await?;

        Ok(assignment.args)
    }
}
