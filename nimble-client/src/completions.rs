//! Task completion endpoint

use crate::CoordinatorClient;
use crate::error::{ClientError, Operation, Result};
use nimble_core::domain::{Artifact, WorkerAddress};
use nimble_core::dto::completion::{CompletionAck, CompletionClaim};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use tracing::debug;

impl CoordinatorClient {
    /// Upload the artifact of the current cycle and claim credit for it
    ///
    /// The form carries the model configuration as `file1`, the training
    /// arguments as `file2` and the JSON-encoded address as `r`.
    ///
    /// # Arguments
    /// * `address` - The address the worker claims credit for
    /// * `artifact` - Artifact produced by the trainer in this cycle
    ///
    /// # Returns
    /// The coordinator's acknowledgement
    pub async fn submit_completion(
        &self,
        address: &WorkerAddress,
        artifact: &Artifact,
    ) -> Result<CompletionAck> {
        let url = format!("{}/complete_task", self.base_url());
        let form = completion_form(address, artifact).await?;

        debug!("Submitting artifact {} to {}", artifact.dir().display(), url);

        let response = self
            .client
            .post(&url)
            .timeout(self.config.submit_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::transport(Operation::SubmitCompletion, e))?;

        self.handle_response(Operation::SubmitCompletion, response)
            .await
    }
}

/// Builds the completion upload
///
/// Both files are read fully before the request starts, so their handles are
/// already closed whether or not the upload succeeds.
async fn completion_form(address: &WorkerAddress, artifact: &Artifact) -> Result<Form> {
    let config = file_part(&artifact.config_path()).await?;
    let training_args = file_part(&artifact.training_args_path()).await?;

    let claim = serde_json::to_string(&CompletionClaim {
        address: address.clone(),
    })
    .map_err(|e| ClientError::InvalidRequest(format!("Failed to encode address: {}", e)))?;

    let claim = Part::text(claim)
        .mime_str("application/json")
        .map_err(|e| ClientError::InvalidRequest(format!("Failed to set MIME type: {}", e)))?;

    Ok(Form::new()
        .part("file1", config)
        .part("file2", training_args)
        .part("r", claim))
}

async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::ArtifactUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(Part::bytes(bytes).file_name(file_name))
}
