//! Task completion DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::identity::WorkerAddress;

/// JSON blob carried in the `r` part of the completion upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionClaim {
    pub address: WorkerAddress,
}

/// Acknowledgement returned by `POST /complete_task`
///
/// The coordinator does not document its shape beyond being JSON, so it is
/// kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionAck(pub Value);

impl CompletionAck {
    /// The `status` field, when the coordinator sends one
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }
}
