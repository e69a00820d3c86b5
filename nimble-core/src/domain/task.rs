//! Task domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters for one fine-tuning cycle
///
/// Handed out by the coordinator under the `args` key of a particle
/// registration. The named fields are the ones every trainer needs; any other
/// key the coordinator sends is kept in `extra` so the mapping passed on to
/// the trainer is exactly the one received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Model to fine-tune (e.g. a Hugging Face model id)
    pub model_name: String,

    /// Dataset to train and evaluate on
    pub dataset_name: String,

    /// Number of classification labels
    pub num_labels: u32,

    /// Rows sampled from each of the train and test splits
    pub num_rows: u64,

    /// Seed used to shuffle the dataset before sampling
    pub seed: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskDescriptor {
    /// Renders the descriptor back into the JSON mapping the coordinator sent
    pub fn to_json(&self) -> Value {
        // Serializing a struct of strings, integers and a JSON map cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
