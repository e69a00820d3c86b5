//! Training artifact layout
//!
//! A trainer persists its model state into a directory. Only two files of that
//! directory are sent to the coordinator as proof of work, and they are always
//! found under the same names.

use std::path::{Path, PathBuf};

/// Directory the trainer writes into unless configured otherwise
pub const DEFAULT_ARTIFACT_DIR: &str = "my_model";

/// Model configuration written by the trainer
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Serialized training arguments written by the trainer
pub const TRAINING_ARGS_FILE_NAME: &str = "training_args.bin";

/// Persisted output of one training cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    dir: PathBuf,
}

impl Artifact {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the model configuration file
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Path of the serialized training arguments
    pub fn training_args_path(&self) -> PathBuf {
        self.dir.join(TRAINING_ARGS_FILE_NAME)
    }

    /// Both submitted files, in upload order
    pub fn files(&self) -> [PathBuf; 2] {
        [self.config_path(), self.training_args_path()]
    }

    /// Returns the submitted files that do not exist on disk
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|path| !path.is_file())
            .collect()
    }
}

impl Default for Artifact {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_DIR)
    }
}
