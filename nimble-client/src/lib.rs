//! Nimble Coordinator Client
//!
//! A small, type-safe HTTP client for the two calls a worker makes against the
//! Nimble coordinator: acquiring a task and submitting its completion.
//!
//! # Example
//!
//! ```no_run
//! use nimble_client::{CoordinatorClient, CoordinatorConfig};
//! use nimble_core::domain::WorkerAddress;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoordinatorClient::new(CoordinatorConfig::new("http://localhost:8080"))?;
//!     let address = WorkerAddress::parse("0xABC").expect("non-empty address");
//!
//!     let task = client.acquire_task(&address).await?;
//!     println!("Assigned model: {}", task.model_name);
//!     Ok(())
//! }
//! ```

mod completions;
pub mod error;
mod particles;

// Re-export commonly used types
pub use error::{ClientError, Operation, Result};
pub use nimble_core::dto::completion::CompletionAck;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Public coordinator of the Nimble network
pub const DEFAULT_COORDINATOR_URL: &str = "https://mainnet.nimble.technology:443";

/// Default hard timeout of a task acquisition
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default hard timeout of a completion upload
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the coordinator
///
/// Built once at startup and handed to [`CoordinatorClient::new`]; the client
/// never reads process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Base URL of the coordinator (e.g., "https://mainnet.nimble.technology:443")
    pub base_url: String,

    /// Hard timeout for `register_particle`
    pub acquire_timeout: Duration,

    /// Hard timeout for `complete_task`, which uploads files
    pub submit_timeout: Duration,
}

impl CoordinatorConfig {
    /// Creates a configuration with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_COORDINATOR_URL)
    }
}

/// HTTP client for the Nimble coordinator
///
/// Neither call is retried here. Every failure is returned to the caller,
/// which decides whether to try again in a later cycle.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    config: CoordinatorConfig,
    /// HTTP client instance
    client: Client,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    ///
    /// # Example
    /// ```
    /// use nimble_client::{CoordinatorClient, CoordinatorConfig};
    ///
    /// let client = CoordinatorClient::new(CoordinatorConfig::new("http://localhost:8080/")).unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:8080");
    /// ```
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a new coordinator client with a custom HTTP client
    ///
    /// This allows configuring proxies, TLS settings, etc. Per-call timeouts
    /// from the configuration still apply.
    pub fn with_client(mut config: CoordinatorConfig, client: Client) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { config, client }
    }

    /// Get the base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle a coordinator response and deserialize its JSON body
    ///
    /// Only `200 OK` counts as success. Any other status, including other 2xx
    /// codes, is reported as the coordinator being unavailable.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        operation: Operation,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status != StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::unexpected_status(
                operation,
                status.as_u16(),
                error_text,
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(operation, e))?;

        serde_json::from_slice(&body).map_err(|e| ClientError::MalformedResponse {
            operation,
            message: format!("Failed to parse JSON response: {}", e),
        })
    }
}
