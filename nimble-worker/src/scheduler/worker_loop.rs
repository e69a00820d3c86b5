//! Worker loop
//!
//! Repeatedly acquires a task, trains it and submits the artifact. A cycle
//! that fails at any stage is reported once and abandoned; the loop then
//! waits out the poll interval and starts over with a fresh acquisition. The
//! failed task is never retried.
//!
//! The loop runs until its shutdown token is cancelled. The token is checked
//! at every `Preparing` boundary, so a cycle already in flight completes
//! before the loop exits.

use nimble_client::{ClientError, CompletionAck};
use nimble_core::domain::{DeviceIndex, WorkerAddress};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use super::state::{WorkerState, WorkerStats};
use crate::repository::CoordinatorRepository;
use crate::service::{ExecutionError, TaskExecutor};

/// Why a cycle was abandoned
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to acquire task: {0}")]
    Acquire(#[source] ClientError),

    #[error("Failed to execute task: {0}")]
    Execute(#[source] ExecutionError),

    #[error("Failed to complete task: {0}")]
    Submit(#[source] ClientError),
}

impl CycleError {
    /// The stage the cycle failed in
    pub fn stage(&self) -> WorkerState {
        match self {
            CycleError::Acquire(_) => WorkerState::Acquiring,
            CycleError::Execute(_) => WorkerState::Executing,
            CycleError::Submit(_) => WorkerState::Submitting,
        }
    }
}

/// Drives acquire → execute → submit cycles for one worker
pub struct WorkerLoop {
    address: WorkerAddress,
    device: DeviceIndex,
    poll_interval: Duration,
    coordinator: Arc<dyn CoordinatorRepository>,
    executor: Arc<dyn TaskExecutor>,
    shutdown: CancellationToken,
    state: WorkerState,
    stats: WorkerStats,
}

impl WorkerLoop {
    pub fn new(
        address: WorkerAddress,
        device: DeviceIndex,
        poll_interval: Duration,
        coordinator: Arc<dyn CoordinatorRepository>,
        executor: Arc<dyn TaskExecutor>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            address,
            device,
            poll_interval,
            coordinator,
            executor,
            shutdown,
            state: WorkerState::Preparing,
            stats: WorkerStats::default(),
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[allow(dead_code)]
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Runs cycles until the shutdown token is cancelled
    ///
    /// # Returns
    /// The totals accumulated over the loop's lifetime
    pub async fn run(mut self) -> WorkerStats {
        info!(
            "Address {} started to work on GPU {}",
            self.address, self.device
        );

        loop {
            self.state = WorkerState::Preparing;
            if self.shutdown.is_cancelled() {
                break;
            }

            info!("Preparing");
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = time::sleep(self.poll_interval) => {}
            }

            let span = info_span!("cycle", id = %Uuid::new_v4());
            let _ = self.run_cycle().instrument(span).await;

            debug!(
                "Cycles: {} started, {} completed, {} failed",
                self.stats.cycles_started,
                self.stats.completed,
                self.stats.failed()
            );
        }

        info!(
            "Worker stopped after {} cycle(s): {} completed, {} failed",
            self.stats.cycles_started,
            self.stats.completed,
            self.stats.failed()
        );
        self.stats
    }

    /// Runs a single cycle and returns to `Preparing`
    ///
    /// A failure is reported exactly once here and recorded in the stats; it
    /// is also returned so callers can inspect it.
    pub async fn run_cycle(&mut self) -> Result<CompletionAck, CycleError> {
        self.stats.cycles_started += 1;

        let result = self.cycle().await;

        match &result {
            Ok(_) => self.stats.record_completion(),
            Err(e) => {
                error!(stage = %e.stage(), "Error: {}", e);
                self.stats.record_failure(e.stage());
            }
        }

        self.state = WorkerState::Preparing;
        result
    }

    async fn cycle(&mut self) -> Result<CompletionAck, CycleError> {
        self.state = WorkerState::Acquiring;
        let task = self
            .coordinator
            .acquire_task(&self.address)
            .await
            .map_err(CycleError::Acquire)?;
        info!("Address {} received the task.", self.address);

        self.state = WorkerState::Executing;
        let artifact = self
            .executor
            .execute(&task, self.device)
            .await
            .map_err(CycleError::Execute)?;
        drop(task);
        info!("Address {} executed the task.", self.address);

        self.state = WorkerState::Submitting;
        let ack = self
            .coordinator
            .submit_completion(&self.address, &artifact)
            .await
            .map_err(CycleError::Submit)?;
        info!("Address {} completed the task.", self.address);

        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::HttpCoordinatorRepository;
    use async_trait::async_trait;
    use nimble_client::{CoordinatorClient, CoordinatorConfig, Operation};
    use nimble_core::domain::{Artifact, TaskDescriptor};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::field::{Field, Visit};
    use tracing::subscriber::DefaultGuard;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    /// Records the level and message of every event the worker emits
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

    impl CapturedLogs {
        /// Captures events on the current thread until the guard is dropped
        fn install(&self) -> DefaultGuard {
            tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
        }

        fn errors(&self) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(level, _)| *level == Level::ERROR)
                .count()
        }

        fn count(&self, needle: &str) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, message)| message.contains(needle))
                .count()
        }
    }

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: Subscriber> Layer<S> for CapturedLogs {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if !event.metadata().target().starts_with("nimble_worker") {
                return;
            }
            let mut message = MessageVisitor(String::new());
            event.record(&mut message);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), message.0));
        }
    }

    fn address() -> WorkerAddress {
        WorkerAddress::parse("0xABC").unwrap()
    }

    fn task_json() -> serde_json::Value {
        json!({
            "model_name": "m",
            "dataset_name": "d",
            "num_labels": 2,
            "num_rows": 10,
            "seed": 1
        })
    }

    /// Coordinator that answers from a script and records every call
    struct ScriptedCoordinator {
        calls: Calls,
        fail_acquire: bool,
        fail_submit: bool,
        acquires: AtomicUsize,
        /// Cancel the token once this many acquisitions happened
        stop_after: Option<(usize, CancellationToken)>,
    }

    impl ScriptedCoordinator {
        fn new(calls: Calls) -> Self {
            Self {
                calls,
                fail_acquire: false,
                fail_submit: false,
                acquires: AtomicUsize::new(0),
                stop_after: None,
            }
        }
    }

    #[async_trait]
    impl CoordinatorRepository for ScriptedCoordinator {
        async fn acquire_task(
            &self,
            _address: &WorkerAddress,
        ) -> Result<TaskDescriptor, ClientError> {
            self.calls.lock().unwrap().push("acquire");
            let count = self.acquires.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.stop_after {
                if count >= *limit {
                    token.cancel();
                }
            }

            if self.fail_acquire {
                return Err(ClientError::unexpected_status(
                    Operation::AcquireTask,
                    500,
                    "Failed to init particle",
                ));
            }
            Ok(serde_json::from_value(task_json()).unwrap())
        }

        async fn submit_completion(
            &self,
            _address: &WorkerAddress,
            _artifact: &Artifact,
        ) -> Result<CompletionAck, ClientError> {
            self.calls.lock().unwrap().push("submit");
            if self.fail_submit {
                return Err(ClientError::unexpected_status(
                    Operation::SubmitCompletion,
                    503,
                    "",
                ));
            }
            Ok(CompletionAck(json!({"status": "ok"})))
        }
    }

    /// Executor that records calls and optionally writes a real artifact
    struct ScriptedExecutor {
        calls: Calls,
        fail: bool,
        artifact: Artifact,
        write_files: bool,
        stop_after_run: Option<CancellationToken>,
    }

    impl ScriptedExecutor {
        fn new(calls: Calls) -> Self {
            Self {
                calls,
                fail: false,
                artifact: Artifact::default(),
                write_files: false,
                stop_after_run: None,
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            task: &TaskDescriptor,
            _device: DeviceIndex,
        ) -> Result<Artifact, ExecutionError> {
            self.calls.lock().unwrap().push("execute");
            if let Some(token) = &self.stop_after_run {
                token.cancel();
            }

            if self.fail {
                return Err(ExecutionError::Failed {
                    code: Some(1),
                    stderr: "CUDA out of memory".to_string(),
                });
            }

            if self.write_files {
                std::fs::create_dir_all(self.artifact.dir()).unwrap();
                std::fs::write(self.artifact.config_path(), task.to_json().to_string()).unwrap();
                std::fs::write(self.artifact.training_args_path(), "args").unwrap();
            }
            Ok(self.artifact.clone())
        }
    }

    fn worker(
        coordinator: ScriptedCoordinator,
        executor: ScriptedExecutor,
        shutdown: CancellationToken,
    ) -> WorkerLoop {
        WorkerLoop::new(
            address(),
            DeviceIndex::new(0),
            Duration::from_millis(1),
            Arc::new(coordinator),
            Arc::new(executor),
            shutdown,
        )
    }

    #[tokio::test]
    async fn test_successful_cycle_runs_each_stage_once() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let calls = Calls::default();
        let mut worker = worker(
            ScriptedCoordinator::new(calls.clone()),
            ScriptedExecutor::new(calls.clone()),
            CancellationToken::new(),
        );

        let ack = worker.run_cycle().await.unwrap();

        assert_eq!(ack.status(), Some("ok"));
        assert_eq!(*calls.lock().unwrap(), vec!["acquire", "execute", "submit"]);
        assert_eq!(worker.state(), WorkerState::Preparing);
        assert_eq!(worker.stats().completed, 1);
        assert_eq!(worker.stats().failed(), 0);
        assert!(worker.stats().last_completed_at.is_some());
        assert_eq!(logs.count("0xABC received the task."), 1);
        assert_eq!(logs.count("0xABC executed the task."), 1);
        assert_eq!(logs.count("0xABC completed the task."), 1);
        assert_eq!(logs.errors(), 0);
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_execution_and_submission() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let calls = Calls::default();
        let mut coordinator = ScriptedCoordinator::new(calls.clone());
        coordinator.fail_acquire = true;
        let mut worker = worker(
            coordinator,
            ScriptedExecutor::new(calls.clone()),
            CancellationToken::new(),
        );

        let err = worker.run_cycle().await.unwrap_err();

        assert_eq!(err.stage(), WorkerState::Acquiring);
        assert!(matches!(err, CycleError::Acquire(ref e) if e.is_unavailable()));
        assert_eq!(*calls.lock().unwrap(), vec!["acquire"]);
        assert_eq!(worker.state(), WorkerState::Preparing);
        assert_eq!(worker.stats().acquire_failures, 1);
        assert_eq!(worker.stats().failed(), 1);
        assert_eq!(logs.errors(), 1);
        assert_eq!(logs.count("received the task"), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_submits_nothing() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let calls = Calls::default();
        let mut executor = ScriptedExecutor::new(calls.clone());
        executor.fail = true;
        let mut worker = worker(
            ScriptedCoordinator::new(calls.clone()),
            executor,
            CancellationToken::new(),
        );

        let err = worker.run_cycle().await.unwrap_err();

        assert_eq!(err.stage(), WorkerState::Executing);
        assert_eq!(*calls.lock().unwrap(), vec!["acquire", "execute"]);
        assert_eq!(worker.state(), WorkerState::Preparing);
        assert_eq!(worker.stats().execution_failures, 1);
        assert_eq!(worker.stats().failed(), 1);
        assert_eq!(logs.errors(), 1);
        assert_eq!(logs.count("executed the task"), 0);
    }

    #[tokio::test]
    async fn test_submit_failure_is_not_retried() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let calls = Calls::default();
        let mut coordinator = ScriptedCoordinator::new(calls.clone());
        coordinator.fail_submit = true;
        let mut worker = worker(
            coordinator,
            ScriptedExecutor::new(calls.clone()),
            CancellationToken::new(),
        );

        let err = worker.run_cycle().await.unwrap_err();

        assert_eq!(err.stage(), WorkerState::Submitting);
        assert_eq!(*calls.lock().unwrap(), vec!["acquire", "execute", "submit"]);
        assert_eq!(worker.state(), WorkerState::Preparing);
        assert_eq!(worker.stats().submit_failures, 1);
        assert_eq!(worker.stats().completed, 0);
        assert_eq!(logs.errors(), 1);
        assert_eq!(logs.count("completed the task"), 0);
    }

    #[tokio::test]
    async fn test_loop_survives_repeated_failures() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let calls = Calls::default();
        let shutdown = CancellationToken::new();
        let mut coordinator = ScriptedCoordinator::new(calls.clone());
        coordinator.fail_acquire = true;
        coordinator.stop_after = Some((3, shutdown.clone()));

        let stats = worker(coordinator, ScriptedExecutor::new(calls.clone()), shutdown)
            .run()
            .await;

        assert_eq!(stats.cycles_started, 3);
        assert_eq!(stats.acquire_failures, 3);
        assert_eq!(stats.completed, 0);
        assert_eq!(*calls.lock().unwrap(), vec!["acquire", "acquire", "acquire"]);
        assert_eq!(logs.errors(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_loop_does_not_start_a_cycle() {
        let calls = Calls::default();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = worker(
            ScriptedCoordinator::new(calls.clone()),
            ScriptedExecutor::new(calls.clone()),
            shutdown,
        )
        .run()
        .await;

        assert_eq!(stats, WorkerStats::default());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_cycle_in_flight() {
        let calls = Calls::default();
        let shutdown = CancellationToken::new();
        let mut executor = ScriptedExecutor::new(calls.clone());
        executor.stop_after_run = Some(shutdown.clone());

        let stats = worker(ScriptedCoordinator::new(calls.clone()), executor, shutdown)
            .run()
            .await;

        // Cancelled mid-cycle, yet the submission still happened
        assert_eq!(stats.cycles_started, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(*calls.lock().unwrap(), vec!["acquire", "execute", "submit"]);
    }

    #[tokio::test]
    async fn test_end_to_end_against_coordinator() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let acquire = server
            .mock("POST", "/register_particle")
            .match_body(mockito::Matcher::Json(json!({"address": "0xABC"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "args": task_json() }).to_string())
            .expect(1)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/complete_task")
            .match_body(mockito::Matcher::Regex(r#"\{"address":"0xABC"\}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = CoordinatorClient::new(CoordinatorConfig::new(server.url())).unwrap();
        let shutdown = CancellationToken::new();
        let calls = Calls::default();
        let mut executor = ScriptedExecutor::new(calls.clone());
        executor.artifact = Artifact::new(PathBuf::from(dir.path()).join("my_model"));
        executor.write_files = true;
        executor.stop_after_run = Some(shutdown.clone());

        let stats = WorkerLoop::new(
            address(),
            DeviceIndex::new(0),
            Duration::from_millis(1),
            Arc::new(HttpCoordinatorRepository::new(client)),
            Arc::new(executor),
            shutdown,
        )
        .run()
        .await;

        assert_eq!(stats.cycles_started, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed(), 0);
        assert_eq!(*calls.lock().unwrap(), vec!["execute"]);
        assert_eq!(logs.count("Address 0xABC received the task."), 1);
        assert_eq!(logs.count("Address 0xABC executed the task."), 1);
        assert_eq!(logs.count("Address 0xABC completed the task."), 1);
        assert_eq!(logs.errors(), 0);
        acquire.assert_async().await;
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_end_to_end_acquire_500_stops_the_cycle() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let mut server = mockito::Server::new_async().await;

        let acquire = server
            .mock("POST", "/register_particle")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/complete_task")
            .expect(0)
            .create_async()
            .await;

        let client = CoordinatorClient::new(CoordinatorConfig::new(server.url())).unwrap();
        let calls = Calls::default();
        let mut worker = WorkerLoop::new(
            address(),
            DeviceIndex::new(0),
            Duration::from_millis(1),
            Arc::new(HttpCoordinatorRepository::new(client)),
            Arc::new(ScriptedExecutor::new(calls.clone())),
            CancellationToken::new(),
        );

        let err = worker.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::Acquire(ref e) if e.status() == Some(500)));
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(worker.state(), WorkerState::Preparing);
        assert_eq!(logs.errors(), 1);
        acquire.assert_async().await;
        submit.assert_async().await;
    }
}
