// Process Handle Port
// Abstraction over one OS process (streams, start, wait, kill) plus the factory that builds it

use crate::domain::Command;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Byte stream of one of the child's output pipes
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("{0} pipe unavailable: {1}")]
    StreamUnavailable(&'static str, String),

    #[error("{0}")]
    SpawnFailed(String),

    #[error("failed to kill a non running process")]
    NotRunning,

    #[error("{0}")]
    Terminated(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Process Handle trait
///
/// Output streams are obtained before `start()`; they reach end-of-stream once the
/// child closes its side (or immediately if the child never started).
///
/// Implementations:
/// - SubprocessHandle: real child process (infra-system)
/// - FakeProcess: scripted process for tests (`mocks`)
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Take the stdout stream (once)
    fn stdout(&self) -> Result<OutputStream, ProcessError>;

    /// Take the stderr stream (once)
    fn stderr(&self) -> Result<OutputStream, ProcessError>;

    /// Spawn the process
    ///
    /// # Errors
    /// - ProcessError::SpawnFailed if the binary cannot be executed
    async fn start(&self) -> Result<(), ProcessError>;

    /// Block until the process exits
    ///
    /// Returns the exit code of a normal exit. A process killed by a signal, or a
    /// failure to wait, is an error.
    async fn wait(&self) -> Result<i32, ProcessError>;

    /// Forcefully kill the process
    ///
    /// # Errors
    /// - ProcessError::NotRunning if the process was never started
    async fn kill(&self) -> Result<(), ProcessError>;
}

/// Builds a process handle for a command
pub trait ProcessFactory: Send + Sync {
    fn create(&self, command: &Command) -> Arc<dyn ProcessHandle>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::{oneshot, Notify};

    const FAKE_PIPE_CAPACITY: usize = 64 * 1024;

    type ExitResult = Result<i32, ProcessError>;

    /// Injected failures for a fake process
    #[derive(Debug, Clone, Default)]
    pub struct FakeFailures {
        pub stdout: Option<String>,
        pub stderr: Option<String>,
        pub start: Option<String>,
    }

    /// Scripted process: the test writes output, closes the pipes and decides the
    /// wait outcome. `kill()` closes the pipes and resolves `wait()` as terminated.
    pub struct FakeProcess {
        stdout_reader: Mutex<Option<DuplexStream>>,
        stderr_reader: Mutex<Option<DuplexStream>>,
        stdout_writer: tokio::sync::Mutex<Option<DuplexStream>>,
        stderr_writer: tokio::sync::Mutex<Option<DuplexStream>>,
        failures: FakeFailures,
        started: AtomicBool,
        started_notify: Notify,
        kill_count: AtomicUsize,
        killed: Notify,
        exit_tx: Mutex<Option<oneshot::Sender<ExitResult>>>,
        exit_rx: tokio::sync::Mutex<Option<oneshot::Receiver<ExitResult>>>,
    }

    impl FakeProcess {
        pub fn new() -> Self {
            Self::with_failures(FakeFailures::default())
        }

        pub fn with_failures(failures: FakeFailures) -> Self {
            let (stdout_writer, stdout_reader) = tokio::io::duplex(FAKE_PIPE_CAPACITY);
            let (stderr_writer, stderr_reader) = tokio::io::duplex(FAKE_PIPE_CAPACITY);
            let (exit_tx, exit_rx) = oneshot::channel();

            Self {
                stdout_reader: Mutex::new(Some(stdout_reader)),
                stderr_reader: Mutex::new(Some(stderr_reader)),
                stdout_writer: tokio::sync::Mutex::new(Some(stdout_writer)),
                stderr_writer: tokio::sync::Mutex::new(Some(stderr_writer)),
                failures,
                started: AtomicBool::new(false),
                started_notify: Notify::new(),
                kill_count: AtomicUsize::new(0),
                killed: Notify::new(),
                exit_tx: Mutex::new(Some(exit_tx)),
                exit_rx: tokio::sync::Mutex::new(Some(exit_rx)),
            }
        }

        pub async fn write_stdout(&self, text: &str) {
            Self::write(&self.stdout_writer, text).await;
        }

        pub async fn write_stderr(&self, text: &str) {
            Self::write(&self.stderr_writer, text).await;
        }

        async fn write(writer: &tokio::sync::Mutex<Option<DuplexStream>>, text: &str) {
            if let Some(writer) = writer.lock().await.as_mut() {
                writer.write_all(text.as_bytes()).await.unwrap();
                writer.flush().await.unwrap();
            }
        }

        /// Close both pipes (readers see end-of-stream)
        pub async fn close_streams(&self) {
            self.stdout_writer.lock().await.take();
            self.stderr_writer.lock().await.take();
        }

        /// Resolve `wait()` with the given outcome
        pub fn finish(&self, outcome: Result<i32, ProcessError>) {
            if let Some(tx) = self.exit_tx.lock().unwrap().take() {
                let _ = tx.send(outcome);
            }
        }

        /// Wait until `start()` has been called
        pub async fn wait_started(&self) {
            loop {
                let notified = self.started_notify.notified();
                if self.is_started() {
                    return;
                }
                notified.await;
            }
        }

        pub fn is_started(&self) -> bool {
            self.started.load(Ordering::SeqCst)
        }

        pub fn kill_count(&self) -> usize {
            self.kill_count.load(Ordering::SeqCst)
        }

        fn take_stream(
            slot: &Mutex<Option<DuplexStream>>,
            failure: &Option<String>,
            name: &'static str,
        ) -> Result<OutputStream, ProcessError> {
            if let Some(message) = failure {
                return Err(ProcessError::StreamUnavailable(name, message.clone()));
            }
            slot.lock()
                .unwrap()
                .take()
                .map(|stream| Box::new(stream) as OutputStream)
                .ok_or_else(|| ProcessError::StreamUnavailable(name, "already taken".to_string()))
        }
    }

    impl Default for FakeProcess {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessHandle for FakeProcess {
        fn stdout(&self) -> Result<OutputStream, ProcessError> {
            Self::take_stream(&self.stdout_reader, &self.failures.stdout, "stdout")
        }

        fn stderr(&self) -> Result<OutputStream, ProcessError> {
            Self::take_stream(&self.stderr_reader, &self.failures.stderr, "stderr")
        }

        async fn start(&self) -> Result<(), ProcessError> {
            if let Some(message) = &self.failures.start {
                // A process that never ran closes its pipes immediately
                self.close_streams().await;
                return Err(ProcessError::SpawnFailed(message.clone()));
            }
            self.started.store(true, Ordering::SeqCst);
            self.started_notify.notify_waiters();
            Ok(())
        }

        async fn wait(&self) -> Result<i32, ProcessError> {
            let rx = self
                .exit_rx
                .lock()
                .await
                .take()
                .ok_or_else(|| ProcessError::Io("wait called twice".to_string()))?;

            tokio::select! {
                outcome = rx => outcome.unwrap_or_else(|_| {
                    Err(ProcessError::Io("fake process dropped".to_string()))
                }),
                _ = self.killed.notified() => {
                    Err(ProcessError::Terminated("signal: killed".to_string()))
                }
            }
        }

        async fn kill(&self) -> Result<(), ProcessError> {
            if !self.is_started() {
                return Err(ProcessError::NotRunning);
            }
            self.kill_count.fetch_add(1, Ordering::SeqCst);
            self.close_streams().await;
            self.killed.notify_one();
            Ok(())
        }
    }

    /// Factory handing out one shared fake and recording what it was asked to build
    pub struct FakeProcessFactory {
        process: Arc<FakeProcess>,
        created: Mutex<Vec<Command>>,
    }

    impl FakeProcessFactory {
        pub fn new(process: Arc<FakeProcess>) -> Self {
            Self {
                process,
                created: Mutex::new(Vec::new()),
            }
        }

        pub fn created(&self) -> Vec<Command> {
            self.created.lock().unwrap().clone()
        }
    }

    impl ProcessFactory for FakeProcessFactory {
        fn create(&self, command: &Command) -> Arc<dyn ProcessHandle> {
            self.created.lock().unwrap().push(command.clone());
            self.process.clone()
        }
    }
}
