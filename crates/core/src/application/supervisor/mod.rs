// Supervisor - spawns one command, drains its output and reports every change

mod cancel;
pub mod constants;
mod state;
#[cfg(test)]
mod tests;

pub use cancel::{cancel_channel, CancelHandle, CancelToken};
pub use constants::COMMAND_FAILED_EXIT_CODE;

use state::RunnerState;

use crate::domain::{Command, Snapshot};
use crate::port::{OutputStream, ProcessError, ProcessFactory, ProcessHandle, StateSink, TimeProvider};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Supervisor runs a single command and publishes its lifecycle to a state sink
pub struct Supervisor {
    command: Command,
    process_factory: Arc<dyn ProcessFactory>,
    sink: Arc<dyn StateSink>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Supervisor {
    /// Create a new supervisor
    ///
    /// # Arguments
    /// * `command` - Command to supervise
    /// * `process_factory` - Builds the process handle for each run
    /// * `sink` - Receives a serialized snapshot after every observable event
    /// * `time_provider` - Clock for started/updated/ended timestamps
    pub fn new(
        command: Command,
        process_factory: Arc<dyn ProcessFactory>,
        sink: Arc<dyn StateSink>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            command,
            process_factory,
            sink,
            time_provider,
        }
    }

    /// Run the command to completion and return the final snapshot
    ///
    /// Notification order:
    /// 1. `running` with empty output on entry
    /// 2. one snapshot per captured line (stdout and stderr interleave freely)
    /// 3. exactly one terminal snapshot when the run ends, on every path
    ///
    /// Sink failures are logged and never change the outcome. Cancelling `cancel`
    /// kills the process; the run then ends as a failure.
    pub async fn run(&mut self, cancel: CancelToken) -> Snapshot {
        let notifier = Arc::new(Notifier {
            state: Mutex::new(RunnerState::start(self.time_provider.now())),
            sink: Arc::clone(&self.sink),
            time_provider: Arc::clone(&self.time_provider),
        });

        info!(command = %self.command, "Starting supervised run");
        notifier.notify().await;

        let process = self.process_factory.create(&self.command);
        let (started_tx, started_rx) = oneshot::channel();
        let _listener = CancelListener::spawn(cancel.clone(), started_rx, Arc::clone(&process));

        self.drive(&notifier, process.as_ref(), &cancel, started_tx).await;

        let snapshot = notifier.snapshot();
        info!(
            command = %self.command,
            state = %snapshot.state,
            exit_code = snapshot.attributes.exit_code,
            duration_secs = snapshot.attributes.duration,
            "Supervised run finished"
        );
        notifier.publish(&snapshot).await;
        snapshot
    }

    /// Everything between the first and the terminal notification
    ///
    /// `started` fires once the process is running; dropping it unsent tells the cancel
    /// listener there is nothing to kill.
    async fn drive(
        &self,
        notifier: &Arc<Notifier>,
        process: &dyn ProcessHandle,
        cancel: &CancelToken,
        started: oneshot::Sender<()>,
    ) {
        if cancel.is_cancelled() {
            warn!(command = %self.command, "Run cancelled before the process was started");
            notifier.append_error(&"run cancelled before start");
            notifier.abort_run();
            return;
        }

        let stdout = match process.stdout() {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to acquire STDOUT pipe");
                notifier.append_error(&e);
                // Only this path sends a dedicated (still running) notification
                notifier.notify().await;
                notifier.abort_run();
                return;
            }
        };

        let stderr = match process.stderr() {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to acquire STDERR pipe");
                notifier.append_error(&e);
                notifier.abort_run();
                return;
            }
        };

        let readers = [
            spawn_reader(Arc::clone(notifier), stdout, "stdout"),
            spawn_reader(Arc::clone(notifier), stderr, "stderr"),
        ];

        if let Err(e) = process.start().await {
            error!(command = %self.command, error = %e, "Failed to run command");
            notifier.append_error(&e);
            // Streams of a process that never started are already at end-of-stream
            join_readers(readers).await;
            notifier.abort_run();
            return;
        }
        // A cancel that raced the start is delivered now
        let _ = started.send(());

        join_readers(readers).await;

        let outcome = process.wait().await;
        notifier.complete(outcome);
    }
}

async fn join_readers(readers: [JoinHandle<()>; 2]) {
    for reader in readers {
        if let Err(e) = reader.await {
            warn!(error = %e, "Output reader task failed");
        }
    }
}

/// Shared run state plus the sink it is reported to
struct Notifier {
    state: Mutex<RunnerState>,
    sink: Arc<dyn StateSink>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Notifier {
    fn state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Snapshot {
        self.state().snapshot()
    }

    /// Append one captured line and take the snapshot that reports it
    fn append_line(&self, line: &str) -> Snapshot {
        let now = self.time_provider.now();
        let mut state = self.state();
        state.append_output(&format!("{}\n", line), now);
        state.snapshot()
    }

    fn append_error(&self, err: &dyn std::fmt::Display) {
        let now = self.time_provider.now();
        self.state().append_output(&format!("{}\n", err), now);
    }

    /// End a run that never reached a normal wait
    fn abort_run(&self) {
        self.finish(COMMAND_FAILED_EXIT_CODE);
    }

    /// Classify the wait outcome
    fn complete(&self, outcome: Result<i32, ProcessError>) {
        match outcome {
            Ok(0) => {
                info!("Command exited successfully");
                self.finish(0);
            }
            Ok(code) => {
                info!(exit_code = code, "Command failed with status code");
                self.finish(code);
            }
            Err(e) => {
                warn!(error = %e, "Command failed");
                self.append_error(&e);
                self.finish(COMMAND_FAILED_EXIT_CODE);
            }
        }
    }

    fn finish(&self, exit_code: i32) {
        let now = self.time_provider.now();
        if let Err(e) = self.state().finish(exit_code, now) {
            warn!(error = %e, "Ignoring second terminal transition");
        }
    }

    async fn notify(&self) {
        let snapshot = self.snapshot();
        self.publish(&snapshot).await;
    }

    /// Serialize and submit; failures are logged and swallowed
    async fn publish(&self, snapshot: &Snapshot) {
        let payload = match snapshot.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to marshal payload");
                return;
            }
        };

        if let Err(e) = self.sink.submit(&payload).await {
            warn!(error = %e, state = %snapshot.state, "Failed to publish update");
        }
    }
}

/// Reads one stream line by line, notifying after each line
fn spawn_reader(
    notifier: Arc<Notifier>,
    stream: OutputStream,
    name: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!(stream = name, "Stream ended");
                    break;
                }
                Ok(_) => {
                    let line = decode_line(&buf);
                    debug!(stream = name, line = %line, "Captured output");
                    // Sink latency throttles this stream: the next line waits for this call
                    let snapshot = notifier.append_line(&line);
                    notifier.publish(&snapshot).await;
                }
                Err(e) => {
                    warn!(stream = name, error = %e, "Error reading from stream");
                    break;
                }
            }
        }
    })
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily
fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Kills the process when the run is cancelled; aborted when dropped
///
/// The kill waits for `started`, so cancelling while the process is still being spawned
/// kills it as soon as the spawn completes.
struct CancelListener {
    task: JoinHandle<()>,
}

impl CancelListener {
    fn spawn(
        mut cancel: CancelToken,
        started: oneshot::Receiver<()>,
        process: Arc<dyn ProcessHandle>,
    ) -> Self {
        let task = tokio::spawn(async move {
            cancel.cancelled().await;
            if started.await.is_err() {
                debug!("Termination requested but the process never started");
                return;
            }
            info!("Termination requested, killing process");
            if let Err(e) = process.kill().await {
                warn!(error = %e, "Failed to kill process");
            }
        });
        Self { task }
    }
}

impl Drop for CancelListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
