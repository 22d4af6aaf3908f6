// Subprocess handle implementation
// reason: tokio::process for async child management, duplex pipes so output streams
// can be handed out before the child is spawned
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::io::{AsyncRead, DuplexStream};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use hass_run_core::domain::Command;
use hass_run_core::port::{OutputStream, ProcessError, ProcessFactory, ProcessHandle};

/// Buffer between the child's pipe and the supervisor's reader
const PIPE_BUFFER_BYTES: usize = 64 * 1024;

/// Production factory: every handle wraps a real child process
#[derive(Debug, Default, Clone)]
pub struct SubprocessFactory;

impl SubprocessFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessFactory for SubprocessFactory {
    fn create(&self, command: &Command) -> Arc<dyn ProcessHandle> {
        Arc::new(SubprocessHandle::new(command.clone()))
    }
}

/// One end handed to the supervisor, the other fed from the child's pipe
struct Pipe {
    reader: Option<DuplexStream>,
    writer: Option<DuplexStream>,
}

impl Pipe {
    fn new() -> Self {
        let (writer, reader) = tokio::io::duplex(PIPE_BUFFER_BYTES);
        Self {
            reader: Some(reader),
            writer: Some(writer),
        }
    }
}

/// Child process with stdin closed and stdout/stderr captured
///
/// Signals only ever go through the owned [`Child`], never a bare pid: once the child is
/// reaped its pid may belong to someone else.
pub struct SubprocessHandle {
    command: Command,
    stdout: Mutex<Pipe>,
    stderr: Mutex<Pipe>,
    child: tokio::sync::Mutex<Option<Child>>,
    pid: OnceLock<u32>,
    /// Kill requests for a child currently owned by `wait()`
    kill_requested: Notify,
}

impl SubprocessHandle {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            stdout: Mutex::new(Pipe::new()),
            stderr: Mutex::new(Pipe::new()),
            child: tokio::sync::Mutex::new(None),
            pid: OnceLock::new(),
            kill_requested: Notify::new(),
        }
    }

    /// OS pid once started
    pub fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    fn lock(pipe: &Mutex<Pipe>) -> MutexGuard<'_, Pipe> {
        pipe.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_reader(pipe: &Mutex<Pipe>, name: &'static str) -> Result<OutputStream, ProcessError> {
        Self::lock(pipe)
            .reader
            .take()
            .map(|reader| Box::new(reader) as OutputStream)
            .ok_or_else(|| ProcessError::StreamUnavailable(name, "already taken".to_string()))
    }

    /// Writer end for a stream whose reader was handed out; untaken streams go to /dev/null
    fn take_writer(pipe: &Mutex<Pipe>) -> Option<DuplexStream> {
        let mut pipe = Self::lock(pipe);
        if pipe.reader.take().is_some() {
            pipe.writer.take();
            return None;
        }
        pipe.writer.take()
    }

    fn stdio_for(writer: &Option<DuplexStream>) -> Stdio {
        if writer.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    }
}

/// Copy a child pipe into the duplex writer; dropping the writer signals end-of-stream
fn spawn_pump<R>(source: Option<R>, sink: Option<DuplexStream>, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    if let (Some(mut source), Some(mut sink)) = (source, sink) {
        tokio::spawn(async move {
            if let Err(e) = tokio::io::copy(&mut source, &mut sink).await {
                warn!(stream = name, error = %e, "Output pipe copy failed");
            }
        });
    }
}

#[async_trait]
impl ProcessHandle for SubprocessHandle {
    fn stdout(&self) -> Result<OutputStream, ProcessError> {
        Self::take_reader(&self.stdout, "stdout")
    }

    fn stderr(&self) -> Result<OutputStream, ProcessError> {
        Self::take_reader(&self.stderr, "stderr")
    }

    async fn start(&self) -> Result<(), ProcessError> {
        // Writers leave the mutex here, so a failed spawn drops them and readers hit EOF
        let stdout_writer = Self::take_writer(&self.stdout);
        let stderr_writer = Self::take_writer(&self.stderr);

        let mut child = ProcessCommand::new(self.command.bin())
            .args(self.command.args())
            .stdin(Stdio::null())
            .stdout(Self::stdio_for(&stdout_writer))
            .stderr(Self::stdio_for(&stderr_writer))
            .spawn()
            .map_err(|e| {
                ProcessError::SpawnFailed(format!(
                    "failed to start {}: {}",
                    self.command.bin(),
                    e
                ))
            })?;

        if let Some(pid) = child.id() {
            let _ = self.pid.set(pid);
        }
        info!(
            command = %self.command,
            pid = ?self.pid(),
            "Child process started"
        );

        spawn_pump(child.stdout.take(), stdout_writer, "stdout");
        spawn_pump(child.stderr.take(), stderr_writer, "stderr");

        *self.child.lock().await = Some(child);
        Ok(())
    }

    async fn wait(&self) -> Result<i32, ProcessError> {
        let mut guard = self.child.lock().await;
        let child = guard
            .as_mut()
            .ok_or_else(|| ProcessError::Io("process was never started".to_string()))?;

        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.map_err(|e| ProcessError::Io(e.to_string()))?;
                }
                _ = self.kill_requested.notified() => {
                    if let Err(e) = child.start_kill() {
                        warn!(pid = ?self.pid(), error = %e, "Failed to kill child process");
                    }
                }
            }
        };
        debug!(pid = ?self.pid(), status = %status, "Child process exited");

        if let Some(code) = status.code() {
            return Ok(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = status.signal() {
                return Err(ProcessError::Terminated(format!(
                    "process terminated by signal {}",
                    signal
                )));
            }
        }

        Err(ProcessError::Terminated(format!(
            "process terminated abnormally: {}",
            status
        )))
    }

    async fn kill(&self) -> Result<(), ProcessError> {
        let pid = self.pid().ok_or(ProcessError::NotRunning)?;

        let mut guard = match self.child.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // wait() owns the child and delivers the kill
                info!(pid = %pid, "Killing child process");
                self.kill_requested.notify_one();
                return Ok(());
            }
        };
        let child = guard.as_mut().ok_or(ProcessError::NotRunning)?;

        let finished = child
            .try_wait()
            .map_err(|e| ProcessError::Io(e.to_string()))?;
        if finished.is_some() {
            return Err(ProcessError::Io(format!("process {} already finished", pid)));
        }

        info!(pid = %pid, "Killing child process");
        child
            .start_kill()
            .map_err(|e| ProcessError::Io(format!("kill failed: {}", e)))
    }
}
