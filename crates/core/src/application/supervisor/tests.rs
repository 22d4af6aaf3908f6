//! Unit tests for the supervisor state machine

use super::*;
use crate::domain::{RunState, SnapshotAttributes};
use crate::port::process_handle::mocks::{FakeFailures, FakeProcess, FakeProcessFactory};
use crate::port::state_sink::mocks::RecordingSink;
use crate::port::time_provider::mocks::ManualClock;
use crate::port::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

struct Harness {
    fake: Arc<FakeProcess>,
    factory: Arc<FakeProcessFactory>,
    sink: Arc<RecordingSink>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with(FakeProcess::new(), RecordingSink::new())
    }

    fn with(fake: FakeProcess, sink: RecordingSink) -> Self {
        let fake = Arc::new(fake);
        Self {
            factory: Arc::new(FakeProcessFactory::new(Arc::clone(&fake))),
            fake,
            sink: Arc::new(sink),
            clock: Arc::new(ManualClock::new(at(0))),
        }
    }

    fn supervisor(&self) -> Supervisor {
        Supervisor::new(
            Command::new(["cmd", "a", "b c"]).unwrap(),
            self.factory.clone(),
            self.sink.clone(),
            self.clock.clone(),
        )
    }

    fn spawn_run(&self) -> (CancelHandle, JoinHandle<Snapshot>) {
        let (handle, token) = cancel_channel();
        let mut supervisor = self.supervisor();
        let run = tokio::spawn(async move { supervisor.run(token).await });
        (handle, run)
    }

    async fn wait_for(&self, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, self.sink.wait_for(count))
            .await
            .expect("sink notification");
    }
}

async fn finish(run: JoinHandle<Snapshot>) -> Snapshot {
    tokio::time::timeout(TEST_TIMEOUT, run)
        .await
        .expect("run should finish")
        .unwrap()
}

fn running(output: &str, updated_at: Option<DateTime<Utc>>) -> Snapshot {
    Snapshot {
        state: RunState::Running,
        attributes: SnapshotAttributes {
            output: output.to_string(),
            running: true,
            exit_code: 0,
            started_at: Some(at(0)),
            updated_at,
            ended_at: None,
            duration: 0,
        },
    }
}

#[tokio::test]
async fn test_interleaved_output_then_wait_failure() {
    let h = Harness::new();
    let (_cancel, run) = h.spawn_run();

    h.wait_for(1).await;
    h.clock.set(at(5));
    h.fake.write_stdout("Hello world\n").await;

    h.wait_for(2).await;
    h.clock.set(at(10));
    h.fake.write_stderr("An error\n").await;

    h.wait_for(3).await;
    h.clock.set(at(20));
    h.fake.close_streams().await;
    h.fake
        .finish(Err(ProcessError::Terminated("FAILED".to_string())));

    let last = finish(run).await;

    let expected_last = Snapshot {
        state: RunState::Failure,
        attributes: SnapshotAttributes {
            output: "Hello world\nAn error\nFAILED\n".to_string(),
            running: false,
            exit_code: COMMAND_FAILED_EXIT_CODE,
            started_at: Some(at(0)),
            updated_at: Some(at(20)),
            ended_at: Some(at(20)),
            duration: 20,
        },
    };

    assert_eq!(
        h.sink.snapshots(),
        vec![
            running("", None),
            running("Hello world\n", Some(at(5))),
            running("Hello world\nAn error\n", Some(at(10))),
            expected_last.clone(),
        ]
    );
    assert_eq!(last, expected_last);

    let created = h.factory.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].bin(), "cmd");
    assert_eq!(created[0].args(), ["a", "b c"]);
}

#[tokio::test]
async fn test_hello_world_success() {
    let h = Harness::new();
    let (_cancel, run) = h.spawn_run();

    h.wait_for(1).await;
    h.clock.advance(chrono::Duration::seconds(2));
    h.fake.write_stdout("Hello world\n").await;
    h.wait_for(2).await;
    h.fake.close_streams().await;
    h.fake.finish(Ok(0));

    let last = finish(run).await;
    let snapshots = h.sink.snapshots();

    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[0], running("", None));
    assert_eq!(snapshots[1], running("Hello world\n", Some(at(2))));
    assert_eq!(last.state, RunState::Success);
    assert_eq!(last.attributes.output, "Hello world\n");
    assert_eq!(last.attributes.exit_code, 0);
    assert_eq!(last.attributes.duration, 2);
    assert_eq!(snapshots[2], last);
}

#[tokio::test]
async fn test_nonzero_exit_is_failure() {
    let h = Harness::new();
    let (_cancel, run) = h.spawn_run();

    h.fake.wait_started().await;
    h.fake.close_streams().await;
    h.fake.finish(Ok(7));

    let last = finish(run).await;

    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.exit_code, 7);
    assert_eq!(last.attributes.output, "");
    assert_eq!(h.sink.snapshots().len(), 2);
}

#[tokio::test]
async fn test_start_failure_sends_minimal_notifications() {
    let h = Harness::with(
        FakeProcess::with_failures(FakeFailures {
            start: Some("No such file or directory (os error 2)".to_string()),
            ..Default::default()
        }),
        RecordingSink::new(),
    );
    let (_cancel, run) = h.spawn_run();

    let last = finish(run).await;
    let snapshots = h.sink.snapshots();

    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0], running("", None));
    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.exit_code, COMMAND_FAILED_EXIT_CODE);
    assert_eq!(
        last.attributes.output,
        "No such file or directory (os error 2)\n"
    );
    assert!(last.attributes.ended_at.is_some());
    assert!(!h.fake.is_started());
}

#[tokio::test]
async fn test_stdout_failure_sends_dedicated_running_notification() {
    let h = Harness::with(
        FakeProcess::with_failures(FakeFailures {
            stdout: Some("boom".to_string()),
            ..Default::default()
        }),
        RecordingSink::new(),
    );
    let (_cancel, run) = h.spawn_run();

    let last = finish(run).await;
    let snapshots = h.sink.snapshots();

    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[1].state, RunState::Running);
    assert_eq!(snapshots[1].attributes.output, "stdout pipe unavailable: boom\n");
    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.exit_code, COMMAND_FAILED_EXIT_CODE);
    assert_eq!(snapshots[2], last);
}

#[tokio::test]
async fn test_stderr_failure_has_no_dedicated_notification() {
    let h = Harness::with(
        FakeProcess::with_failures(FakeFailures {
            stderr: Some("boom".to_string()),
            ..Default::default()
        }),
        RecordingSink::new(),
    );
    let (_cancel, run) = h.spawn_run();

    let last = finish(run).await;

    assert_eq!(h.sink.snapshots().len(), 2);
    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.output, "stderr pipe unavailable: boom\n");
    assert!(!h.fake.is_started());
}

#[tokio::test]
async fn test_cancel_kills_process() {
    let h = Harness::new();
    let (cancel, run) = h.spawn_run();

    h.fake.wait_started().await;
    h.fake.write_stdout("working\n").await;
    h.wait_for(2).await;
    cancel.cancel();

    let last = finish(run).await;

    assert_eq!(h.fake.kill_count(), 1);
    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.exit_code, COMMAND_FAILED_EXIT_CODE);
    assert_eq!(last.attributes.output, "working\nsignal: killed\n");
}

#[tokio::test]
async fn test_cancel_before_start_never_spawns() {
    let h = Harness::new();
    let (cancel, token) = cancel_channel();
    cancel.cancel();

    let last = h.supervisor().run(token).await;

    assert!(!h.fake.is_started());
    assert_eq!(h.factory.created().len(), 1);
    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.output, "run cancelled before start\n");
    assert_eq!(h.sink.snapshots().len(), 2);
}

/// Gets cancelled while its pipes are handed out and takes a while to spawn
struct SlowStart {
    inner: Arc<FakeProcess>,
    cancel: CancelHandle,
}

#[async_trait]
impl ProcessHandle for SlowStart {
    fn stdout(&self) -> Result<OutputStream, ProcessError> {
        self.cancel.cancel();
        self.inner.stdout()
    }

    fn stderr(&self) -> Result<OutputStream, ProcessError> {
        self.inner.stderr()
    }

    async fn start(&self) -> Result<(), ProcessError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.start().await
    }

    async fn wait(&self) -> Result<i32, ProcessError> {
        self.inner.wait().await
    }

    async fn kill(&self) -> Result<(), ProcessError> {
        self.inner.kill().await
    }
}

struct SlowStartFactory(Arc<SlowStart>);

impl ProcessFactory for SlowStartFactory {
    fn create(&self, _command: &Command) -> Arc<dyn ProcessHandle> {
        self.0.clone()
    }
}

#[tokio::test]
async fn test_cancel_while_starting_kills_process() {
    let fake = Arc::new(FakeProcess::new());
    let (cancel, token) = cancel_channel();
    let process = Arc::new(SlowStart {
        inner: Arc::clone(&fake),
        cancel,
    });
    let sink = Arc::new(RecordingSink::new());
    let mut supervisor = Supervisor::new(
        Command::new(["cmd"]).unwrap(),
        Arc::new(SlowStartFactory(process)),
        sink.clone(),
        Arc::new(ManualClock::new(at(0))),
    );

    let last = tokio::time::timeout(TEST_TIMEOUT, supervisor.run(token))
        .await
        .expect("cancelled run should finish");

    assert!(fake.is_started());
    assert_eq!(fake.kill_count(), 1);
    assert_eq!(last.state, RunState::Failure);
    assert_eq!(last.attributes.exit_code, COMMAND_FAILED_EXIT_CODE);
    assert_eq!(last.attributes.output, "signal: killed\n");
    assert_eq!(sink.snapshots().last(), Some(&last));
}

#[tokio::test]
async fn test_listener_torn_down_after_run() {
    let h = Harness::new();
    let (cancel, run) = h.spawn_run();

    h.fake.wait_started().await;
    h.fake.close_streams().await;
    h.fake.finish(Ok(0));
    finish(run).await;

    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.fake.kill_count(), 0);
}

#[tokio::test]
async fn test_sink_failures_do_not_alter_run() {
    let h = Harness::with(
        FakeProcess::new(),
        RecordingSink::failing(SinkError::UnexpectedStatus {
            status: 500,
            body: "oops".to_string(),
        }),
    );
    let (_cancel, run) = h.spawn_run();

    h.fake.write_stdout("one\ntwo\n").await;
    h.fake.close_streams().await;
    h.fake.finish(Ok(0));

    let last = finish(run).await;

    assert_eq!(last.state, RunState::Success);
    assert_eq!(last.attributes.output, "one\ntwo\n");
    // initial + one per line + terminal, all attempted despite failing
    assert_eq!(h.sink.payloads().len(), 4);
}

#[tokio::test]
async fn test_unterminated_last_line_is_captured() {
    let h = Harness::new();
    let (_cancel, run) = h.spawn_run();

    h.fake.write_stderr("no newline").await;
    h.fake.close_streams().await;
    h.fake.finish(Ok(1));

    let last = finish(run).await;

    assert_eq!(last.attributes.output, "no newline\n");
    assert_eq!(last.state, RunState::Failure);
}

#[tokio::test]
async fn test_reader_joins_split_reads_and_stops_on_error() {
    let sink = Arc::new(RecordingSink::new());
    let notifier = Arc::new(Notifier {
        state: Mutex::new(RunnerState::start(at(0))),
        sink: sink.clone(),
        time_provider: Arc::new(ManualClock::new(at(0))),
    });
    let stream = tokio_test::io::Builder::new()
        .read(b"first ha")
        .read(b"lf\r\nsecond\n")
        .read_error(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ))
        .build();

    spawn_reader(Arc::clone(&notifier), Box::new(stream), "stdout")
        .await
        .unwrap();

    assert_eq!(notifier.snapshot().attributes.output, "first half\nsecond\n");
    assert_eq!(sink.payloads().len(), 2);
}

#[test]
fn test_decode_line() {
    assert_eq!(decode_line(b"plain\n"), "plain");
    assert_eq!(decode_line(b"windows\r\n"), "windows");
    assert_eq!(decode_line(b"tail"), "tail");
    assert_eq!(decode_line(b"\n"), "");
    assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
}
