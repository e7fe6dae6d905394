//! Integration tests for the process supervisor.
//!
//! These drive real child processes (`cat`, `sh -c`) through
//! `spawn_supervisor()` and observe the results on the brokers.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

#![cfg(unix)]

use std::time::Duration;

use conductor_broker::{Broker, Event};
use conductor_core::{
    CommandLogEvent, CommandType, MessageKind, ProcessEvent, ProcessEventKind, ProcessEventType,
    ProcessId, ProcessRole, ProcessStatus,
};
use conductor_supervisor::{
    spawn_supervisor, Delivery, LineProtocol, ProcessSpec, SupervisorConfig, SupervisorError,
    SupervisorHandle,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    handle: SupervisorHandle,
    events: mpsc::Receiver<Event<ProcessEvent>>,
    commands: mpsc::Receiver<Event<CommandLogEvent>>,
}

fn create_test_harness(config: SupervisorConfig) -> Harness {
    let events: Broker<ProcessEvent> = Broker::default();
    let command_log: Broker<CommandLogEvent> = Broker::default();
    let event_rx = events.subscribe(CancellationToken::new());
    let command_rx = command_log.subscribe(CancellationToken::new());
    Harness {
        handle: spawn_supervisor(config, events, command_log),
        events: event_rx,
        commands: command_rx,
    }
}

fn sh(role: ProcessRole, script: &str) -> ProcessSpec {
    ProcessSpec::new(role, "sh").with_args(["-c", script])
}

/// Receives events for `process_id` until one matches `pred`.
async fn wait_for_event<F>(
    rx: &mut mpsc::Receiver<Event<ProcessEvent>>,
    process_id: &ProcessId,
    mut pred: F,
) -> ProcessEventKind
where
    F: FnMut(&ProcessEventKind) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event broker closed");
            if &event.payload.process_id == process_id && pred(&event.payload.kind) {
                return event.payload.kind;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn next_command(rx: &mut mpsc::Receiver<Event<CommandLogEvent>>) -> CommandLogEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for command log")
        .expect("command log closed")
        .payload
}

/// Polls until the supervisor no longer tracks `process_id`.
async fn wait_until_gone(handle: &SupervisorHandle, process_id: &ProcessId) {
    timeout(Duration::from_secs(5), async {
        while handle.inspect(process_id.clone()).await.is_some() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("process should be removed");
}

fn status_is(status: ProcessStatus) -> impl FnMut(&ProcessEventKind) -> bool {
    move |kind| matches!(kind, ProcessEventKind::StatusChange { status: s } if *s == status)
}

// ============================================================================
// Spawn
// ============================================================================

#[tokio::test]
async fn test_spawn_plain_process_is_ready() {
    let mut h = create_test_harness(SupervisorConfig::default());

    let process_id = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Coordinator, "cat"))
        .await
        .expect("spawn should succeed");
    assert_eq!(process_id.as_str(), "coordinator-1");

    let first = timeout(Duration::from_secs(5), h.events.recv()).await.unwrap().unwrap();
    assert_eq!(first.kind, ProcessEventType::Spawned);
    wait_for_event(&mut h.events, &process_id, status_is(ProcessStatus::Starting)).await;
    wait_for_event(&mut h.events, &process_id, |k| *k == ProcessEventKind::Ready).await;

    let log = next_command(&mut h.commands).await;
    assert_eq!(log.command_type, CommandType::Spawn);
    assert!(log.success);
    assert_eq!(log.process_id, Some(process_id.clone()));

    let snapshot = h.handle.inspect(process_id.clone()).await.unwrap();
    assert_eq!(snapshot.status, ProcessStatus::Ready);
    assert!(snapshot.session_ref.starts_with("cat"));

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_spawn_missing_program_fails() {
    let mut h = create_test_harness(SupervisorConfig::default());

    let err = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "/nonexistent/agent-binary"))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnFailed { .. }));

    let process_id = ProcessId::new("worker-1");
    let kind = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Error { .. })
    })
    .await;
    assert!(matches!(
        kind,
        ProcessEventKind::Error {
            status: ProcessStatus::Failed,
            ..
        }
    ));

    let log = next_command(&mut h.commands).await;
    assert!(!log.success);
    assert!(log.error.unwrap().contains("failed to launch"));
}

#[tokio::test]
async fn test_supervisor_full_rejects_spawn() {
    let h = create_test_harness(SupervisorConfig::default().with_max_processes(1));

    h.handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .unwrap();
    let err = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .unwrap_err();
    assert_eq!(err, SupervisorError::SupervisorFull { max: 1 });

    h.handle.shutdown().await;
}

// ============================================================================
// Send
// ============================================================================

#[tokio::test]
async fn test_send_to_plain_process_echoes() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let process_id = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .unwrap();

    let delivery = h.handle.send(process_id.clone(), "hello".to_string()).await.unwrap();
    assert_eq!(delivery, Delivery::Delivered);

    let incoming = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Incoming { .. })
    })
    .await;
    assert_eq!(
        incoming,
        ProcessEventKind::Incoming {
            text: "hello".to_string()
        }
    );

    let output = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Output { .. })
    })
    .await;
    assert_eq!(
        output,
        ProcessEventKind::Output {
            text: "hello".to_string(),
            delta: false,
            message_kind: MessageKind::Text,
        }
    );

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_send_to_unknown_process() {
    let mut h = create_test_harness(SupervisorConfig::default());

    let err = h
        .handle
        .send(ProcessId::new("worker-42"), "hi".to_string())
        .await
        .unwrap_err();
    assert_eq!(err, SupervisorError::ProcessNotFound(ProcessId::new("worker-42")));

    let log = next_command(&mut h.commands).await;
    assert_eq!(log.command_type, CommandType::Send);
    assert!(!log.success);
}

#[tokio::test]
async fn test_json_busy_process_queues_then_delivers() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let script = r#"echo '{"type":"ready"}'; while read line; do sleep 0.3; echo '{"type":"text","text":"ack"}'; echo '{"type":"ready"}'; done"#;
    let spec = sh(ProcessRole::Worker, script).with_protocol(LineProtocol::Json);

    let process_id = h.handle.spawn(spec).await.unwrap();
    wait_for_event(&mut h.events, &process_id, |k| *k == ProcessEventKind::Ready).await;

    let first = h.handle.send(process_id.clone(), "first".to_string()).await.unwrap();
    assert_eq!(first, Delivery::Delivered);
    wait_for_event(&mut h.events, &process_id, |k| *k == ProcessEventKind::Working).await;

    let second = h.handle.send(process_id.clone(), "second".to_string()).await.unwrap();
    assert_eq!(second, Delivery::Queued { depth: 1 });
    wait_for_event(&mut h.events, &process_id, |k| {
        *k == ProcessEventKind::QueueChanged { count: 1 }
    })
    .await;

    // The agent finishes its turn
    wait_for_event(&mut h.events, &process_id, |k| *k == ProcessEventKind::Ready).await;

    let delivered = h.handle.deliver_queued(process_id.clone()).await.unwrap();
    assert_eq!(delivered, Delivery::Delivered);
    wait_for_event(&mut h.events, &process_id, |k| {
        *k == ProcessEventKind::QueueChanged { count: 0 }
    })
    .await;

    let nothing = h.handle.deliver_queued(process_id.clone()).await.unwrap();
    assert_eq!(nothing, Delivery::Empty);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_queued_messages_go_before_new_input() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let script = r#"sleep 0.3; echo '{"type":"ready"}'; while read line; do sleep 0.3; echo '{"type":"ready"}'; done"#;
    let spec = sh(ProcessRole::Worker, script).with_protocol(LineProtocol::Json);
    let process_id = h.handle.spawn(spec).await.unwrap();

    let first = h.handle.send(process_id.clone(), "first".to_string()).await.unwrap();
    assert_eq!(first, Delivery::Queued { depth: 1 });
    wait_for_event(&mut h.events, &process_id, |k| *k == ProcessEventKind::Ready).await;

    // Ready, but "first" has not been delivered yet
    let second = h.handle.send(process_id.clone(), "second".to_string()).await.unwrap();
    assert_eq!(second, Delivery::Queued { depth: 1 });

    let incoming = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Incoming { .. })
    })
    .await;
    assert_eq!(
        incoming,
        ProcessEventKind::Incoming {
            text: "first".to_string()
        }
    );

    wait_for_event(&mut h.events, &process_id, |k| *k == ProcessEventKind::Ready).await;
    let delivered = h.handle.deliver_queued(process_id.clone()).await.unwrap();
    assert_eq!(delivered, Delivery::Delivered);
    let incoming = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Incoming { .. })
    })
    .await;
    assert_eq!(
        incoming,
        ProcessEventKind::Incoming {
            text: "second".to_string()
        }
    );

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_queue_limit() {
    let h = create_test_harness(SupervisorConfig::default().with_max_queued(1));
    // Never reports ready, so everything queues
    let spec = sh(ProcessRole::Worker, "cat > /dev/null").with_protocol(LineProtocol::Json);
    let process_id = h.handle.spawn(spec).await.unwrap();

    let first = h.handle.send(process_id.clone(), "a".to_string()).await.unwrap();
    assert_eq!(first, Delivery::Queued { depth: 1 });

    let err = h.handle.send(process_id.clone(), "b".to_string()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::QueueFull { max: 1, .. }));

    h.handle.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_retire_publishes_retiring_then_retired() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let process_id = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .unwrap();

    h.handle.retire(process_id.clone()).await.unwrap();
    wait_for_event(&mut h.events, &process_id, status_is(ProcessStatus::Retiring)).await;
    wait_for_event(&mut h.events, &process_id, status_is(ProcessStatus::Retired)).await;

    assert!(h.handle.inspect(process_id.clone()).await.is_none());

    // Retiring a gone process is an error on the command log
    let err = h.handle.retire(process_id).await.unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessNotFound(_)));
}

#[tokio::test]
async fn test_send_while_retiring_is_rejected() {
    let h = create_test_harness(SupervisorConfig::default());
    let process_id = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .unwrap();

    h.handle.retire(process_id.clone()).await.unwrap();
    let err = h.handle.send(process_id, "late".to_string()).await;
    assert!(matches!(
        err,
        Err(SupervisorError::NotAcceptingInput { .. }) | Err(SupervisorError::ProcessNotFound(_))
    ));
}

#[tokio::test]
async fn test_clean_exit_is_stopped() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let process_id = h
        .handle
        .spawn(sh(ProcessRole::Worker, "echo done"))
        .await
        .unwrap();

    let output = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Output { .. })
    })
    .await;
    assert!(matches!(output, ProcessEventKind::Output { ref text, .. } if text == "done"));

    wait_for_event(&mut h.events, &process_id, status_is(ProcessStatus::Stopped)).await;
}

#[tokio::test]
async fn test_failed_exit_reports_code_and_stderr() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let process_id = h
        .handle
        .spawn(sh(ProcessRole::Worker, "echo boom >&2; exit 3"))
        .await
        .unwrap();

    let kind = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Error { .. })
    })
    .await;
    match kind {
        ProcessEventKind::Error { status, error } => {
            assert_eq!(status, ProcessStatus::Failed);
            assert!(error.contains("code 3"), "error was: {error}");
            assert!(error.contains("boom"), "error was: {error}");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[tokio::test]
async fn test_agent_error_line_fails_process() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let script = r#"echo '{"type":"error","message":"rate limited"}'; exec sleep 5"#;
    let spec = sh(ProcessRole::Coordinator, script).with_protocol(LineProtocol::Json);
    let process_id = h.handle.spawn(spec).await.unwrap();

    let kind = wait_for_event(&mut h.events, &process_id, |k| {
        matches!(k, ProcessEventKind::Error { .. })
    })
    .await;
    assert_eq!(
        kind,
        ProcessEventKind::Error {
            status: ProcessStatus::Failed,
            error: "rate limited".to_string(),
        }
    );

    // The child is stopped without a Retired status overwriting the failure
    wait_until_gone(&h.handle, &process_id).await;
    while let Ok(event) = h.events.try_recv() {
        assert!(
            !matches!(event.payload.kind, ProcessEventKind::StatusChange { .. }),
            "unexpected {:?}",
            event.payload.kind
        );
    }

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_agent_error_frees_process_slot() {
    let h = create_test_harness(SupervisorConfig::default().with_max_processes(1));
    let script = r#"echo '{"type":"error","message":"crashed"}'; exec sleep 30"#;
    let spec = sh(ProcessRole::Worker, script).with_protocol(LineProtocol::Json);
    let failed = h.handle.spawn(spec).await.unwrap();

    wait_until_gone(&h.handle, &failed).await;

    let replacement = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .expect("slot should be free after the failed child exits");
    assert_ne!(replacement, failed);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_retires_everything() {
    let mut h = create_test_harness(SupervisorConfig::default());
    let a = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Coordinator, "cat"))
        .await
        .unwrap();
    let b = h
        .handle
        .spawn(ProcessSpec::new(ProcessRole::Worker, "cat"))
        .await
        .unwrap();

    assert_eq!(h.handle.shutdown().await, 2);

    wait_for_event(&mut h.events, &a, status_is(ProcessStatus::Retired)).await;
    assert!(h.handle.inspect(b.clone()).await.map_or(true, |s| s.status == ProcessStatus::Retiring));
}
