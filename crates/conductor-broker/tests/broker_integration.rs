//! Integration tests for the event broker.
//!
//! These exercise the broker as a complete system: many subscribers, many
//! publishers, cancellation and shutdown racing with delivery.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free policy covers
//! production code only.

use std::sync::Arc;
use std::time::Duration;

use conductor_broker::{Broker, BrokerConfig, Event};
use conductor_core::{EventPayload, ProcessEvent, ProcessRole};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatKind {
    CoordinatorChat,
    WorkerChat,
}

/// Minimal payload standing in for a coordinator chat feed.
#[derive(Debug, Clone, PartialEq)]
enum ChatEvent {
    CoordinatorChat { content: String },
    WorkerChat { worker: String, content: String },
}

impl EventPayload for ChatEvent {
    type Kind = ChatKind;

    fn kind(&self) -> ChatKind {
        match self {
            Self::CoordinatorChat { .. } => ChatKind::CoordinatorChat,
            Self::WorkerChat { .. } => ChatKind::WorkerChat,
        }
    }
}

fn content_of(event: &Event<ChatEvent>) -> &str {
    match &event.payload {
        ChatEvent::CoordinatorChat { content } | ChatEvent::WorkerChat { content, .. } => content,
    }
}

async fn recv_within<P: EventPayload>(rx: &mut mpsc::Receiver<Event<P>>) -> Option<Event<P>> {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("receive should not hang")
}

async fn wait_for_count<P: EventPayload>(broker: &Broker<P>, expected: usize) {
    timeout(Duration::from_secs(1), async {
        while broker.subscriber_count() != expected {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "subscriber count stuck at {} (expected {expected})",
            broker.subscriber_count()
        )
    });
}

// ============================================================================
// Fan-out
// ============================================================================

#[tokio::test]
async fn test_five_subscribers_receive_coordinator_chat() {
    let broker: Broker<ChatEvent> = Broker::default();
    let mut receivers: Vec<_> = (0..5)
        .map(|_| broker.subscribe(CancellationToken::new()))
        .collect();

    let delivered = broker.publish(ChatEvent::CoordinatorChat {
        content: "hi".to_string(),
    });
    assert_eq!(delivered, 5);

    for rx in &mut receivers {
        let event = recv_within(rx).await.expect("event expected");
        assert_eq!(event.kind, ChatKind::CoordinatorChat);
        assert_eq!(content_of(&event), "hi");
        assert!(event.timestamp.timestamp() > 0, "timestamp must be set");
    }
}

#[tokio::test]
async fn test_fan_out_delivers_exactly_once() {
    let broker: Broker<ProcessEvent> = Broker::default();
    let mut receivers: Vec<_> = (0..8)
        .map(|_| broker.subscribe(CancellationToken::new()))
        .collect();

    let payload = ProcessEvent::output("coordinator-1", ProcessRole::Coordinator, "plan ready");
    broker.publish(payload.clone());

    for rx in &mut receivers {
        let event = recv_within(rx).await.expect("event expected");
        assert_eq!(event.payload, payload);
        assert!(rx.try_recv().is_err(), "no duplicate delivery");
    }
}

#[tokio::test]
async fn test_events_arrive_in_publish_order() {
    let broker: Broker<ChatEvent> = Broker::default();
    let mut rx = broker.subscribe(CancellationToken::new());

    for i in 0..20 {
        broker.publish(ChatEvent::WorkerChat {
            worker: "worker-1".to_string(),
            content: format!("line {i}"),
        });
    }

    for i in 0..20 {
        let event = recv_within(&mut rx).await.unwrap();
        assert_eq!(content_of(&event), format!("line {i}"));
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_k_of_n_leaves_rest_working() {
    let broker: Broker<ChatEvent> = Broker::default();
    let tokens: Vec<CancellationToken> = (0..6).map(|_| CancellationToken::new()).collect();
    let mut receivers: Vec<_> = tokens.iter().map(|t| broker.subscribe(t.clone())).collect();
    assert_eq!(broker.subscriber_count(), 6);

    // Cancel subscribers 0, 2, 4
    for token in tokens.iter().step_by(2) {
        token.cancel();
    }
    wait_for_count(&broker, 3).await;

    broker.publish(ChatEvent::CoordinatorChat {
        content: "after cancel".to_string(),
    });

    for (i, rx) in receivers.iter_mut().enumerate() {
        let received = recv_within(rx).await;
        if i % 2 == 0 {
            assert!(received.is_none(), "cancelled subscriber {i} must be closed");
        } else {
            let event = received.expect("live subscriber should receive");
            assert_eq!(content_of(&event), "after cancel");
        }
    }
}

#[tokio::test]
async fn test_cancelled_subscriber_drains_buffer_then_closes() {
    let broker: Broker<ChatEvent> = Broker::default();
    let cancel = CancellationToken::new();
    let mut rx = broker.subscribe(cancel.clone());

    broker.publish(ChatEvent::CoordinatorChat {
        content: "buffered".to_string(),
    });
    cancel.cancel();
    wait_for_count(&broker, 0).await;

    let event = recv_within(&mut rx).await.expect("buffered event survives");
    assert_eq!(content_of(&event), "buffered");
    assert!(recv_within(&mut rx).await.is_none());
}

#[tokio::test]
async fn test_cancel_before_any_publish() {
    let broker: Broker<ChatEvent> = Broker::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut rx = broker.subscribe(cancel);
    wait_for_count(&broker, 0).await;
    assert!(recv_within(&mut rx).await.is_none());
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test]
async fn test_close_closes_all_and_zeroes_count() {
    let broker: Broker<ChatEvent> = Broker::default();
    let mut receivers: Vec<_> = (0..4)
        .map(|_| broker.subscribe(CancellationToken::new()))
        .collect();

    broker.close();
    assert_eq!(broker.subscriber_count(), 0);

    for rx in &mut receivers {
        assert!(recv_within(rx).await.is_none());
    }
}

#[tokio::test]
async fn test_close_from_many_tasks_concurrently() {
    let broker: Broker<ChatEvent> = Broker::default();
    let _receivers: Vec<_> = (0..4)
        .map(|_| broker.subscribe(CancellationToken::new()))
        .collect();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let b = broker.clone();
        handles.push(tokio::spawn(async move { b.close() }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(broker.is_closed());
    assert_eq!(broker.subscriber_count(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publish_subscribe_cancel() {
    let broker: Broker<ProcessEvent> =
        Broker::new(BrokerConfig::default().with_buffer_size(1024));
    let broker = Arc::new(broker);

    let mut publishers = Vec::new();
    for p in 0..4 {
        let b = Arc::clone(&broker);
        publishers.push(tokio::spawn(async move {
            for i in 0..200 {
                b.publish(ProcessEvent::output(
                    format!("worker-{p}"),
                    ProcessRole::Worker,
                    format!("{i}"),
                ));
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut churners = Vec::new();
    for _ in 0..4 {
        let b = Arc::clone(&broker);
        churners.push(tokio::spawn(async move {
            for _ in 0..50 {
                let cancel = CancellationToken::new();
                let _rx = b.subscribe(cancel.clone());
                tokio::task::yield_now().await;
                cancel.cancel();
            }
        }));
    }

    let stable_cancel = CancellationToken::new();
    let mut stable = broker.subscribe(stable_cancel.clone());

    for handle in publishers.into_iter().chain(churners) {
        handle.await.unwrap();
    }

    // Everything except the stable subscriber is eventually gone.
    wait_for_count(&broker, 1).await;

    let mut received = 0;
    while stable.try_recv().is_ok() {
        received += 1;
    }
    assert!(received <= 800);

    broker.close();
    assert_eq!(broker.subscriber_count(), 0);
}
