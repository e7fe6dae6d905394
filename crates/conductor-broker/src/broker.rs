//! The fan-out broker.
//!
//! One `Broker<P>` owns the registry of live subscriptions for payload type
//! `P`. Handles are cheap to clone; all clones share the same registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use conductor_core::{EventPayload, SharedClock, SystemClock};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::event::Event;

/// Default per-subscriber buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

type SubscriberId = u64;

// ============================================================================
// Configuration
// ============================================================================

/// Broker tuning knobs.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Capacity of each subscriber's buffer. Values below 1 are raised to 1.
    pub buffer_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BrokerConfig {
    /// Sets the per-subscriber buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

// ============================================================================
// Broker
// ============================================================================

/// One live subscription.
struct Subscriber<P: EventPayload> {
    tx: mpsc::Sender<Event<P>>,
    /// Stops the watcher task when the entry is removed by any path.
    watcher: CancellationToken,
}

impl<P: EventPayload> Drop for Subscriber<P> {
    fn drop(&mut self) {
        self.watcher.cancel();
    }
}

struct Inner<P: EventPayload> {
    /// Live subscriptions. The map holds the only sender for each channel,
    /// so removing an entry closes that subscriber's channel.
    subscribers: RwLock<HashMap<SubscriberId, Subscriber<P>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    /// Wakes every watcher task on close or drop.
    shutdown: CancellationToken,
    buffer_size: usize,
    clock: SharedClock,
}

impl<P: EventPayload> Inner<P> {
    fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }
}

impl<P: EventPayload> Drop for Inner<P> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Typed publish/subscribe broker.
///
/// # Usage
///
/// ```ignore
/// let broker: Broker<ProcessEvent> = Broker::new(BrokerConfig::default());
///
/// let cancel = CancellationToken::new();
/// let mut rx = broker.subscribe(cancel.clone());
///
/// broker.publish(ProcessEvent::output("worker-1", ProcessRole::Worker, "hi"));
/// let event = rx.recv().await;
///
/// cancel.cancel(); // subscription removed, channel closed
/// ```
pub struct Broker<P: EventPayload> {
    inner: Arc<Inner<P>>,
}

impl<P: EventPayload> Clone for Broker<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: EventPayload> fmt::Debug for Broker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<P: EventPayload> Default for Broker<P> {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl<P: EventPayload> Broker<P> {
    /// Creates a broker timestamping with the system clock.
    pub fn new(config: BrokerConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Creates a broker timestamping with `clock`.
    pub fn with_clock(config: BrokerConfig, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                buffer_size: config.buffer_size.max(1),
                clock,
            }),
        }
    }

    /// Subscribes to every event published from now on.
    ///
    /// Cancelling `cancel` removes the subscription and closes the returned
    /// channel once its buffered events are drained. Subscribing to a closed
    /// broker returns a channel that is already closed.
    ///
    /// Cancellation is observed by a watcher task spawned on the current
    /// Tokio runtime. Outside a runtime the subscription is still delivered
    /// to, but is only removed by `close()` or when the receiver is dropped.
    pub fn subscribe(&self, cancel: CancellationToken) -> mpsc::Receiver<Event<P>> {
        let (tx, rx) = mpsc::channel(self.inner.buffer_size);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let watcher = self.inner.shutdown.child_token();

        {
            let mut subs = self.inner.subscribers.write();
            if self.inner.closed.load(Ordering::Acquire) {
                debug!(subscriber = id, "Subscribe on closed broker");
                return rx;
            }
            subs.insert(
                id,
                Subscriber {
                    tx,
                    watcher: watcher.clone(),
                },
            );
        }

        debug!(subscriber = id, "Subscriber added");
        self.spawn_watcher(id, cancel, watcher);
        rx
    }

    /// Spawns the task that removes subscription `id` once cancelled.
    ///
    /// `watcher` fires when the entry leaves the map some other way (pruned,
    /// closed), so the task never outlives its subscription.
    fn spawn_watcher(&self, id: SubscriberId, cancel: CancellationToken, watcher: CancellationToken) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                subscriber = id,
                "No Tokio runtime, cancellation will not be observed"
            );
            return;
        };

        let weak: Weak<Inner<P>> = Arc::downgrade(&self.inner);

        runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = watcher.cancelled() => {}
            }

            if let Some(inner) = weak.upgrade() {
                if inner.remove(id) {
                    debug!(subscriber = id, "Subscriber cancelled");
                }
            }
        });
    }

    /// Publishes `payload` to every live subscriber.
    ///
    /// Never blocks. Subscribers with a full buffer miss this event;
    /// subscribers whose receiver was dropped are pruned. Returns the number
    /// of subscribers the event was delivered to.
    pub fn publish(&self, payload: P) -> usize {
        if self.inner.closed.load(Ordering::Acquire) {
            return 0;
        }

        let event = Event::new(payload, self.inner.clock.now());
        let mut delivered = 0;
        let mut stale = Vec::new();

        {
            let subs = self.inner.subscribers.read();
            for (id, sub) in subs.iter() {
                match sub.tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        trace!(subscriber = *id, kind = ?event.kind, "Subscriber buffer full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => stale.push(*id),
                }
            }
        }

        if !stale.is_empty() {
            let mut subs = self.inner.subscribers.write();
            for id in &stale {
                subs.remove(id);
            }
            debug!(pruned = stale.len(), "Pruned dropped subscribers");
        }

        delivered
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes every subscriber channel and stops accepting subscriptions.
    ///
    /// Idempotent and safe to call from any thread.
    pub fn close(&self) {
        let drained = {
            let mut subs = self.inner.subscribers.write();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *subs)
        };

        self.inner.shutdown.cancel();
        debug!(closed_subscribers = drained.len(), "Broker closed");
    }
}

// ============================================================================
// Tests
// ============================================================================
