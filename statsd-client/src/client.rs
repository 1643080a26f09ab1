use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    builder::{BuildError, StatsdClientBuilder},
    encoder::{encode, WireLine},
    forwarder::{self, DeliveryQueue, WorkerHandle},
    handler::{DeliveryError, Hooks},
    kind::StatKind,
    sampling,
    transport::{Endpoint, Transport},
};

/// A client for sending stats to a statsd server.
///
/// Every emitting method returns whether the stat was *accepted for delivery*: sent to the transport when running
/// synchronously, or placed on the delivery queue otherwise. Acceptance says nothing about whether the stat reached
/// the server. A stat that was dropped by sampling is not accepted, but that is not an error, and no hook is invoked.
///
/// The client is `Send` and `Sync`, and is meant to be shared between threads, typically behind an `Arc`.
pub struct StatsdClient {
    transport: Arc<dyn Transport>,
    queue: Option<DeliveryQueue>,
    worker: Mutex<Option<WorkerHandle>>,
    shut_down: AtomicBool,
    hooks: Hooks,
}

impl StatsdClient {
    /// Creates a builder for configuring a client.
    pub fn builder() -> StatsdClientBuilder {
        StatsdClientBuilder::default()
    }

    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        hooks: Hooks,
        queue_capacity: usize,
        offer_timeout: Duration,
    ) -> Result<Self, BuildError> {
        let (queue, worker) = if queue_capacity > 0 {
            let (queue, worker) =
                forwarder::spawn(queue_capacity, offer_timeout, Arc::clone(&transport), hooks.clone())
                    .map_err(BuildError::Backend)?;
            (Some(queue), Some(worker))
        } else {
            (None, None)
        };

        Ok(StatsdClient { transport, queue, worker: Mutex::new(worker), shut_down: AtomicBool::new(false), hooks })
    }

    /// Increments a counter by one.
    pub fn incr(&self, key: &str) -> bool {
        self.count(key, 1)
    }

    /// Adds `delta` to a counter.
    pub fn count(&self, key: &str, delta: i64) -> bool {
        self.count_sampled(key, delta, 1.0)
    }

    /// Adds `delta` to a counter, sampled at `sample_rate`.
    pub fn count_sampled(&self, key: &str, delta: i64, sample_rate: f64) -> bool {
        self.stat(StatKind::Counter, key, delta, sample_rate)
    }

    /// Records a timing, in milliseconds.
    pub fn time(&self, key: &str, millis: i64) -> bool {
        self.time_sampled(key, millis, 1.0)
    }

    /// Records a timing, in milliseconds, sampled at `sample_rate`.
    pub fn time_sampled(&self, key: &str, millis: i64, sample_rate: f64) -> bool {
        self.stat(StatKind::Timer, key, millis, sample_rate)
    }

    /// Records a timing from a `Duration`, truncated to whole milliseconds.
    pub fn time_duration(&self, key: &str, duration: Duration) -> bool {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.time(key, millis)
    }

    /// Sets a gauge.
    pub fn gauge(&self, key: &str, value: i64) -> bool {
        self.stat(StatKind::Gauge, key, value, 1.0)
    }

    /// Sends a stat of the given kind.
    ///
    /// With a `sample_rate` of 1.0 or more, the stat is always sent. Otherwise, it is sent with probability
    /// `sample_rate`, and the rate is included on the wire so the server can scale it back up.
    pub fn stat(&self, kind: StatKind, key: &str, value: i64, sample_rate: f64) -> bool {
        if !sampling::should_deliver(sample_rate) {
            return false;
        }

        self.deliver(encode(kind, key, value, sample_rate))
    }

    fn deliver(&self, line: WireLine) -> bool {
        match &self.queue {
            Some(_) if self.shut_down.load(Ordering::Acquire) => {
                self.hooks.enqueue_failed(&line);
                false
            }
            Some(queue) => match queue.offer(line) {
                Ok(()) => true,
                Err((DeliveryError::QueueFull, line)) => {
                    self.hooks.queue_full(&line);
                    false
                }
                Err((_, line)) => {
                    self.hooks.enqueue_failed(&line);
                    false
                }
            },
            None => match self.transport.send(line.as_str()) {
                Ok(()) => true,
                Err(e) => {
                    self.hooks.send_failed(&line, e);
                    false
                }
            },
        }
    }

    /// Stops the background forwarder, if there is one.
    ///
    /// Lines still waiting in the delivery queue are discarded rather than sent. A line that is being sent when the
    /// forwarder is stopped is still sent. Calling this more than once, or on a client without a delivery queue, does
    /// nothing.
    ///
    /// Once shut down, a queued client accepts no further stats.
    pub fn shutdown(&self) {
        // Raised before the forwarder is signalled, so no offer made after this call can land in the queue.
        self.shut_down.store(true, Ordering::Release);
        if let Some(worker) = self.worker.lock().take() {
            // Not joined: shutdown never waits on a send that is in flight.
            drop(worker.stop());
            debug!(endpoint = %self.hooks.endpoint(), "Signalled forwarder to stop.");
        }
    }

    /// Returns the endpoint stats are sent to.
    pub fn endpoint(&self) -> &Endpoint {
        self.hooks.endpoint()
    }

    /// Returns `true` if stats are delivered through the background queue.
    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    /// Returns the enqueue offer timeout, or zero when not queueing.
    pub fn offer_timeout(&self) -> Duration {
        self.queue.as_ref().map_or(Duration::ZERO, DeliveryQueue::offer_timeout)
    }

    /// Returns the number of lines waiting in the delivery queue.
    pub fn queued_len(&self) -> usize {
        self.queue.as_ref().map_or(0, DeliveryQueue::len)
    }

    /// Returns the capacity of the delivery queue, or zero when not queueing.
    pub fn queue_capacity(&self) -> usize {
        self.queue.as_ref().map_or(0, DeliveryQueue::capacity)
    }
}

impl Drop for StatsdClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Display for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.endpoint(), f)
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient")
            .field("endpoint", self.endpoint())
            .field("queue_capacity", &self.queue_capacity())
            .field("queued", &self.queued_len())
            .finish_non_exhaustive()
    }
}
