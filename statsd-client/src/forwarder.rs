//! Bounded delivery queue and the background forwarder that drains it.

use std::{io, sync::Arc, thread::JoinHandle, time::Duration};

use crossbeam_channel::{bounded, select_biased, Receiver, SendTimeoutError, Sender, TrySendError};
use tracing::{debug, trace};

use crate::{encoder::WireLine, handler::DeliveryError, handler::Hooks, transport::Transport};

const FORWARDER_THREAD_NAME: &str = "statsd-client-forwarder";

/// Producer side of the bounded delivery queue.
pub(crate) struct DeliveryQueue {
    tx: Sender<WireLine>,
    offer_timeout: Duration,
}

impl DeliveryQueue {
    /// Offers a line to the queue, waiting up to the offer timeout for space to become available.
    ///
    /// A zero timeout never blocks. On failure, the line is handed back along with the reason.
    pub fn offer(&self, line: WireLine) -> Result<(), (DeliveryError, WireLine)> {
        if self.offer_timeout.is_zero() {
            self.tx.try_send(line).map_err(|e| match e {
                TrySendError::Full(line) => (DeliveryError::QueueFull, line),
                TrySendError::Disconnected(line) => (DeliveryError::EnqueueFailed, line),
            })
        } else {
            self.tx.send_timeout(line, self.offer_timeout).map_err(|e| match e {
                SendTimeoutError::Timeout(line) => (DeliveryError::QueueFull, line),
                SendTimeoutError::Disconnected(line) => (DeliveryError::EnqueueFailed, line),
            })
        }
    }

    /// Returns the number of lines currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns the fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    pub fn offer_timeout(&self) -> Duration {
        self.offer_timeout
    }
}

/// Handle to a running forwarder.
///
/// Dropping the handle without calling [`stop`][WorkerHandle::stop] also signals the forwarder to stop.
pub(crate) struct WorkerHandle {
    shutdown_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals the forwarder to stop, returning its thread handle.
    ///
    /// The forwarder notices the signal the next time it waits for a line: a send in progress completes, but lines
    /// still in the queue are discarded.
    pub fn stop(self) -> JoinHandle<()> {
        drop(self.shutdown_tx);
        self.thread
    }
}

/// Background loop moving lines from the delivery queue to the transport.
struct Forwarder {
    lines: Receiver<WireLine>,
    shutdown: Receiver<()>,
    transport: Arc<dyn Transport>,
    hooks: Hooks,
}

impl Forwarder {
    fn run(self) {
        debug!(endpoint = %self.hooks.endpoint(), "Forwarder started.");

        loop {
            // Shutdown is checked first so that a stop request wins over any lines still waiting in the queue.
            select_biased! {
                recv(self.shutdown) -> _ => break,
                recv(self.lines) -> line => match line {
                    Ok(line) => self.forward(&line),
                    // Every producer is gone, so nothing more can arrive.
                    Err(_) => break,
                },
            }
        }

        debug!(endpoint = %self.hooks.endpoint(), lines_dropped = self.lines.len(), "Forwarder stopped.");
    }

    fn forward(&self, line: &WireLine) {
        trace!(line = line.as_str(), "Forwarding line.");
        if let Err(e) = self.transport.send(line.as_str()) {
            self.hooks.send_failed(line, e);
        }
    }
}

/// Creates a delivery queue of the given capacity and spawns the single forwarder that drains it.
///
/// # Errors
///
/// If the forwarder thread cannot be spawned, an error is returned.
pub(crate) fn spawn(
    capacity: usize,
    offer_timeout: Duration,
    transport: Arc<dyn Transport>,
    hooks: Hooks,
) -> io::Result<(DeliveryQueue, WorkerHandle)> {
    let (tx, lines) = bounded(capacity);
    let (shutdown_tx, shutdown) = bounded(0);

    let forwarder = Forwarder { lines, shutdown, transport, hooks };
    let thread = std::thread::Builder::new()
        .name(FORWARDER_THREAD_NAME.to_string())
        .spawn(move || forwarder.run())?;

    Ok((DeliveryQueue { tx, offer_timeout }, WorkerHandle { shutdown_tx, thread }))
}
