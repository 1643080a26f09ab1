use std::{
    io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use thiserror::Error;
use tracing::error;

use crate::{encoder::WireLine, transport::Endpoint};

/// Errors that can occur while delivering a single stat.
///
/// These are never returned to callers of the client: the affected line is dropped, the call returns `false`, and the
/// error is handed to the configured [`ErrorHandler`].
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The delivery queue stayed full for the whole offer timeout.
    #[error("delivery queue is full")]
    QueueFull,

    /// The line could not be enqueued because the delivery queue is no longer being drained.
    #[error("delivery queue is disconnected")]
    EnqueueFailed,

    /// The transport failed to send the line.
    #[error("failed to send: {0}")]
    SendFailed(#[source] io::Error),
}

impl DeliveryError {
    /// Returns a short, human-readable reason for the error.
    pub const fn reason(&self) -> &'static str {
        match self {
            DeliveryError::QueueFull => "Queue full",
            DeliveryError::EnqueueFailed => "Enqueue failed",
            DeliveryError::SendFailed(_) => "Send failed",
        }
    }
}

/// Hooks invoked when a stat cannot be delivered.
///
/// Each specific hook defaults to calling [`handle_error`][ErrorHandler::handle_error], so implementations can either
/// handle every failure in one place or override the hooks they care about.
///
/// Hooks are called on the thread that observed the failure: the emitting thread for queue failures and synchronous
/// sends, and the forwarder thread for queued sends. A panicking hook is contained and never reaches the caller.
pub trait ErrorHandler: Send + Sync {
    /// Called when the delivery queue stayed full for the whole offer timeout.
    fn queue_full(&self, line: &WireLine, endpoint: &Endpoint) {
        self.handle_error(&DeliveryError::QueueFull, line, endpoint);
    }

    /// Called when a line could not be enqueued for any reason other than the queue being full.
    fn enqueue_failed(&self, line: &WireLine, endpoint: &Endpoint) {
        self.handle_error(&DeliveryError::EnqueueFailed, line, endpoint);
    }

    /// Called when the transport failed to send a line.
    fn send_failed(&self, line: &WireLine, endpoint: &Endpoint, error: io::Error) {
        self.handle_error(&DeliveryError::SendFailed(error), line, endpoint);
    }

    /// Handles a delivery failure.
    fn handle_error(&self, error: &DeliveryError, line: &WireLine, endpoint: &Endpoint);
}

/// An error handler that reports every failure as an error-level `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn handle_error(&self, error: &DeliveryError, line: &WireLine, endpoint: &Endpoint) {
        error!(
            reason = error.reason(),
            line = line.as_str(),
            %endpoint,
            %error,
            "Failed to deliver stat."
        );
    }
}

/// An error handler that ignores every failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopErrorHandler;

impl ErrorHandler for NoopErrorHandler {
    fn handle_error(&self, _: &DeliveryError, _: &WireLine, _: &Endpoint) {}
}

/// Dispatches delivery failures to an error handler, containing any panics raised by it.
#[derive(Clone)]
pub(crate) struct Hooks {
    handler: Arc<dyn ErrorHandler>,
    endpoint: Endpoint,
}

impl Hooks {
    pub fn new(handler: Arc<dyn ErrorHandler>, endpoint: Endpoint) -> Self {
        Hooks { handler, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn queue_full(&self, line: &WireLine) {
        self.guarded("queue_full", || self.handler.queue_full(line, &self.endpoint));
    }

    pub fn enqueue_failed(&self, line: &WireLine) {
        self.guarded("enqueue_failed", || self.handler.enqueue_failed(line, &self.endpoint));
    }

    pub fn send_failed(&self, line: &WireLine, error: io::Error) {
        self.guarded("send_failed", || self.handler.send_failed(line, &self.endpoint, error));
    }

    fn guarded<F>(&self, hook: &'static str, f: F)
    where
        F: FnOnce(),
    {
        if catch_unwind(AssertUnwindSafe(f)).is_err() {
            error!(hook, endpoint = %self.endpoint, "Error handler panicked.");
        }
    }
}
