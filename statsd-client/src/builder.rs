use std::{io, sync::Arc, time::Duration};

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;
use tracing::warn;

use crate::{
    client::StatsdClient,
    handler::{ErrorHandler, Hooks, LoggingErrorHandler},
    transport::{Endpoint, Transport, UdpTransport},
};

/// The port statsd listens on by default.
pub const DEFAULT_PORT: u16 = 8125;

const ENV_HOST: &str = "STATSD_HOST";
const ENV_PORT: &str = "STATSD_PORT";
const ENV_QUEUE_CAPACITY: &str = "STATSD_QUEUE_CAPACITY";
const ENV_QUEUE_OFFER_TIMEOUT_MS: &str = "STATSD_QUEUE_OFFER_TIMEOUT_MS";
const ENV_CHARSET: &str = "STATSD_CHARSET";

/// Errors that could occur while building a statsd client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No host was configured.
    #[error("no statsd host configured")]
    MissingHost,

    /// Failed to resolve the host.
    #[error("failed to resolve host '{host}': {source}")]
    Resolve {
        /// The host that failed to resolve.
        host: String,

        /// The underlying resolution error.
        #[source]
        source: io::Error,
    },

    /// The host resolved, but to no addresses.
    #[error("host '{host}' did not resolve to any address")]
    NoAddress {
        /// The host that was resolved.
        host: String,
    },

    /// Failed to open the local socket used to send stats.
    #[error("failed to open transport: {0}")]
    TransportOpen(#[source] io::Error),

    /// The configured character encoding is not known.
    #[error("unknown character encoding '{label}'")]
    UnknownCharset {
        /// The encoding label that was given.
        label: String,
    },

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnv {
        /// The name of the environment variable.
        var: &'static str,

        /// Details about the parsing failure.
        reason: String,
    },

    /// Failed to spawn the background forwarder thread.
    #[error("failed to spawn background forwarder thread: {0}")]
    Backend(#[source] io::Error),
}

/// Builder for a [`StatsdClient`].
pub struct StatsdClientBuilder {
    host: Option<String>,
    port: u16,
    queue_capacity: usize,
    offer_timeout: Duration,
    encoding: &'static Encoding,
    error_handler: Arc<dyn ErrorHandler>,
    transport: Option<Arc<dyn Transport>>,
}

impl StatsdClientBuilder {
    /// Creates a builder seeded from the environment.
    ///
    /// The following variables are read, each falling back to the builder default when unset or empty:
    ///
    /// - `STATSD_HOST`: the host to send to
    /// - `STATSD_PORT`: the port to send to
    /// - `STATSD_QUEUE_CAPACITY`: the delivery queue capacity (0 disables queueing)
    /// - `STATSD_QUEUE_OFFER_TIMEOUT_MS`: the enqueue offer timeout, in milliseconds
    /// - `STATSD_CHARSET`: the character encoding label used for outgoing lines
    ///
    /// An unknown charset is logged and ignored.
    ///
    /// # Errors
    ///
    /// If a numeric variable cannot be parsed, an error is returned.
    pub fn from_env() -> Result<Self, BuildError> {
        let mut builder = Self::default();

        if let Some(host) = env_var(ENV_HOST) {
            builder.host = Some(host);
        }
        if let Some(port) = env_var(ENV_PORT) {
            builder.port = parse_env(ENV_PORT, &port)?;
        }
        if let Some(capacity) = env_var(ENV_QUEUE_CAPACITY) {
            builder.queue_capacity = parse_env(ENV_QUEUE_CAPACITY, &capacity)?;
        }
        if let Some(timeout_ms) = env_var(ENV_QUEUE_OFFER_TIMEOUT_MS) {
            builder.offer_timeout = Duration::from_millis(parse_env(ENV_QUEUE_OFFER_TIMEOUT_MS, &timeout_ms)?);
        }
        if let Some(label) = env_var(ENV_CHARSET) {
            match Encoding::for_label(label.trim().as_bytes()) {
                Some(encoding) => builder.encoding = encoding,
                None => warn!(charset = label.as_str(), "Ignoring unknown character encoding from environment."),
            }
        }

        Ok(builder)
    }

    /// Sets the host to send stats to.
    ///
    /// The host is resolved once, when the client is built. This setting is required.
    #[must_use]
    pub fn with_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.host = Some(host.into());
        self
    }

    /// Sets the port to send stats to.
    ///
    /// Defaults to 8125.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the capacity of the delivery queue.
    ///
    /// When the capacity is greater than zero, stats are placed on a bounded queue and sent by a single background
    /// thread, so emitting threads never wait on the network. When the capacity is zero, stats are sent on the
    /// emitting thread.
    ///
    /// Defaults to 0.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Returns the configured delivery queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Sets how long an emitting thread may wait for space in a full delivery queue.
    ///
    /// When the timeout elapses, the stat is dropped and the queue-full hook is invoked. A zero timeout never waits.
    ///
    /// Defaults to 0.
    #[must_use]
    pub fn with_offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout = timeout;
        self
    }

    /// Sets the character encoding used to turn lines into packets, by its WHATWG label (e.g. `latin1`).
    ///
    /// Defaults to UTF-8.
    ///
    /// # Errors
    ///
    /// If the label does not name a known encoding, an error is returned.
    pub fn with_charset<L>(mut self, label: L) -> Result<Self, BuildError>
    where
        L: AsRef<str>,
    {
        let label = label.as_ref();
        self.encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| BuildError::UnknownCharset { label: label.to_string() })?;
        Ok(self)
    }

    /// Sets the handler invoked when a stat cannot be delivered.
    ///
    /// Defaults to [`LoggingErrorHandler`].
    #[must_use]
    pub fn with_error_handler<H>(mut self, handler: H) -> Self
    where
        H: ErrorHandler + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Sets a custom transport to send lines through, instead of a UDP socket.
    ///
    /// The host is still resolved so that diagnostics can name the endpoint. Any character encoding configured on the
    /// builder is not applied to custom transports.
    #[must_use]
    pub fn with_transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the client.
    ///
    /// The host is resolved and the transport is opened. If queueing is enabled, the background forwarder is spawned.
    ///
    /// # Errors
    ///
    /// If no host was configured, the host cannot be resolved, the transport cannot be opened, or the forwarder
    /// thread cannot be spawned, an error is returned.
    pub fn build(self) -> Result<StatsdClient, BuildError> {
        let host = self.host.ok_or(BuildError::MissingHost)?;
        let endpoint = Endpoint::resolve(&host, self.port)?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                UdpTransport::open_with_encoding(endpoint.clone(), self.encoding)
                    .map_err(BuildError::TransportOpen)?,
            ),
        };

        let hooks = Hooks::new(self.error_handler, endpoint);
        StatsdClient::new(transport, hooks, self.queue_capacity, self.offer_timeout)
    }
}

impl Default for StatsdClientBuilder {
    fn default() -> Self {
        StatsdClientBuilder {
            host: None,
            port: DEFAULT_PORT,
            queue_capacity: 0,
            offer_timeout: Duration::ZERO,
            encoding: UTF_8,
            error_handler: Arc::new(LoggingErrorHandler),
            transport: None,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, BuildError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| BuildError::InvalidEnv { var, reason: e.to_string() })
}
