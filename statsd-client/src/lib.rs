//! A client for sending stats to a [statsd][statsd] server over UDP.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! ```no_run
//! # use statsd_client::StatsdClient;
//! // Build a client that sends to a local statsd server, on the default port.
//! let client = StatsdClient::builder()
//!     .with_host("localhost")
//!     .build()
//!     .expect("failed to build statsd client");
//!
//! client.incr("requests");
//! client.time("request.latency", 42);
//! client.gauge("connections", 7);
//!
//! // Sampled stats are only sent some of the time, and carry the rate so the server can scale them back up.
//! client.count_sampled("cache.hits", 1, 0.1);
//! ```
//!
//! # Delivery
//!
//! Stats are fire-and-forget. Every emitting method returns whether the stat was accepted for delivery, but nothing
//! is retried and nothing is acknowledged.
//!
//! By default, stats are sent on the emitting thread. When a queue capacity is configured, stats are instead placed
//! on a bounded queue, and a single background thread sends them, so that emitting threads never wait on the network:
//!
//! ```no_run
//! # use std::time::Duration;
//! # use statsd_client::StatsdClient;
//! let client = StatsdClient::builder()
//!     .with_host("statsd.internal")
//!     .with_queue_capacity(500)
//!     .with_offer_timeout(Duration::from_millis(1))
//!     .build()
//!     .expect("failed to build statsd client");
//! # drop(client);
//! ```
//!
//! When the queue stays full for the whole offer timeout, the stat is dropped and the configured
//! [`ErrorHandler`] is told about it. Shutting the client down stops the background thread without draining the
//! queue.
//!
//! # Errors
//!
//! Building a client fails if the host can't be resolved or the socket can't be opened. After that, no error is
//! ever returned from, or raised by, an emitting method: delivery failures are handed to the [`ErrorHandler`], which
//! defaults to logging them via `tracing`.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdClientBuilder, DEFAULT_PORT};

mod client;
pub use self::client::StatsdClient;

mod encoder;
pub use self::encoder::{encode, WireLine};

mod forwarder;

mod handler;
pub use self::handler::{DeliveryError, ErrorHandler, LoggingErrorHandler, NoopErrorHandler};

mod kind;
pub use self::kind::StatKind;

mod sampling;

mod transport;
pub use self::transport::{Endpoint, Transport, UdpTransport};
