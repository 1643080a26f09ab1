//! Per-name, level-gated stat loggers.
//!
//! A [`StatsLogger`] looks like a logger, but logs stats: every stat logged through it uses the logger's name as its
//! key, and is only logged when the chosen level is enabled on the backend logger it wraps.
//!
//! # Usage
//!
//! Stat loggers are handed out by a [`LoggerRegistry`], which keeps exactly one per name:
//!
//! ```no_run
//! # use log::LevelFilter;
//! # use statsd_client::StatsdClient;
//! # use statsd_logger::{ClientSinkProvider, LoggerRegistry};
//! let provider = ClientSinkProvider::new(StatsdClient::builder().with_host("localhost"), LevelFilter::Debug)
//!     .expect("failed to build statsd client");
//! let registry = LoggerRegistry::new(provider);
//!
//! let requests = registry.get_logger("app.requests");
//! requests.info_incr();
//! requests.debug_time(42);
//!
//! // Trace is disabled on the provider, so this does nothing and returns `false`.
//! requests.trace_gauge(7);
//! ```
//!
//! # Backends
//!
//! Where stats end up is decided by the [`BackendProvider`] a registry is built with:
//!
//! - [`ClientSinkProvider`] sends them to a statsd server, through a shared [`StatsdClient`][statsd_client::StatsdClient]
//! - [`LogBackendProvider`] forwards them to the `log` crate, as structured key/values on a record whose target is the
//!   logger name
//!
//! # Implementations
//!
//! How an emitted stat is turned into a call on the backend is decided by the registry's *implementation*, selected
//! by identifier with [`RegistryBuilder::with_implementation`] or the `STATSD_LOGGER_IMPL` environment variable. The
//! built-in implementations are `default`, which passes the stat along as a (kind, value, sample rate) triple, and
//! `console`, which also adds a human-readable message. Others can be registered with
//! [`RegistryBuilder::register_implementation`].
//!
//! # Process-wide registry
//!
//! [`get_logger`] and [`get_logger_for`] use a process-wide registry. One can be installed with
//! [`set_global_registry`]; otherwise, a registry backed by the `log` crate is created on first use. Creating it
//! fails if `STATSD_LOGGER_IMPL` names an unknown implementation: [`try_global_registry`] returns the error, while
//! [`get_logger`] and [`get_logger_for`] panic.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod backend;
pub use self::backend::{ArgValue, Argument, BackendLogger, BackendProvider, Emission, Level, LogCall};

mod client_sink;
pub use self::client_sink::{ClientSink, ClientSinkProvider, DEFAULT_SINK_QUEUE_CAPACITY};

mod facade;
pub use self::facade::{ConsoleFormat, EmissionFormat, StatArgsFormat, StatsLogger};

mod implementation;
pub use self::implementation::{FacadeConstructor, Implementations, CONSOLE_IMPLEMENTATION, DEFAULT_IMPLEMENTATION};

mod log_backend;
pub use self::log_backend::{LogBackend, LogBackendProvider};

mod registry;
pub use self::registry::{
    get_logger, get_logger_for, global_registry, set_global_registry, try_global_registry, ConfigError, LoggerRegistry,
    RegistryBuilder, SetRegistryError,
};
