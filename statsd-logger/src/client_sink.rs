//! In-process sink that sends stat calls straight to a statsd client.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::LevelFilter;
use statsd_client::{
    BuildError, DeliveryError, Endpoint, ErrorHandler, LoggingErrorHandler, StatsdClient, StatsdClientBuilder,
    WireLine,
};
use tracing::warn;

use crate::backend::{BackendLogger, BackendProvider, Level, LogCall};

/// Queue capacity used when the builder handed to [`ClientSinkProvider::new`] does not set one.
pub const DEFAULT_SINK_QUEUE_CAPACITY: usize = 500;

/// Error handler installed on the sink's client.
///
/// Queue-full failures are reported once, then suppressed until a stat is accepted again. Everything else is
/// logged like [`LoggingErrorHandler`] does.
struct SinkErrorHandler {
    warn_queue_full: Arc<AtomicBool>,
}

impl ErrorHandler for SinkErrorHandler {
    fn queue_full(&self, line: &WireLine, endpoint: &Endpoint) {
        if self.warn_queue_full.swap(false, Ordering::AcqRel) {
            warn!(
                line = line.as_str(),
                %endpoint,
                "Stats sink queue is full; increase the queue capacity or log fewer stats. \
                 Further queue-full reports are suppressed until a stat is accepted."
            );
        }
    }

    fn handle_error(&self, error: &DeliveryError, line: &WireLine, endpoint: &Endpoint) {
        LoggingErrorHandler.handle_error(error, line, endpoint);
    }
}

/// Provides [`ClientSink`]s that all share one statsd client.
///
/// The client's lifecycle is bound to the provider: [`stop`][ClientSinkProvider::stop] shuts it down, after which
/// every sink rejects further stats.
#[derive(Clone)]
pub struct ClientSinkProvider {
    client: Arc<StatsdClient>,
    max_level: LevelFilter,
    warn_queue_full: Arc<AtomicBool>,
}

impl ClientSinkProvider {
    /// Builds the statsd client from `builder` and creates a provider over it.
    ///
    /// Levels above `max_level` are disabled on every sink. The builder's error handler is replaced by one that
    /// reports queue-full failures once per run of rejections. If the builder is not set up to queue, a queue of
    /// [`DEFAULT_SINK_QUEUE_CAPACITY`] is used so that logging threads never wait on the network.
    ///
    /// # Errors
    ///
    /// If the client cannot be built, an error is returned.
    pub fn new(builder: StatsdClientBuilder, max_level: LevelFilter) -> Result<Self, BuildError> {
        let warn_queue_full = Arc::new(AtomicBool::new(true));
        let builder = if builder.queue_capacity() == 0 {
            builder.with_queue_capacity(DEFAULT_SINK_QUEUE_CAPACITY)
        } else {
            builder
        };
        let client = builder
            .with_error_handler(SinkErrorHandler { warn_queue_full: Arc::clone(&warn_queue_full) })
            .build()?;

        Ok(ClientSinkProvider { client: Arc::new(client), max_level, warn_queue_full })
    }

    /// Returns the client shared by every sink.
    pub fn client(&self) -> &StatsdClient {
        &self.client
    }

    /// Shuts down the shared client.
    pub fn stop(&self) {
        self.client.shutdown();
    }
}

impl BackendProvider for ClientSinkProvider {
    fn backend(&self, name: &str) -> Arc<dyn BackendLogger> {
        Arc::new(ClientSink {
            name: name.to_string(),
            client: Arc::clone(&self.client),
            max_level: self.max_level,
            warn_queue_full: Arc::clone(&self.warn_queue_full),
        })
    }
}

/// A backend logger that sends stats to a statsd client, keyed by the logger name.
///
/// Only calls whose arguments are exactly a stat kind, an integer value and a float sample rate are sent; anything
/// else is ignored. Message and marker are never looked at.
pub struct ClientSink {
    name: String,
    client: Arc<StatsdClient>,
    max_level: LevelFilter,
    warn_queue_full: Arc<AtomicBool>,
}

impl BackendLogger for ClientSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    fn log(&self, level: Level, call: LogCall) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        let Some((kind, value, sample_rate)) = call.stat_args() else {
            return false;
        };

        let sent = self.client.stat(kind, &self.name, value, sample_rate);
        if sent {
            self.warn_queue_full.store(true, Ordering::Release);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{SocketAddr, UdpSocket},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use log::LevelFilter;
    use statsd_client::{encode, Endpoint, ErrorHandler, StatKind, StatsdClient};

    use super::{ClientSinkProvider, SinkErrorHandler, DEFAULT_SINK_QUEUE_CAPACITY};
    use crate::backend::{ArgValue, Argument, BackendProvider, Level, LogCall};

    fn receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn recv(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 128];
        let len = socket.recv(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    fn triple(kind: StatKind, value: i64, sample_rate: f64) -> LogCall {
        LogCall::new(vec![
            Argument::new("kind", ArgValue::Kind(kind)),
            Argument::new("value", ArgValue::Int(value)),
            Argument::new("sample_rate", ArgValue::Float(sample_rate)),
        ])
    }

    #[test]
    fn sends_triples_keyed_by_logger_name() {
        let (socket, port) = receiver();
        let provider =
            ClientSinkProvider::new(StatsdClient::builder().with_host("127.0.0.1").with_port(port), LevelFilter::Debug)
                .unwrap();
        assert_eq!(provider.client().queue_capacity(), DEFAULT_SINK_QUEUE_CAPACITY);

        let sink = provider.backend("app.requests");
        assert_eq!(sink.name(), "app.requests");
        assert!(sink.is_enabled(Level::Info));
        assert!(sink.is_enabled(Level::Debug));
        assert!(!sink.is_enabled(Level::Trace));

        // A success re-arms the queue-full warning.
        provider.warn_queue_full.store(false, Ordering::SeqCst);
        assert!(sink.log(Level::Info, triple(StatKind::Timer, 15, 1.0)));
        assert_eq!(recv(&socket), "app.requests:15|ms");
        assert!(provider.warn_queue_full.load(Ordering::SeqCst));

        assert!(!sink.log(Level::Trace, triple(StatKind::Counter, 1, 1.0)));
        assert!(!sink.log(Level::Info, LogCall::default().with_message("not a stat")));
        assert!(!sink.log(
            Level::Info,
            LogCall::new(vec![Argument::new("value", ArgValue::Text("1".to_string()))])
        ));

        // Once stopped, nothing more is accepted.
        provider.stop();
        assert!(!sink.log(Level::Info, triple(StatKind::Counter, 1, 1.0)));
    }

    #[test]
    fn queue_full_is_reported_once_per_run() {
        let flag = Arc::new(AtomicBool::new(true));
        let handler = SinkErrorHandler { warn_queue_full: Arc::clone(&flag) };
        let endpoint = Endpoint::from(SocketAddr::from(([127, 0, 0, 1], 8125)));
        let line = encode(StatKind::Counter, "k", 1, 1.0);

        handler.queue_full(&line, &endpoint);
        assert!(!flag.load(Ordering::SeqCst));
        handler.queue_full(&line, &endpoint);
        assert!(!flag.load(Ordering::SeqCst));
    }
}
