use std::{fmt, sync::Arc};

use statsd_client::StatKind;

use crate::backend::{ArgValue, Argument, BackendLogger, Emission, Level, LogCall};

/// Turns an [`Emission`] into the [`LogCall`] handed to a backend logger.
///
/// The format decides the message text, the marker, and the arguments of the call. Backends must be able to make
/// sense of whatever the format produces: [`ClientSink`][crate::ClientSink], for instance, only accepts calls whose
/// arguments are exactly the stat triple.
pub trait EmissionFormat: Send + Sync {
    /// Builds the call for `emission`.
    fn format(&self, emission: &Emission) -> LogCall;
}

/// The default format: the stat triple, with no message or marker.
///
/// The arguments are named `kind`, `value` and `sample_rate`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatArgsFormat;

impl EmissionFormat for StatArgsFormat {
    fn format(&self, emission: &Emission) -> LogCall {
        LogCall::new(stat_args(emission))
    }
}

/// A format for human-readable backends: the stat triple, plus a message of the form `{kind} {value} {sample_rate}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleFormat;

impl EmissionFormat for ConsoleFormat {
    fn format(&self, emission: &Emission) -> LogCall {
        LogCall::new(stat_args(emission))
            .with_message(format!("{} {} {}", emission.kind, emission.value, emission.sample_rate))
    }
}

fn stat_args(emission: &Emission) -> Vec<Argument> {
    vec![
        Argument::new("kind", ArgValue::Kind(emission.kind)),
        Argument::new("value", ArgValue::Int(emission.value)),
        Argument::new("sample_rate", ArgValue::Float(emission.sample_rate)),
    ]
}

macro_rules! level_methods {
    (
        $level:expr, $label:literal,
        $is_enabled:ident, $incr:ident, $count:ident, $count_sampled:ident,
        $time:ident, $time_sampled:ident, $gauge:ident, $stat:ident
    ) => {
        #[doc = concat!("Returns `true` if the backing logger has the ", $label, " level enabled.")]
        pub fn $is_enabled(&self) -> bool {
            self.backend.is_enabled($level)
        }

        #[doc = concat!("Increments a counter by one, at the ", $label, " level.")]
        pub fn $incr(&self) -> bool {
            self.$count(1)
        }

        #[doc = concat!("Adds `delta` to a counter, at the ", $label, " level.")]
        pub fn $count(&self, delta: i64) -> bool {
            self.$count_sampled(delta, 1.0)
        }

        #[doc = concat!("Adds `delta` to a counter, sampled at `sample_rate`, at the ", $label, " level.")]
        pub fn $count_sampled(&self, delta: i64, sample_rate: f64) -> bool {
            self.$stat(StatKind::Counter, delta, sample_rate)
        }

        #[doc = concat!("Records a timing, in milliseconds, at the ", $label, " level.")]
        pub fn $time(&self, millis: i64) -> bool {
            self.$time_sampled(millis, 1.0)
        }

        #[doc = concat!("Records a timing, in milliseconds, sampled at `sample_rate`, at the ", $label, " level.")]
        pub fn $time_sampled(&self, millis: i64, sample_rate: f64) -> bool {
            self.$stat(StatKind::Timer, millis, sample_rate)
        }

        #[doc = concat!("Sets a gauge, at the ", $label, " level.")]
        pub fn $gauge(&self, value: i64) -> bool {
            self.$stat(StatKind::Gauge, value, 1.0)
        }

        #[doc = concat!("Logs a stat of the given kind, at the ", $label, " level.")]
        ///
        /// Returns whatever the backend logger returns, or `false` without doing anything else when the level is
        /// disabled.
        pub fn $stat(&self, kind: StatKind, value: i64, sample_rate: f64) -> bool {
            self.emit($level, kind, value, sample_rate)
        }
    };
}

/// A named, level-gated stat logger.
///
/// The name of the backing logger is used as the key of every stat logged through it. Stat loggers are normally
/// obtained from a [`LoggerRegistry`][crate::LoggerRegistry], which hands out one shared instance per name.
pub struct StatsLogger {
    backend: Arc<dyn BackendLogger>,
    format: Arc<dyn EmissionFormat>,
}

impl StatsLogger {
    /// Creates a stat logger over `backend`, using [`StatArgsFormat`].
    pub fn new(backend: Arc<dyn BackendLogger>) -> Self {
        Self::with_format(backend, StatArgsFormat)
    }

    /// Creates a stat logger over `backend`, using the given emission format.
    pub fn with_format<F>(backend: Arc<dyn BackendLogger>, format: F) -> Self
    where
        F: EmissionFormat + 'static,
    {
        StatsLogger { backend, format: Arc::new(format) }
    }

    /// Returns the name of this logger.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    level_methods!(
        Level::Info, "info",
        is_info_enabled, info_incr, info_count, info_count_sampled,
        info_time, info_time_sampled, info_gauge, info_stat
    );

    level_methods!(
        Level::Debug, "debug",
        is_debug_enabled, debug_incr, debug_count, debug_count_sampled,
        debug_time, debug_time_sampled, debug_gauge, debug_stat
    );

    level_methods!(
        Level::Trace, "trace",
        is_trace_enabled, trace_incr, trace_count, trace_count_sampled,
        trace_time, trace_time_sampled, trace_gauge, trace_stat
    );

    fn emit(&self, level: Level, kind: StatKind, value: i64, sample_rate: f64) -> bool {
        if !self.backend.is_enabled(level) {
            return false;
        }

        let emission = Emission { kind, value, sample_rate };
        self.backend.log(level, self.format.format(&emission))
    }
}

impl fmt::Debug for StatsLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsLogger").field("name", &self.name()).finish_non_exhaustive()
    }
}
