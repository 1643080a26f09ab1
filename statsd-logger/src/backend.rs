use std::{fmt, sync::Arc};

pub use log::Level;
use statsd_client::StatKind;

/// A single stat, as seen by a stat logger before it is handed to a backend.
///
/// Emissions are only built for enabled levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emission {
    /// The kind of stat.
    pub kind: StatKind,

    /// The stat value.
    pub value: i64,

    /// The sample rate the stat was emitted at.
    pub sample_rate: f64,
}

/// The value of a single [`Argument`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    /// A stat kind.
    Kind(StatKind),

    /// A signed integer.
    Int(i64),

    /// A floating-point number.
    Float(f64),

    /// Free-form text.
    Text(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Kind(kind) => fmt::Display::fmt(kind, f),
            ArgValue::Int(value) => fmt::Display::fmt(value, f),
            ArgValue::Float(value) => fmt::Display::fmt(value, f),
            ArgValue::Text(value) => f.write_str(value),
        }
    }
}

/// A named argument attached to a [`LogCall`].
#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    /// The argument name.
    pub name: &'static str,

    /// The argument value.
    pub value: ArgValue,
}

impl Argument {
    /// Creates a new argument.
    pub fn new(name: &'static str, value: ArgValue) -> Self {
        Argument { name, value }
    }
}

/// A call into a backend logger: an optional message, an optional marker, and an ordered set of arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogCall {
    /// Human-readable message text.
    pub message: Option<String>,

    /// A marker that backends may use to route or filter the call.
    pub marker: Option<&'static str>,

    /// The arguments, in order.
    pub args: Vec<Argument>,
}

impl LogCall {
    /// Creates a call carrying only the given arguments.
    pub fn new(args: Vec<Argument>) -> Self {
        LogCall { message: None, marker: None, args }
    }

    /// Sets the message text.
    #[must_use]
    pub fn with_message<M>(mut self, message: M) -> Self
    where
        M: Into<String>,
    {
        self.message = Some(message.into());
        self
    }

    /// Sets the marker.
    #[must_use]
    pub fn with_marker(mut self, marker: &'static str) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Returns the stat carried by this call, if its arguments are exactly a kind, an integer and a float, in that
    /// order.
    pub fn stat_args(&self) -> Option<(StatKind, i64, f64)> {
        match self.args.as_slice() {
            [kind, value, sample_rate] => match (&kind.value, &value.value, &sample_rate.value) {
                (ArgValue::Kind(kind), ArgValue::Int(value), ArgValue::Float(sample_rate)) => {
                    Some((*kind, *value, *sample_rate))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// A named logger that stat calls are forwarded to.
///
/// Levels are enabled independently of each other: a backend may, for instance, enable trace while disabling debug.
pub trait BackendLogger: Send + Sync {
    /// Returns the name of this logger, which is also the key of every stat logged through it.
    fn name(&self) -> &str;

    /// Returns `true` if calls at `level` would be logged.
    fn is_enabled(&self, level: Level) -> bool;

    /// Logs a call at `level`, returning whether it was accepted.
    fn log(&self, level: Level, call: LogCall) -> bool;
}

impl<T> BackendLogger for Arc<T>
where
    T: BackendLogger + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_enabled(&self, level: Level) -> bool {
        (**self).is_enabled(level)
    }

    fn log(&self, level: Level, call: LogCall) -> bool {
        (**self).log(level, call)
    }
}

/// Hands out backend loggers by name.
pub trait BackendProvider: Send + Sync {
    /// Returns the backend logger for `name`.
    fn backend(&self, name: &str) -> Arc<dyn BackendLogger>;
}

impl<T> BackendProvider for Arc<T>
where
    T: BackendProvider + ?Sized,
{
    fn backend(&self, name: &str) -> Arc<dyn BackendLogger> {
        (**self).backend(name)
    }
}

#[cfg(test)]
mod tests {
    use statsd_client::StatKind;

    use super::{ArgValue, Argument, LogCall};

    fn call(args: Vec<ArgValue>) -> LogCall {
        LogCall::new(args.into_iter().map(|value| Argument::new("arg", value)).collect())
    }

    #[test]
    fn stat_args_requires_exact_triple() {
        let triple = call(vec![ArgValue::Kind(StatKind::Timer), ArgValue::Int(15), ArgValue::Float(0.5)]);
        assert_eq!(triple.stat_args(), Some((StatKind::Timer, 15, 0.5)));

        let cases = [
            vec![],
            vec![ArgValue::Kind(StatKind::Counter), ArgValue::Int(1)],
            vec![ArgValue::Int(1), ArgValue::Kind(StatKind::Counter), ArgValue::Float(1.0)],
            vec![ArgValue::Kind(StatKind::Counter), ArgValue::Int(1), ArgValue::Text("1.0".into())],
            vec![ArgValue::Kind(StatKind::Counter), ArgValue::Int(1), ArgValue::Float(1.0), ArgValue::Int(2)],
        ];
        for args in cases {
            assert_eq!(call(args.clone()).stat_args(), None, "args: {args:?}");
        }
    }

    #[test]
    fn message_and_marker() {
        let call = LogCall::default().with_message("counter 1 1").with_marker("STATSD");
        assert_eq!(call.message.as_deref(), Some("counter 1 1"));
        assert_eq!(call.marker, Some("STATSD"));
        assert!(call.args.is_empty());
    }

    #[test]
    fn arg_value_display() {
        assert_eq!(ArgValue::Kind(StatKind::Gauge).to_string(), "gauge");
        assert_eq!(ArgValue::Int(-2).to_string(), "-2");
        assert_eq!(ArgValue::Float(0.25).to_string(), "0.25");
        assert_eq!(ArgValue::Text("x".into()).to_string(), "x");
    }
}
